//! Database entries and their replay state machine
//!
//! An entry is immutable after load except for the replay fields, which move
//! strictly forward: not_parsed → parsing → parsed → creating → created, with
//! `invalid` reachable from any state before `created`. All transitions are
//! compare-and-swap so each stage body runs on exactly one thread.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::OnceLock;

use parking_lot::Mutex;

use super::format::{Hash, ResourceTag};
use crate::parse::{CreateInfo, DepRef};
use crate::vulkan::Handle;

/// Replay progress of a single entry.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// Loaded from disk, payload untouched.
    NotParsed = 0,
    /// One thread is running the parse body.
    Parsing = 1,
    /// Create-info and dependency list are published.
    Parsed = 2,
    /// One thread is running the create body.
    Creating = 3,
    /// The driver object was created.
    Created = 4,
    /// The entry failed and was removed from further replay.
    Invalid = 5,
}

impl EntryStatus {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::NotParsed,
            1 => Self::Parsing,
            2 => Self::Parsed,
            3 => Self::Creating,
            4 => Self::Created,
            _ => Self::Invalid,
        }
    }
}

/// Outcome of a `try_begin_*` transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The caller owns the stage body and must finish or invalidate.
    Won,
    /// Another thread already completed this stage; reuse the result.
    Done,
    /// Another thread is inside the stage body right now.
    Busy,
    /// The entry was invalidated.
    Invalid,
}

/// Where an entry's payload lives in the database file.
#[derive(Debug, Clone, Copy)]
pub struct PayloadLocation {
    /// Absolute byte offset of the stored payload.
    pub file_offset: u64,
    /// Payload length as stored on disk.
    pub stored_size: u32,
    /// Payload length after inflation.
    pub decompressed_size: u32,
    /// CRC32/zlib of the stored bytes; 0 disables verification.
    pub crc: u32,
    /// True when the payload is raw deflate.
    pub compressed: bool,
}

/// One database record plus its mutable replay state.
#[derive(Debug)]
pub struct Entry {
    /// Object kind.
    pub tag: ResourceTag,
    /// Content hash; identity within the tag.
    pub hash: Hash,
    /// Payload location in the database file.
    pub payload: PayloadLocation,

    status: AtomicU8,
    create_info: Mutex<Option<Box<CreateInfo>>>,
    dependencies: OnceLock<Vec<DepRef>>,
    handle: AtomicU64,
    dependent_by: AtomicU32,
    dependencies_destroyed: AtomicBool,
}

impl Entry {
    /// Construct a fresh, unparsed entry.
    pub fn new(tag: ResourceTag, hash: Hash, payload: PayloadLocation) -> Self {
        Self {
            tag,
            hash,
            payload,
            status: AtomicU8::new(EntryStatus::NotParsed as u8),
            create_info: Mutex::new(None),
            dependencies: OnceLock::new(),
            handle: AtomicU64::new(0),
            dependent_by: AtomicU32::new(0),
            dependencies_destroyed: AtomicBool::new(false),
        }
    }

    /// Current status.
    pub fn status(&self) -> EntryStatus {
        EntryStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    /// Claim the parse body: not_parsed → parsing.
    pub fn try_begin_parse(&self) -> Claim {
        match self.status.compare_exchange(
            EntryStatus::NotParsed as u8,
            EntryStatus::Parsing as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => Claim::Won,
            Err(observed) => match EntryStatus::from_u8(observed) {
                EntryStatus::Parsed | EntryStatus::Creating | EntryStatus::Created => Claim::Done,
                EntryStatus::Invalid => Claim::Invalid,
                _ => Claim::Busy,
            },
        }
    }

    /// Publish the parse result: parsing → parsed.
    pub fn finish_parse(&self) {
        self.status
            .store(EntryStatus::Parsed as u8, Ordering::Release);
    }

    /// Claim the create body: parsed → creating.
    pub fn try_begin_create(&self) -> Claim {
        match self.status.compare_exchange(
            EntryStatus::Parsed as u8,
            EntryStatus::Creating as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => Claim::Won,
            Err(observed) => match EntryStatus::from_u8(observed) {
                EntryStatus::Created => Claim::Done,
                EntryStatus::Invalid => Claim::Invalid,
                _ => Claim::Busy,
            },
        }
    }

    /// Publish the create result: creating → created.
    pub fn finish_create(&self) {
        self.status
            .store(EntryStatus::Created as u8, Ordering::Release);
    }

    /// Move to the terminal invalid state. Never valid once created.
    pub fn mark_invalid(&self) {
        let _previous = self.status.swap(EntryStatus::Invalid as u8, Ordering::SeqCst);
        debug_assert_ne!(
            EntryStatus::from_u8(_previous),
            EntryStatus::Created,
            "invalidated {:?} {} after creation",
            self.tag,
            self.hash,
        );
    }

    /// Store the parsed create-info. Runs at most once, inside the parse body.
    pub fn publish_create_info(&self, info: CreateInfo) {
        let mut slot = self.create_info.lock();
        debug_assert!(slot.is_none(), "create-info published twice");
        *slot = Some(Box::new(info));
    }

    /// Run `body` with mutable access to the create-info, if still present.
    pub fn with_create_info_mut<R>(&self, body: impl FnOnce(Option<&mut CreateInfo>) -> R) -> R {
        let mut slot = self.create_info.lock();
        body(slot.as_deref_mut())
    }

    /// Drop the create-info; idempotent.
    pub fn release_create_info(&self) {
        *self.create_info.lock() = None;
    }

    /// True while a parsed create-info is held.
    pub fn has_create_info(&self) -> bool {
        self.create_info.lock().is_some()
    }

    /// Publish the dependency list. Runs at most once, inside the parse body.
    pub fn publish_dependencies(&self, deps: Vec<DepRef>) {
        let _already_set = self.dependencies.set(deps).is_err();
        debug_assert!(!_already_set, "dependencies published twice");
    }

    /// Dependency list; empty until parsed.
    pub fn dependencies(&self) -> &[DepRef] {
        self.dependencies.get().map_or(&[], Vec::as_slice)
    }

    /// Store the driver handle produced by the create body.
    pub fn store_handle(&self, handle: Handle) {
        self.handle.store(handle.raw(), Ordering::Release);
    }

    /// Currently live driver handle, if any.
    pub fn handle(&self) -> Option<Handle> {
        let raw = self.handle.load(Ordering::Acquire);
        (raw != 0).then(|| Handle::from_raw(raw))
    }

    /// Take the handle for destruction; at most one caller gets it.
    pub fn take_handle(&self) -> Option<Handle> {
        let raw = self.handle.swap(0, Ordering::AcqRel);
        (raw != 0).then(|| Handle::from_raw(raw))
    }

    /// Register a live dependent; returns the new count.
    pub fn retain_dependent(&self) -> u32 {
        self.dependent_by.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Drop one dependent; true when this release took the count to zero.
    pub fn release_dependent(&self) -> bool {
        self.dependent_by.fetch_sub(1, Ordering::SeqCst) == 1
    }

    /// Number of live dependents.
    pub fn dependent_count(&self) -> u32 {
        self.dependent_by.load(Ordering::SeqCst)
    }

    /// Claim the destroy-dependencies pass; at most one caller wins.
    pub fn try_claim_destroy_dependencies(&self) -> bool {
        self.dependencies_destroyed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_entry(tag: ResourceTag, hash: u64) -> Entry {
        Entry::new(
            tag,
            Hash(hash),
            PayloadLocation {
                file_offset: 0,
                stored_size: 0,
                decompressed_size: 0,
                crc: 0,
                compressed: false,
            },
        )
    }

    #[test]
    fn test_parse_claim_lifecycle() {
        let entry = test_entry(ResourceTag::Sampler, 1);
        assert_eq!(entry.status(), EntryStatus::NotParsed);
        assert_eq!(entry.try_begin_parse(), Claim::Won);
        assert_eq!(entry.status(), EntryStatus::Parsing);
        assert_eq!(entry.try_begin_parse(), Claim::Busy);
        entry.finish_parse();
        assert_eq!(entry.try_begin_parse(), Claim::Done);
        assert_eq!(entry.status(), EntryStatus::Parsed);
    }

    #[test]
    fn test_create_claim_lifecycle() {
        let entry = test_entry(ResourceTag::Sampler, 1);
        assert_eq!(entry.try_begin_parse(), Claim::Won);
        entry.finish_parse();
        assert_eq!(entry.try_begin_create(), Claim::Won);
        assert_eq!(entry.try_begin_create(), Claim::Busy);
        entry.finish_create();
        assert_eq!(entry.try_begin_create(), Claim::Done);
        assert_eq!(entry.try_begin_parse(), Claim::Done);
    }

    #[test]
    fn test_invalid_is_terminal() {
        let entry = test_entry(ResourceTag::Sampler, 1);
        assert_eq!(entry.try_begin_parse(), Claim::Won);
        entry.mark_invalid();
        assert_eq!(entry.try_begin_parse(), Claim::Invalid);
        assert_eq!(entry.try_begin_create(), Claim::Invalid);
        assert_eq!(entry.status(), EntryStatus::Invalid);
    }

    #[test]
    fn test_dependent_refcount() {
        let entry = test_entry(ResourceTag::ShaderModule, 2);
        assert_eq!(entry.retain_dependent(), 1);
        assert_eq!(entry.retain_dependent(), 2);
        assert!(!entry.release_dependent());
        assert!(entry.release_dependent());
        assert_eq!(entry.dependent_count(), 0);
    }

    #[test]
    fn test_destroy_dependencies_claimed_once() {
        let entry = test_entry(ResourceTag::GraphicsPipeline, 3);
        assert!(entry.try_claim_destroy_dependencies());
        assert!(!entry.try_claim_destroy_dependencies());
    }

    #[test]
    fn test_handle_taken_once() {
        let entry = test_entry(ResourceTag::Sampler, 4);
        assert!(entry.handle().is_none());
        entry.store_handle(Handle::from_raw(17));
        assert_eq!(entry.handle(), Some(Handle::from_raw(17)));
        assert_eq!(entry.take_handle(), Some(Handle::from_raw(17)));
        assert!(entry.take_handle().is_none());
        assert!(entry.handle().is_none());
    }
}
