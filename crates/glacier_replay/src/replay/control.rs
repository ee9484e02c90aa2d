//! Shared-memory control block
//!
//! A supervising process hands down a POSIX shared-memory fd whose contents
//! follow [`ControlBlockLayout`]. The parent polls the counters to draw
//! progress bars and detect wedged replays; we only ever add to them.
//!
//! The futex word, the message ring, and the per-process memory statistics
//! are part of the layout but not written by the replay. `progress_complete`
//! is deliberately never set: the launcher treats a completed block as "this
//! database is done forever" and would skip future replays of it.

use std::fs::File;
use std::mem;
use std::os::unix::io::{FromRawFd, RawFd};
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};

use memmap2::MmapMut;

use super::{ReplayError, ReplayResult};
use crate::database::format::ResourceTag;
use crate::database::EntryStore;

/// Cookie the parent writes at offset zero before spawning us.
pub const CONTROL_BLOCK_MAGIC: u32 = 0x19BC_DE1D;

/// Number of per-process slots in the statistics arrays.
pub const CONTROL_BLOCK_MAX_PROCESSES: usize = 256;

/// Fixed layout of the shared region. Field order is part of the protocol.
#[repr(C)]
#[allow(missing_docs)]
pub struct ControlBlockLayout {
    /// Must equal [`CONTROL_BLOCK_MAGIC`].
    pub version_cookie: AtomicU32,
    /// Reserved futex word; unused by the replay.
    pub futex_lock: AtomicU32,
    /// Set to 1 once static totals and process counts are written.
    pub progress_started: AtomicU32,
    /// Reserved; intentionally never written (see module docs).
    pub progress_complete: AtomicU32,

    pub successful_graphics: AtomicU32,
    pub successful_compute: AtomicU32,
    pub successful_raytracing: AtomicU32,
    pub successful_modules: AtomicU32,

    pub skipped_graphics: AtomicU32,
    pub skipped_compute: AtomicU32,
    pub skipped_raytracing: AtomicU32,
    pub cached_graphics: AtomicU32,
    pub cached_compute: AtomicU32,
    pub cached_raytracing: AtomicU32,

    pub parsed_graphics: AtomicU32,
    pub parsed_compute: AtomicU32,
    pub parsed_raytracing: AtomicU32,
    pub parsed_graphics_failures: AtomicU32,
    pub parsed_compute_failures: AtomicU32,
    pub parsed_raytracing_failures: AtomicU32,
    pub parsed_module_failures: AtomicU32,

    pub clean_process_deaths: AtomicU32,
    pub dirty_process_deaths: AtomicU32,

    pub total_graphics: AtomicU32,
    pub total_compute: AtomicU32,
    pub total_raytracing: AtomicU32,
    pub total_modules: AtomicU32,
    pub banned_modules: AtomicU32,
    pub module_validation_failures: AtomicU32,

    pub static_total_count_graphics: AtomicU32,
    pub static_total_count_compute: AtomicU32,
    pub static_total_count_raytracing: AtomicU32,

    pub num_running_processes: AtomicU32,
    pub num_processes_memory_stats: AtomicU32,
    pub reserved_memory_mib: [AtomicU32; CONTROL_BLOCK_MAX_PROCESSES],
    pub shared_memory_mib: [AtomicU32; CONTROL_BLOCK_MAX_PROCESSES],
    pub heartbeats: [AtomicU32; CONTROL_BLOCK_MAX_PROCESSES],

    pub dirty_pages_mib: AtomicI32,
    pub io_stall_percentage: AtomicI32,

    pub message_ring_write_count: AtomicU32,
    pub message_ring_read_count: AtomicU32,
    pub message_ring_write_offset: AtomicU32,
    pub message_ring_read_offset: AtomicU32,
    pub message_ring_size: AtomicU32,
}

/// Static entry totals written once before workers start.
#[derive(Debug, Clone, Copy, Default)]
#[allow(missing_docs)]
pub struct StaticTotals {
    pub graphics: u32,
    pub compute: u32,
    pub raytracing: u32,
    pub modules: u32,
}

impl StaticTotals {
    /// Count totals from a loaded entry store.
    pub fn from_store(store: &EntryStore) -> Self {
        Self {
            graphics: store.count_by_tag(ResourceTag::GraphicsPipeline) as u32,
            compute: store.count_by_tag(ResourceTag::ComputePipeline) as u32,
            raytracing: store.count_by_tag(ResourceTag::RaytracingPipeline) as u32,
            modules: store.count_by_tag(ResourceTag::ShaderModule) as u32,
        }
    }
}

/// Handle to the control block; a disabled handle elides every write.
#[derive(Debug)]
pub struct ControlBlock {
    map: Option<MmapMut>,
}

impl ControlBlock {
    /// A handle that ignores all counter updates. Used when no fd was passed.
    pub fn disabled() -> Self {
        Self { map: None }
    }

    /// Map and validate the shared region behind an inherited fd.
    ///
    /// Takes ownership of the descriptor. The mapping outlives the closed fd.
    pub fn attach(fd: RawFd) -> ReplayResult<Self> {
        let file = unsafe { File::from_raw_fd(fd) };
        let len = file.metadata()?.len();
        if (len as usize) < mem::size_of::<ControlBlockLayout>() {
            return Err(ReplayError::SharedMemoryIsSmallerThanControlBlock);
        }
        let map = unsafe { MmapMut::map_mut(&file) }.map_err(ReplayError::Io)?;
        let layout = unsafe { &*map.as_ptr().cast::<ControlBlockLayout>() };
        if layout.version_cookie.load(Ordering::Acquire) != CONTROL_BLOCK_MAGIC {
            return Err(ReplayError::InvalidControlBlockMagic);
        }
        Ok(Self { map: Some(map) })
    }

    fn layout(&self) -> Option<&ControlBlockLayout> {
        self.map
            .as_ref()
            .map(|map| unsafe { &*map.as_ptr().cast::<ControlBlockLayout>() })
    }

    /// True when a shared region is attached.
    pub fn is_attached(&self) -> bool {
        self.map.is_some()
    }

    /// Publish static totals and the worker count, then flag initialization
    /// complete via `progress_started`.
    pub fn begin_replay(&self, thread_count: u32, totals: StaticTotals) {
        let Some(block) = self.layout() else { return };
        block
            .static_total_count_graphics
            .store(totals.graphics, Ordering::Release);
        block
            .static_total_count_compute
            .store(totals.compute, Ordering::Release);
        block
            .static_total_count_raytracing
            .store(totals.raytracing, Ordering::Release);
        block.total_graphics.store(totals.graphics, Ordering::Release);
        block.total_compute.store(totals.compute, Ordering::Release);
        block
            .total_raytracing
            .store(totals.raytracing, Ordering::Release);
        block.total_modules.store(totals.modules, Ordering::Release);
        block
            .num_running_processes
            .store(thread_count, Ordering::Release);
        block
            .num_processes_memory_stats
            .store(thread_count, Ordering::Release);
        block.progress_started.store(1, Ordering::Release);
    }

    fn pipeline_counter<'a>(
        tag: ResourceTag,
        graphics: &'a AtomicU32,
        compute: &'a AtomicU32,
        raytracing: &'a AtomicU32,
    ) -> Option<&'a AtomicU32> {
        match tag {
            ResourceTag::GraphicsPipeline => Some(graphics),
            ResourceTag::ComputePipeline => Some(compute),
            ResourceTag::RaytracingPipeline => Some(raytracing),
            _ => None,
        }
    }

    /// Count a root whose closure parsed cleanly.
    pub fn increment_parsed(&self, tag: ResourceTag) {
        let Some(block) = self.layout() else { return };
        if let Some(counter) = Self::pipeline_counter(
            tag,
            &block.parsed_graphics,
            &block.parsed_compute,
            &block.parsed_raytracing,
        ) {
            counter.fetch_add(1, Ordering::Release);
        }
    }

    /// Count a root that replayed through creation.
    pub fn increment_successful(&self, tag: ResourceTag) {
        let Some(block) = self.layout() else { return };
        if let Some(counter) = Self::pipeline_counter(
            tag,
            &block.successful_graphics,
            &block.successful_compute,
            &block.successful_raytracing,
        ) {
            counter.fetch_add(1, Ordering::Release);
        }
    }

    /// Count a root whose subtree failed.
    pub fn increment_failure(&self, tag: ResourceTag) {
        let Some(block) = self.layout() else { return };
        if let Some(counter) = Self::pipeline_counter(
            tag,
            &block.parsed_graphics_failures,
            &block.parsed_compute_failures,
            &block.parsed_raytracing_failures,
        ) {
            counter.fetch_add(1, Ordering::Release);
        }
    }

    /// Count a shader module that reached creation.
    pub fn increment_successful_module(&self) {
        if let Some(block) = self.layout() {
            block.successful_modules.fetch_add(1, Ordering::Release);
        }
    }

    /// Count a shader module whose parse failed.
    pub fn increment_module_parse_failure(&self) {
        if let Some(block) = self.layout() {
            block.parsed_module_failures.fetch_add(1, Ordering::Release);
        }
    }

    /// Bump the heartbeat slot of worker `index`.
    pub fn heartbeat(&self, index: usize) {
        let Some(block) = self.layout() else { return };
        if let Some(slot) = block.heartbeats.get(index) {
            slot.fetch_add(1, Ordering::Release);
        }
    }

    /// Record an orderly shutdown.
    pub fn mark_clean_death(&self) {
        if let Some(block) = self.layout() {
            block.clean_process_deaths.fetch_add(1, Ordering::Release);
        }
    }

    /// Read a counter snapshot for logging and tests.
    pub fn snapshot(&self) -> Option<ControlSnapshot> {
        self.layout().map(|block| ControlSnapshot {
            progress_started: block.progress_started.load(Ordering::Acquire),
            progress_complete: block.progress_complete.load(Ordering::Acquire),
            successful_graphics: block.successful_graphics.load(Ordering::Acquire),
            successful_compute: block.successful_compute.load(Ordering::Acquire),
            successful_raytracing: block.successful_raytracing.load(Ordering::Acquire),
            successful_modules: block.successful_modules.load(Ordering::Acquire),
            parsed_graphics: block.parsed_graphics.load(Ordering::Acquire),
            parsed_compute: block.parsed_compute.load(Ordering::Acquire),
            parsed_raytracing: block.parsed_raytracing.load(Ordering::Acquire),
            parsed_graphics_failures: block.parsed_graphics_failures.load(Ordering::Acquire),
            parsed_compute_failures: block.parsed_compute_failures.load(Ordering::Acquire),
            parsed_raytracing_failures: block.parsed_raytracing_failures.load(Ordering::Acquire),
            parsed_module_failures: block.parsed_module_failures.load(Ordering::Acquire),
            static_total_count_graphics: block
                .static_total_count_graphics
                .load(Ordering::Acquire),
            num_running_processes: block.num_running_processes.load(Ordering::Acquire),
            clean_process_deaths: block.clean_process_deaths.load(Ordering::Acquire),
        })
    }
}

/// Read-only copy of the interesting counters.
#[derive(Debug, Clone, Copy, Default)]
#[allow(missing_docs)]
pub struct ControlSnapshot {
    pub progress_started: u32,
    pub progress_complete: u32,
    pub successful_graphics: u32,
    pub successful_compute: u32,
    pub successful_raytracing: u32,
    pub successful_modules: u32,
    pub parsed_graphics: u32,
    pub parsed_compute: u32,
    pub parsed_raytracing: u32,
    pub parsed_graphics_failures: u32,
    pub parsed_compute_failures: u32,
    pub parsed_raytracing_failures: u32,
    pub parsed_module_failures: u32,
    pub static_total_count_graphics: u32,
    pub num_running_processes: u32,
    pub clean_process_deaths: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, SeekFrom, Write};
    use std::os::unix::io::IntoRawFd;

    fn shared_region(cookie: u32, len: usize) -> RawFd {
        let mut file = tempfile::tempfile().expect("temp shm file");
        file.set_len(len as u64).expect("size region");
        file.seek(SeekFrom::Start(0)).expect("seek");
        file.write_all(&cookie.to_le_bytes()).expect("write cookie");
        file.into_raw_fd()
    }

    #[test]
    fn test_attach_and_count() {
        let fd = shared_region(CONTROL_BLOCK_MAGIC, mem::size_of::<ControlBlockLayout>());
        let block = ControlBlock::attach(fd).expect("attach");
        assert!(block.is_attached());

        block.begin_replay(
            4,
            StaticTotals {
                graphics: 10,
                compute: 3,
                raytracing: 0,
                modules: 7,
            },
        );
        block.increment_parsed(ResourceTag::GraphicsPipeline);
        block.increment_successful(ResourceTag::GraphicsPipeline);
        block.increment_failure(ResourceTag::ComputePipeline);
        block.increment_successful_module();
        block.heartbeat(0);
        block.heartbeat(usize::MAX); // out of range, ignored
        block.mark_clean_death();

        let snapshot = block.snapshot().expect("snapshot");
        assert_eq!(snapshot.progress_started, 1);
        assert_eq!(snapshot.static_total_count_graphics, 10);
        assert_eq!(snapshot.num_running_processes, 4);
        assert_eq!(snapshot.parsed_graphics, 1);
        assert_eq!(snapshot.successful_graphics, 1);
        assert_eq!(snapshot.parsed_compute_failures, 1);
        assert_eq!(snapshot.successful_modules, 1);
        assert_eq!(snapshot.clean_process_deaths, 1);
        // Never set by the replay.
        assert_eq!(snapshot.progress_complete, 0);
    }

    #[test]
    fn test_bad_cookie_rejected() {
        let fd = shared_region(0xBAD0_C0DE, mem::size_of::<ControlBlockLayout>());
        let err = ControlBlock::attach(fd).unwrap_err();
        assert!(matches!(err, ReplayError::InvalidControlBlockMagic));
    }

    #[test]
    fn test_small_region_rejected() {
        let fd = shared_region(CONTROL_BLOCK_MAGIC, 64);
        let err = ControlBlock::attach(fd).unwrap_err();
        assert!(matches!(
            err,
            ReplayError::SharedMemoryIsSmallerThanControlBlock
        ));
    }

    #[test]
    fn test_disabled_block_elides_writes() {
        let block = ControlBlock::disabled();
        assert!(!block.is_attached());
        block.begin_replay(2, StaticTotals::default());
        block.increment_successful(ResourceTag::GraphicsPipeline);
        assert!(block.snapshot().is_none());
    }
}
