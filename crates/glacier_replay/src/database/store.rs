//! In-memory catalog of database entries
//!
//! Keyed by (tag, hash). Append-only during load, immutable afterwards; the
//! per-entry replay state is the only thing that changes during replay.

use std::collections::HashMap;
use std::sync::Arc;

use super::entry::Entry;
use super::format::{Hash, ResourceTag};

/// Catalog of all loaded entries.
#[derive(Default, Debug)]
pub struct EntryStore {
    entries: HashMap<(ResourceTag, Hash), Arc<Entry>>,
}

impl EntryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry; a later record with the same key replaces it.
    pub(crate) fn insert(&mut self, entry: Entry) {
        self.entries.insert((entry.tag, entry.hash), Arc::new(entry));
    }

    /// Look up an entry by key.
    pub fn get(&self, tag: ResourceTag, hash: Hash) -> Option<&Arc<Entry>> {
        self.entries.get(&(tag, hash))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries carrying `tag`.
    pub fn count_by_tag(&self, tag: ResourceTag) -> usize {
        self.entries.keys().filter(|(t, _)| *t == tag).count()
    }

    /// The application-info entry, if the database has one.
    pub fn application_info(&self) -> Option<&Arc<Entry>> {
        self.entries
            .iter()
            .find(|((tag, _), _)| *tag == ResourceTag::ApplicationInfo)
            .map(|(_, entry)| entry)
    }

    fn sorted_by_tag(&self, tag: ResourceTag) -> Vec<Arc<Entry>> {
        let mut entries: Vec<Arc<Entry>> = self
            .entries
            .iter()
            .filter(|((t, _), _)| *t == tag)
            .map(|(_, entry)| entry.clone())
            .collect();
        entries.sort_by_key(|entry| entry.hash);
        entries
    }

    /// Replay roots: graphics, then compute, then ray-tracing pipelines,
    /// each group ordered by hash.
    pub fn root_pipelines(&self) -> Vec<Arc<Entry>> {
        let mut roots = self.sorted_by_tag(ResourceTag::GraphicsPipeline);
        roots.extend(self.sorted_by_tag(ResourceTag::ComputePipeline));
        roots.extend(self.sorted_by_tag(ResourceTag::RaytracingPipeline));
        roots
    }
}
