//! Reusable per-worker scratch buffers
//!
//! Payload reads and inflation happen once per entry but thousands of times
//! per worker; these buffers are cleared between roots while keeping their
//! capacity.

/// Scratch space owned by one worker thread.
#[derive(Debug, Default)]
pub struct PayloadScratch {
    pub(crate) stored: Vec<u8>,
    pub(crate) inflated: Vec<u8>,
}

impl PayloadScratch {
    /// Create empty scratch buffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear contents, keeping allocated capacity.
    pub fn reset_retain(&mut self) {
        self.stored.clear();
        self.inflated.clear();
    }
}
