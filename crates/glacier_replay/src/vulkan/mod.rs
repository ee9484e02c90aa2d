//! Vulkan driver layer
//!
//! Instance and device bring-up plus the [`ReplayDevice`] abstraction the
//! walker drives. Replay never records command buffers; the only driver
//! traffic is create and destroy calls.

pub mod device;
pub mod instance;

use ash::vk;
use thiserror::Error;

pub use device::{AshDevice, ReplayDevice};
pub use instance::{ContextOptions, VulkanContext};

/// Vulkan driver errors.
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code.
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// The Vulkan loader could not be found or initialized.
    #[error("failed to load the Vulkan entry points: {0}")]
    EntryLoad(String),

    /// The requested physical device index is out of range.
    #[error("no Vulkan physical device at index {index} ({available} available)")]
    NoSuchDevice {
        /// Requested index.
        index: usize,
        /// Number of devices the instance reported.
        available: usize,
    },

    /// The selected device exposes no graphics or compute queue family.
    #[error("no graphics or compute queue family found")]
    NoQueueFamily,

    /// SPIR-V code whose length is not a multiple of four bytes.
    #[error("shader code size is not a multiple of four bytes")]
    MisalignedShaderCode,

    /// Ray-tracing pipeline requested on a device without the extension.
    #[error("ray tracing pipelines are not supported by this device")]
    RayTracingUnsupported,
}

/// Result type for Vulkan operations.
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Opaque driver handle; the raw value of a Vulkan non-dispatchable handle.
///
/// Zero is reserved as the null value and never stored for a live object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl Handle {
    /// Wrap a raw handle value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw handle value.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! A driver stand-in that records call order and injects failures.

    use std::collections::HashSet;

    use ash::vk;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::{Handle, ReplayDevice, VulkanError, VulkanResult};
    use crate::database::format::{Hash, ResourceTag};
    use crate::parse::CreateInfo;

    /// One recorded driver call.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Event {
        Create {
            tag: ResourceTag,
            hash: Hash,
            handle: Handle,
        },
        Destroy {
            tag: ResourceTag,
            handle: Handle,
        },
    }

    /// Recording implementation of [`ReplayDevice`].
    pub struct RecordingDevice {
        next_handle: AtomicU64,
        events: Mutex<Vec<Event>>,
        failures: Mutex<HashSet<(ResourceTag, Hash)>>,
    }

    impl RecordingDevice {
        pub fn new() -> Self {
            Self {
                next_handle: AtomicU64::new(1),
                events: Mutex::new(Vec::new()),
                failures: Mutex::new(HashSet::new()),
            }
        }

        /// Make the next create of (tag, hash) fail.
        pub fn fail_create(&self, tag: ResourceTag, hash: Hash) {
            self.failures.lock().insert((tag, hash));
        }

        /// Snapshot of all recorded calls, in order.
        pub fn events(&self) -> Vec<Event> {
            self.events.lock().clone()
        }

        /// (tag, hash) pairs of creates, in call order.
        pub fn create_order(&self) -> Vec<(ResourceTag, Hash)> {
            self.events()
                .into_iter()
                .filter_map(|event| match event {
                    Event::Create { tag, hash, .. } => Some((tag, hash)),
                    Event::Destroy { .. } => None,
                })
                .collect()
        }

        /// (tag, hash) pairs of destroys, in call order, resolved through the
        /// handles handed out by this device.
        pub fn destroy_order(&self) -> Vec<(ResourceTag, Hash)> {
            let events = self.events();
            events
                .iter()
                .filter_map(|event| match event {
                    Event::Destroy { tag, handle } => {
                        let hash = events.iter().find_map(|other| match other {
                            Event::Create {
                                hash, handle: h, ..
                            } if h == handle => Some(*hash),
                            _ => None,
                        });
                        hash.map(|hash| (*tag, hash))
                    }
                    Event::Create { .. } => None,
                })
                .collect()
        }

        /// Number of destroys recorded for (tag, hash).
        pub fn destroy_count(&self, tag: ResourceTag, hash: Hash) -> usize {
            self.destroy_order()
                .into_iter()
                .filter(|&key| key == (tag, hash))
                .count()
        }
    }

    impl ReplayDevice for RecordingDevice {
        fn create(&self, tag: ResourceTag, hash: Hash, _info: &CreateInfo) -> VulkanResult<Handle> {
            if self.failures.lock().contains(&(tag, hash)) {
                return Err(VulkanError::Api(vk::Result::ERROR_INITIALIZATION_FAILED));
            }
            let handle = Handle::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed));
            self.events.lock().push(Event::Create { tag, hash, handle });
            Ok(handle)
        }

        fn destroy(&self, tag: ResourceTag, handle: Handle) {
            self.events.lock().push(Event::Destroy { tag, handle });
        }
    }
}
