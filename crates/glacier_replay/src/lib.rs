//! # Glacier Replay
//!
//! Replays a fossilize database of Vulkan pipeline-state objects against a
//! real (or stubbed) device so the driver's internal pipeline cache is warm
//! before the recording application launches again.
//!
//! ## How a replay runs
//!
//! 1. [`database::Database::open`] scans the file and builds the entry
//!    catalog without reading payloads.
//! 2. [`replay::verify_application_info`] decodes the application-info entry;
//!    a database without one is refused.
//! 3. [`replay::run`] splits the root pipelines across worker threads. Each
//!    worker parses its chunk's dependency closures, waits at the phase
//!    barrier, then creates each closure leaf-first and immediately destroys
//!    the handles. Reference counts keep entries shared between roots alive
//!    until their last dependent retires.
//!
//! Progress is visible to a supervising process through the shared-memory
//! [`replay::ControlBlock`].
//!
//! Malformed payloads, checksum mismatches, and driver rejections invalidate
//! the affected pipeline subtree and are counted; they never abort the run.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod database;
pub mod foundation;
pub mod parse;
pub mod replay;
pub mod vulkan;

pub use database::{Database, DatabaseError, EntryStore, Hash, ResourceTag};
pub use parse::{CreateInfo, ParseError};
pub use replay::{
    run, verify_application_info, ControlBlock, ReplayError, ReplayOptions, ReplayResult,
    ReplaySummary,
};
pub use vulkan::{AshDevice, ContextOptions, Handle, ReplayDevice, VulkanContext, VulkanError};
