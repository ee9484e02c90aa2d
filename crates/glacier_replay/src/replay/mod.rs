//! The replay engine
//!
//! Orchestrates the parse and create phases over the entry store, reports
//! progress through the shared-memory control block, and contains failures to
//! the affected pipeline subtree.

pub mod control;
pub mod dispatcher;
pub mod walker;

use thiserror::Error;

use crate::database::format::{Hash, ResourceTag};
use crate::database::{Database, DatabaseError};
use crate::foundation::scratch::PayloadScratch;
use crate::parse::{parse_payload, ApplicationInfo, CreateInfo, ParseError};
use crate::vulkan::VulkanError;

pub use control::ControlBlock;
pub use dispatcher::{run, ReplayOptions, ReplaySummary};
pub use walker::{Replayer, RootOutcome};

/// Replay errors. The first five are fatal at startup; the rest surface from
/// per-entry machinery when it is driven directly.
#[derive(Error, Debug)]
pub enum ReplayError {
    /// The shared-memory control block does not carry the expected cookie.
    #[error("control block cookie mismatch")]
    InvalidControlBlockMagic,

    /// The shared-memory region cannot hold the control block layout.
    #[error("shared memory region is smaller than the control block")]
    SharedMemoryIsSmallerThanControlBlock,

    /// The database contains no application-info entry.
    #[error("database has no application info entry")]
    NoApplicationInfoInTheDatabase,

    /// The application-info payload carries an unsupported version.
    #[error("application info version is not supported")]
    ApplicationInfoVersionMismatch,

    /// A create-info references an entry missing from the store.
    #[error("dependency {tag:?} {hash} is not in the database")]
    NoObjectFound {
        /// Tag of the missing entry.
        tag: ResourceTag,
        /// Hash of the missing entry.
        hash: Hash,
    },

    /// The dependency graph contains a cycle.
    #[error("dependency cycle involving {tag:?} {hash}")]
    InvalidDatabase {
        /// Tag of the entry where the cycle closed.
        tag: ResourceTag,
        /// Hash of the entry where the cycle closed.
        hash: Hash,
    },

    /// Database reading failed.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Payload decoding failed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Driver interaction failed.
    #[error(transparent)]
    Vulkan(#[from] VulkanError),

    /// An underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for replay operations.
pub type ReplayResult<T> = Result<T, ReplayError>;

/// Locate and decode the application-info entry.
///
/// Fatal when the database has none or its payload version is unsupported;
/// the replay would otherwise prime the wrong application's cache.
pub fn verify_application_info(db: &Database) -> ReplayResult<ApplicationInfo> {
    let entry = db
        .store()
        .application_info()
        .ok_or(ReplayError::NoApplicationInfoInTheDatabase)?;
    let mut scratch = PayloadScratch::new();
    let payload = db.read_payload(entry, &mut scratch)?;
    match parse_payload(entry.tag, entry.hash, payload) {
        Ok((CreateInfo::ApplicationInfo(info), _)) => Ok(info),
        Ok(_) => {
            debug_assert!(false, "application info decoded to a different kind");
            Err(ReplayError::ApplicationInfoVersionMismatch)
        }
        Err(ParseError::InvalidVersion(_)) => Err(ReplayError::ApplicationInfoVersionMismatch),
        Err(err) => Err(err.into()),
    }
}
