//! Call-level error types.
//!
//! Only a handful of conditions ever surface as `Err`: an invalid scan root, a batch with nothing
//! to attempt, and job bookkeeping mistakes. Everything that goes wrong inside one project (tool
//! missing, nonzero exit, unparsable output) is captured in that project's
//! [`OperationResult`](crate::OperationResult) instead.

use std::path::PathBuf;
use thiserror::Error;

use crate::jobs::JobId;

/// Discovery failures that abort a whole scan.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// Root does not exist or is not a directory.
    #[error("invalid scan root {path}: {reason}")]
    InvalidRoot { path: PathBuf, reason: String },

    /// Root exists but could not be resolved to an absolute path.
    #[error("cannot read scan root {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Batch failures that happen before any project is attempted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("no projects to run '{label}' on")]
    NoProjects { label: String },
}

/// Job registry errors. Both are benign; callers usually log and move on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("job '{0}' is already registered")]
    DuplicateJob(JobId),

    #[error("no active job '{0}'")]
    UnknownJob(JobId),
}

/// Cache (de)serialization errors. Logged by the cache and treated as a miss.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("serialize cached {kind}: {source}")]
    Serialize {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("deserialize cached {kind}: {source}")]
    Deserialize {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
