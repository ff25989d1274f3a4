//! Cratedeck: manage many local Cargo projects at once.
//!
//! Discovers projects under a root, fans cargo tools out across them with bounded parallelism,
//! aggregates the results into cross-project reports and caches the last report of each kind.
//! [`Deck`] ties the pieces together; the modules are usable on their own.

pub mod analysis;
pub mod batch;
pub mod cache;
pub mod deck;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod locator;
pub mod parsers;
pub mod process;
pub mod settings;
pub mod store;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use batch::{Batch, BatchExecutor, CargoTools, OperationKind};
pub use cache::{AnalysisKind, CachedResult, ResultCache};
pub use deck::{BatchRun, Deck, ProgressHook};
pub use error::{BatchError, CacheError, DiscoveryError, JobError};
pub use jobs::{BackgroundJob, CancelToken, JobGuard, JobId, JobRegistry};
pub use locator::{ScanOutcome, locate_projects};
pub use process::{CommandEvent, CommandSpec, CommandStream, Completion, StreamSource};
pub use settings::Settings;
pub use store::{MemoryStore, PersistenceStore, SqliteStore};

/// Result alias used by the public cratedeck API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;
