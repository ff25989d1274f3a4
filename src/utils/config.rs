//! Application configuration constants.
//! Tuning and thresholds in one place.

use std::sync::OnceLock;
use std::time::Duration;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived paths: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    db_filename: String,
    config_filename: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache paths from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                db_filename: format!(".{pkg}"),
                config_filename: format!(".{pkg}.toml"),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// Store (SQLite) filename placed in the scan root when no `--db` is given.
    pub fn db_filename(&self) -> &str {
        &self.db_filename
    }

    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// Directory names pruned from discovery walks by default. Dependency caches and build output
    /// never contain project roots worth listing, and walking them dominates scan time.
    pub fn default_exclude_patterns(&self) -> Vec<String> {
        vec![
            "target".to_string(),
            "node_modules".to_string(),
            ".git".to_string(),
            self.db_filename().to_string(),
        ]
    }
}

// ---- Discovery ----

pub struct ScanConsts;

impl ScanConsts {
    /// Default walk depth below the root.
    pub const DEFAULT_MAX_DEPTH: usize = 4;
    /// Depth of the `src/` walk used for last-modified detection.
    pub const SRC_MTIME_DEPTH: usize = 3;
    /// Manifest file that marks a project root.
    pub const MANIFEST: &'static str = "Cargo.toml";
    /// Build artifact directory inside a project.
    pub const TARGET_DIR: &'static str = "target";
}

// ---- Batches ----

/// Worker limits for batch fan-out.
pub struct BatchConsts;

impl BatchConsts {
    /// Default number of projects processed at once. Each unit is usually a cargo process that
    /// itself spawns rustc/network work, so this stays well below the core count.
    pub const DEFAULT_CONCURRENCY: usize = 4;
    /// Hard ceiling regardless of what the caller asks for.
    pub const MAX_CONCURRENCY: usize = 64;
    /// File descriptors a single unit may hold (stdout/stderr pipes, child handles, lock files).
    pub const FDS_PER_UNIT: usize = 8;
}

// ---- Processes ----

pub struct ProcessConsts;

impl ProcessConsts {
    /// Interval between `try_wait` polls while a child runs.
    pub const POLL_INTERVAL: Duration = Duration::from_millis(25);
    /// Time between SIGTERM and SIGKILL on cancellation or deadline.
    pub const TERM_GRACE: Duration = Duration::from_secs(2);
    /// Upper bound on waiting for pipe readers after the child was terminated.
    pub const READER_JOIN_GRACE: Duration = Duration::from_millis(500);
    /// Upper bound on waiting for pipe readers after a normal exit. A grandchild that inherited
    /// the pipes can hold them open indefinitely.
    pub const EXIT_DRAIN_GRACE: Duration = Duration::from_secs(2);
    /// Trailing stderr lines kept in the error of a failed cargo command.
    pub const ERROR_TAIL_LINES: usize = 20;
    /// Default cargo executable.
    pub const CARGO: &'static str = "cargo";
}

// ---- Settings ----

/// Number of recent projects remembered.
pub const RECENT_PROJECTS_MAX: usize = 5;
