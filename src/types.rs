//! Public types for the cratedeck API: project descriptors, per-project results and payloads.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::utils::config::{BatchConsts, PackagePaths, ProcessConsts, ScanConsts};

/// One discovered Cargo project. Identity is `path`; a new scan replaces the whole list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    /// `package.name`, or the directory name when the manifest has none or is malformed.
    pub name: String,
    /// Absolute project directory (the folder holding `Cargo.toml`).
    pub path: PathBuf,
    /// Bytes under `target/` (0 when absent).
    pub target_size: u64,
    /// Entries in `[dependencies]`.
    pub dep_count: usize,
    /// Newest mtime (unix seconds) among the manifest and `src/`.
    pub last_modified: u64,
    pub is_workspace_member: bool,
    /// Set exactly when `is_workspace_member` is.
    pub workspace_root: Option<PathBuf>,
}

/// Display name used in batch results: the last path component.
pub fn project_name_for(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Per-project result envelope produced by one batch unit.
///
/// Only constructible through [`OperationResult::ok`] and [`OperationResult::failed`], so a
/// successful result always carries a payload and a failed one always carries an error.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperationResult<T> {
    project_path: PathBuf,
    project_name: String,
    success: bool,
    payload: Option<T>,
    error: Option<String>,
}

impl<T> OperationResult<T> {
    pub fn ok(project_path: impl Into<PathBuf>, payload: T) -> Self {
        let project_path = project_path.into();
        Self {
            project_name: project_name_for(&project_path),
            project_path,
            success: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn failed(project_path: impl Into<PathBuf>, error: impl Into<String>) -> Self {
        let project_path = project_path.into();
        Self {
            project_name: project_name_for(&project_path),
            project_path,
            success: false,
            payload: None,
            error: Some(error.into()),
        }
    }

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn payload(&self) -> Option<&T> {
        self.payload.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn into_payload(self) -> Option<T> {
        self.payload
    }

    /// Transform the payload, keeping path/name/error untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> OperationResult<U> {
        OperationResult {
            project_path: self.project_path,
            project_name: self.project_name,
            success: self.success,
            payload: self.payload.map(f),
            error: self.error,
        }
    }
}

/// `"<project>: <error>"` for each failed result, for display.
pub fn error_list<T>(results: &[OperationResult<T>]) -> Vec<String> {
    results
        .iter()
        .filter(|r| !r.is_success())
        .map(|r| format!("{}: {}", r.project_name(), r.error().unwrap_or("unknown error")))
        .collect()
}

// ---- Payloads (output shapes of the tool parsers) ----

/// One dependency that `cargo outdated` reports as behind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutdatedDep {
    pub name: String,
    pub current: String,
    pub latest: String,
    /// "Normal", "Development" or "Build".
    pub kind: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vulnerability {
    pub id: String,
    pub package: String,
    pub version: String,
    pub title: String,
    pub description: String,
    pub severity: String,
    pub url: Option<String>,
    pub patched_versions: Vec<String>,
}

/// Unmaintained / unsound / yanked notices from `cargo audit`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditWarning {
    pub kind: String,
    pub package: String,
    pub version: String,
    pub title: String,
    pub advisory_id: String,
    pub url: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub vulnerabilities: Vec<Vulnerability>,
    pub warnings: Vec<AuditWarning>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseInfo {
    pub name: String,
    pub version: String,
    pub license: String,
    pub authors: Option<String>,
    pub repository: Option<String>,
}

/// Toolchain pin and MSRV read from `rust-toolchain(.toml)` and `Cargo.toml`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainInfo {
    pub toolchain: Option<String>,
    pub channel: Option<String>,
    pub msrv: Option<String>,
    pub edition: Option<String>,
}

/// A dependency as declared in a manifest (version requirement, not resolved version).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredDep {
    pub name: String,
    pub version: String,
    pub kind: DepKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepKind {
    Normal,
    Development,
    Build,
}

/// Buffered result of one external command.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub command: String,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanReport {
    pub freed_bytes: u64,
    pub debug_only: bool,
}

/// Whether one cargo extension the analyses depend on is available.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolStatus {
    /// Crate name, e.g. `cargo-audit`.
    pub name: String,
    /// Cargo subcommand, e.g. `audit`.
    pub subcommand: String,
    pub installed: bool,
    pub install_hint: String,
}

// ---- Options ----

/// Lib-only discovery options for [`locate_projects`](crate::locator::locate_projects).
#[derive(Clone, Debug)]
pub struct ScanOpts {
    /// Exclude patterns (glob syntax, matched against directory names and full paths).
    /// Defaults from [`PackagePaths::default_exclude_patterns`] are always added.
    pub exclude: Vec<String>,
    /// Maximum walk depth below the root.
    pub max_depth: usize,
    /// Follow symbolic links.
    pub follow_links: bool,
    /// Compute `target/` sizes (the slow part of a scan).
    pub measure_targets: bool,
}

impl Default for ScanOpts {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            max_depth: ScanConsts::DEFAULT_MAX_DEPTH,
            follow_links: false,
            measure_targets: true,
        }
    }
}

impl From<&Opts> for ScanOpts {
    fn from(o: &Opts) -> Self {
        ScanOpts {
            exclude: o.exclude.clone(),
            max_depth: o.max_depth,
            follow_links: o.follow_links,
            measure_targets: true,
        }
    }
}

impl ScanOpts {
    /// User patterns plus the package defaults.
    pub fn effective_excludes(&self) -> Vec<String> {
        let mut exclude = PackagePaths::get().default_exclude_patterns();
        exclude.extend(self.exclude.iter().cloned());
        exclude
    }
}

/// Full options (CLI, config file).
/// Lib callers use [`ScanOpts`] and the [`Deck`](crate::deck::Deck) builders instead.
#[derive(Clone, Debug)]
pub struct Opts {
    /// Store path. When None, uses `root.join(<package db filename>)` (e.g. `.cratedeck`).
    pub db_path: Option<PathBuf>,
    /// Exclude patterns (glob syntax).
    pub exclude: Vec<String>,
    /// Maximum walk depth.
    pub max_depth: usize,
    /// Projects processed concurrently in a batch.
    pub jobs: usize,
    /// Cargo executable.
    pub cargo: String,
    /// Per-command deadline in seconds.
    pub timeout_secs: Option<u64>,
    /// Register one job per in-flight project (not just one per batch).
    pub per_unit_jobs: bool,
    /// Follow symbolic links while scanning.
    pub follow_links: bool,
    /// Debug logging and progress bars.
    pub verbose: bool,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            db_path: None,
            exclude: Vec::new(),
            max_depth: ScanConsts::DEFAULT_MAX_DEPTH,
            jobs: BatchConsts::DEFAULT_CONCURRENCY,
            cargo: ProcessConsts::CARGO.to_string(),
            timeout_secs: None,
            per_unit_jobs: false,
            follow_links: false,
            verbose: false,
        }
    }
}
