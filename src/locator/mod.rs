//! Project discovery under a root directory.
//!
//! The walk itself is serial (walkdir, pruned by exclude patterns); manifest reading and
//! metadata (artifact sizes, mtimes) fan out over the rayon pool.

pub mod filter;
pub mod metadata;
pub mod walk;
pub mod workspace;

use log::debug;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::DiscoveryError;
use crate::{ProjectDescriptor, ScanOpts};

pub use filter::glob_match;
pub use metadata::dir_size;

/// Projects found under a root, plus paths the walk could not read.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub projects: Vec<ProjectDescriptor>,
    pub skipped: Vec<(PathBuf, String)>,
}

fn check_root(root: &Path) -> Result<PathBuf, DiscoveryError> {
    let meta = fs::metadata(root).map_err(|e| DiscoveryError::InvalidRoot {
        path: root.to_path_buf(),
        reason: e.to_string(),
    })?;
    if !meta.is_dir() {
        return Err(DiscoveryError::InvalidRoot {
            path: root.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }
    root.canonicalize()
        .map_err(|source| DiscoveryError::Unreadable {
            path: root.to_path_buf(),
            source,
        })
}

/// Find every Cargo project under `root`. Malformed manifests still produce a descriptor
/// (named after the directory); unreadable subtrees end up in [`ScanOutcome::skipped`].
pub fn locate_projects(root: &Path, opts: &ScanOpts) -> Result<ScanOutcome, DiscoveryError> {
    let root = check_root(root)?;
    let exclude = opts.effective_excludes();
    let walked = walk::find_manifest_dirs(&root, opts, &exclude);
    debug!(
        "found {} manifests under {} ({} skipped)",
        walked.project_dirs.len(),
        root.display(),
        walked.skipped.len()
    );

    let manifests: Vec<_> = walked
        .project_dirs
        .into_par_iter()
        .map(|dir| {
            let manifest = metadata::read_manifest(&dir);
            (dir, manifest)
        })
        .collect();

    let roots = workspace::collect_workspace_roots(
        manifests
            .iter()
            .filter_map(|(dir, m)| m.as_ref().map(|m| (dir, m))),
    );

    let mut projects: Vec<ProjectDescriptor> = manifests
        .par_iter()
        .map(|(dir, manifest)| {
            let ws = workspace::resolve_workspace_root(dir, manifest.as_ref(), &roots, &root);
            metadata::describe(dir, manifest.as_ref(), ws, opts.measure_targets)
        })
        .collect();

    projects.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.path.cmp(&b.path))
    });

    Ok(ScanOutcome {
        projects,
        skipped: walked.skipped,
    })
}
