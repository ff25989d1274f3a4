//! Per-project metadata: manifest summary, artifact size, last modification.

use log::warn;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

use crate::parsers::{ManifestSummary, parse_manifest};
use crate::utils::config::ScanConsts;
use crate::{ProjectDescriptor, project_name_for};

/// Read and parse `dir/Cargo.toml`. `None` (with a warning) when unreadable or malformed.
pub fn read_manifest(dir: &Path) -> Option<ManifestSummary> {
    let path = dir.join(ScanConsts::MANIFEST);
    let content = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) => {
            warn!("cannot read {}: {}", path.display(), e);
            return None;
        }
    };
    match parse_manifest(&content) {
        Ok(m) => Some(m),
        Err(e) => {
            warn!("malformed manifest {}: {:#}", path.display(), e);
            None
        }
    }
}

/// Total bytes of regular files under `path`. 0 when it does not exist.
/// Runs serially: callers already fan out over projects on the rayon pool.
pub fn dir_size(path: &Path) -> u64 {
    if !path.is_dir() {
        return 0;
    }
    jwalk::WalkDir::new(path)
        .skip_hidden(false)
        .follow_links(false)
        .parallelism(jwalk::Parallelism::Serial)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

fn mtime_secs(path: &Path) -> Option<u64> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
}

/// Newest mtime (unix seconds) among the manifest, `src/` and files in `src/`.
pub fn last_modified(dir: &Path) -> u64 {
    let src = dir.join("src");
    let mut newest = mtime_secs(&dir.join(ScanConsts::MANIFEST)).unwrap_or(0);
    if src.is_dir() {
        for entry in WalkDir::new(&src)
            .max_depth(ScanConsts::SRC_MTIME_DEPTH)
            .into_iter()
            .filter_map(Result::ok)
        {
            if let Some(t) = mtime_secs(entry.path()) {
                newest = newest.max(t);
            }
        }
    }
    newest
}

/// Build the descriptor for one project directory.
pub fn describe(
    dir: &Path,
    manifest: Option<&ManifestSummary>,
    workspace_root: Option<PathBuf>,
    measure_targets: bool,
) -> ProjectDescriptor {
    let name = manifest
        .and_then(|m| m.package_name())
        .map(String::from)
        .unwrap_or_else(|| project_name_for(dir));
    let target_size = if measure_targets {
        dir_size(&dir.join(ScanConsts::TARGET_DIR))
    } else {
        0
    };
    ProjectDescriptor {
        name,
        path: dir.to_path_buf(),
        target_size,
        dep_count: manifest.map(|m| m.dep_count()).unwrap_or(0),
        last_modified: last_modified(dir),
        is_workspace_member: workspace_root.is_some(),
        workspace_root,
    }
}
