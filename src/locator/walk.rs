//! Discovery walk: finds every directory holding a `Cargo.toml`, records unreadable subtrees.

use log::warn;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::ScanOpts;
use crate::utils::config::ScanConsts;

use super::filter::is_excluded;

/// One result from the directory walk: either a path to consider or an error with optional path.
pub enum WalkOutcome {
    Ok(PathBuf),
    Err { msg: String, path: Option<PathBuf> },
}

/// Convert a walkdir result into [`WalkOutcome`].
pub fn to_outcome_walkdir(r: Result<walkdir::DirEntry, walkdir::Error>) -> WalkOutcome {
    match r {
        Ok(entry) => WalkOutcome::Ok(entry.into_path()),
        Err(err) => WalkOutcome::Err {
            msg: format!("{}", err),
            path: err.path().map(PathBuf::from),
        },
    }
}

/// Project directories found by the walk plus the paths that could not be read.
#[derive(Debug, Default)]
pub struct WalkResult {
    pub project_dirs: Vec<PathBuf>,
    pub skipped: Vec<(PathBuf, String)>,
}

/// Walk `root` down to `max_depth` project levels, pruning excluded directories.
pub fn find_manifest_dirs(root: &Path, opts: &ScanOpts, exclude: &[String]) -> WalkResult {
    let iter = WalkDir::new(root)
        .follow_links(opts.follow_links)
        // Manifests sit one level below the deepest project directory.
        .max_depth(opts.max_depth + 1)
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && is_excluded(e.path(), root, exclude)))
        .map(to_outcome_walkdir);
    run_walk_loop(iter)
}

/// Consume `iter`, keep the parent of every manifest file, and record every error (with a
/// synthetic path when walkdir gives none).
pub fn run_walk_loop<I>(iter: I) -> WalkResult
where
    I: Iterator<Item = WalkOutcome>,
{
    let mut result = WalkResult::default();
    let mut last_path: Option<PathBuf> = None;
    for outcome in iter {
        match outcome {
            WalkOutcome::Ok(path) => {
                if path.file_name().and_then(|n| n.to_str()) == Some(ScanConsts::MANIFEST)
                    && path.is_file()
                    && let Some(dir) = path.parent()
                {
                    result.project_dirs.push(dir.to_path_buf());
                }
                last_path = Some(path);
            }
            WalkOutcome::Err { msg, path } => {
                let to_push = path.unwrap_or_else(|| {
                    PathBuf::from(format!(
                        "<no-path, last was {}>",
                        last_path
                            .as_ref()
                            .map(|p| p.display().to_string())
                            .unwrap_or_else(|| "<none>".to_string())
                    ))
                });
                warn!("skipping {}: {}", to_push.display(), msg);
                result.skipped.push((to_push, msg));
            }
        }
    }
    result
}
