//! Workspace membership for discovered manifests.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use crate::parsers::ManifestSummary;

use super::filter::glob_match;

/// Workspace roots found in the scan, keyed by directory, with their `exclude` lists.
pub type WorkspaceRoots = HashMap<PathBuf, Vec<String>>;

pub fn collect_workspace_roots<'a, I>(manifests: I) -> WorkspaceRoots
where
    I: IntoIterator<Item = (&'a PathBuf, &'a ManifestSummary)>,
{
    manifests
        .into_iter()
        .filter(|(_, m)| m.is_workspace_root())
        .map(|(dir, m)| (dir.clone(), m.workspace_exclude().to_vec()))
        .collect()
}

/// Lexically resolve `.` and `..` so `package.workspace = "../.."` compares equal to the
/// discovered root directory.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

fn is_excluded_member(rel: &Path, exclude: &[String]) -> bool {
    let rel_str = rel.to_string_lossy().replace('\\', "/");
    exclude.iter().any(|pattern| {
        let pattern = pattern.trim_end_matches('/');
        rel.starts_with(pattern) || glob_match(pattern, &rel_str)
    })
}

/// Workspace directory `dir` belongs to, if any. An explicit `package.workspace` wins; otherwise
/// the nearest discovered workspace root above `dir` (not above `scan_root`) claims it unless
/// its `exclude` list names it. A workspace root is never a member of itself.
pub fn resolve_workspace_root(
    dir: &Path,
    manifest: Option<&ManifestSummary>,
    roots: &WorkspaceRoots,
    scan_root: &Path,
) -> Option<PathBuf> {
    if let Some(rel) = manifest.and_then(|m| m.explicit_workspace()) {
        let ws = dir
            .join(rel)
            .canonicalize()
            .unwrap_or_else(|_| normalize(&dir.join(rel)));
        return (ws != dir).then_some(ws);
    }

    for ancestor in dir.ancestors().skip(1) {
        if !ancestor.starts_with(scan_root) {
            break;
        }
        if let Some(exclude) = roots.get(ancestor) {
            let rel = dir.strip_prefix(ancestor).unwrap_or(dir);
            return (!is_excluded_member(rel, exclude)).then(|| ancestor.to_path_buf());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_parent_components() {
        assert_eq!(
            normalize(Path::new("/a/b/crates/x/../..")),
            PathBuf::from("/a/b")
        );
    }

    #[test]
    fn nearest_root_claims_member_unless_excluded() {
        let scan = PathBuf::from("/scan");
        let mut roots = WorkspaceRoots::new();
        roots.insert(scan.join("ws"), vec!["crates/skip".to_string()]);

        assert_eq!(
            resolve_workspace_root(&scan.join("ws/crates/a"), None, &roots, &scan),
            Some(scan.join("ws"))
        );
        assert_eq!(
            resolve_workspace_root(&scan.join("ws/crates/skip"), None, &roots, &scan),
            None
        );
        assert_eq!(
            resolve_workspace_root(&scan.join("ws"), None, &roots, &scan),
            None
        );
        assert_eq!(
            resolve_workspace_root(&scan.join("other"), None, &roots, &scan),
            None
        );
    }
}
