//! Load `.cratedeck.toml` from the scan root (CLI only). Lib callers build [`Opts`] themselves.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::Opts;
use crate::utils::config::PackagePaths;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DeckToml {
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsSection {
    db_path: Option<String>,
    exclude: Option<Vec<String>>,
    max_depth: Option<usize>,
    jobs: Option<usize>,
    cargo: Option<String>,
    timeout: Option<u64>,
    per_unit_jobs: Option<bool>,
    follow_links: Option<bool>,
    verbose: Option<bool>,
}

/// Load `.cratedeck.toml` from `dir` if present. Returns None if file missing or unreadable.
pub(crate) fn load_deck_toml(dir: &Path) -> Option<DeckToml> {
    let path = dir.join(PackagePaths::get().config_filename());
    let s = std::fs::read_to_string(&path).ok()?;
    parse_deck_toml(&s)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}

pub(crate) fn parse_deck_toml(s: &str) -> Result<DeckToml, toml::de::Error> {
    toml::from_str(s)
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($idx:expr, $opts:expr, $idx_field:ident => $opts_field:ident) => {
        if let Some(v) = $idx.$idx_field {
            $opts.$opts_field = v;
        }
    };
}

/// Apply file config to opts (only set fields present in the file). Call before applying CLI.
pub(crate) fn apply_file_to_opts(file: &DeckToml, opts: &mut Opts) {
    let s = &file.settings;
    if let Some(ref p) = s.db_path {
        opts.db_path = Some(PathBuf::from(p));
    }
    if let Some(ref v) = s.exclude {
        opts.exclude = v.clone();
    }
    apply_file_opt!(s, opts, max_depth => max_depth);
    apply_file_opt!(s, opts, jobs => jobs);
    if let Some(ref c) = s.cargo {
        opts.cargo = c.clone();
    }
    if let Some(secs) = s.timeout {
        opts.timeout_secs = Some(secs);
    }
    apply_file_opt!(s, opts, per_unit_jobs => per_unit_jobs);
    apply_file_opt!(s, opts, follow_links => follow_links);
    apply_file_opt!(s, opts, verbose => verbose);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_values_override_defaults() {
        let file = parse_deck_toml(
            r#"
            [settings]
            jobs = 2
            max_depth = 6
            exclude = ["vendor"]
            cargo = "/opt/cargo"
            timeout = 30
            "#,
        )
        .unwrap();
        let mut opts = Opts::default();
        apply_file_to_opts(&file, &mut opts);
        assert_eq!(opts.jobs, 2);
        assert_eq!(opts.max_depth, 6);
        assert_eq!(opts.exclude, vec!["vendor".to_string()]);
        assert_eq!(opts.cargo, "/opt/cargo");
        assert_eq!(opts.timeout_secs, Some(30));
        assert!(!opts.per_unit_jobs);
    }

    #[test]
    fn test_missing_section_keeps_defaults() {
        let file = parse_deck_toml("").unwrap();
        let mut opts = Opts::default();
        apply_file_to_opts(&file, &mut opts);
        assert_eq!(opts.jobs, Opts::default().jobs);
        assert!(opts.db_path.is_none());
    }
}
