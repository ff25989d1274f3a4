//! Cross-project reductions of batch results.
//!
//! [`aggregate`] is the generic core: it groups `(name, value)` pairs contributed by each
//! successful project and counts names that appear with more than one value. The dependency,
//! toolchain and license reports are thin layers over it.

pub mod dependencies;
pub mod licenses;
pub mod summary;
pub mod toolchain;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::OperationResult;

pub use dependencies::{DependencyAnalysis, analyze_dependencies};
pub use licenses::{LicenseAnalysis, LicenseGroup, analyze_licenses, is_problematic_license};
pub use summary::{AuditSummary, OutdatedSummary};
pub use toolchain::{ToolchainAnalysis, analyze_toolchains};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectRef {
    pub name: String,
    pub path: PathBuf,
}

/// One value of an item and the projects that use it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueGroup {
    pub value: String,
    pub projects: Vec<ProjectRef>,
}

/// Every value seen for one item name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemGroup {
    pub name: String,
    pub values: Vec<ValueGroup>,
    /// Distinct projects contributing any value for this name.
    pub project_count: usize,
}

impl ItemGroup {
    pub fn has_mismatch(&self) -> bool {
        self.values.len() > 1
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub groups: Vec<ItemGroup>,
    /// Distinct names across all successful results.
    pub total_unique: usize,
    /// Names seen with two or more distinct values.
    pub mismatch_count: usize,
}

impl AggregateReport {
    pub fn group(&self, name: &str) -> Option<&ItemGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn mismatches(&self) -> impl Iterator<Item = &ItemGroup> {
        self.groups.iter().filter(|g| g.has_mismatch())
    }
}

/// Sort value groups: most projects first, then value.
fn sort_values(values: &mut [ValueGroup]) {
    values.sort_by(|a, b| {
        b.projects
            .len()
            .cmp(&a.projects.len())
            .then_with(|| a.value.cmp(&b.value))
    });
}

/// Group `(name, value)` pairs from every successful result. Failed results contribute nothing;
/// a pair repeated within one project counts once.
pub fn aggregate<T, F, I>(results: &[OperationResult<T>], extract: F) -> AggregateReport
where
    F: Fn(&T) -> I,
    I: IntoIterator<Item = (String, String)>,
{
    // name -> value -> projects (path-keyed, so duplicates collapse)
    let mut map: BTreeMap<String, BTreeMap<String, BTreeMap<PathBuf, String>>> = BTreeMap::new();
    for result in results {
        let Some(payload) = result.payload().filter(|_| result.is_success()) else {
            continue;
        };
        for (name, value) in extract(payload) {
            map.entry(name)
                .or_default()
                .entry(value)
                .or_default()
                .insert(
                    result.project_path().to_path_buf(),
                    result.project_name().to_string(),
                );
        }
    }

    let mut groups: Vec<ItemGroup> = map
        .into_iter()
        .map(|(name, values)| {
            let project_count = values
                .values()
                .flat_map(|projects| projects.keys())
                .collect::<BTreeSet<_>>()
                .len();
            let mut values: Vec<ValueGroup> = values
                .into_iter()
                .map(|(value, projects)| ValueGroup {
                    value,
                    projects: projects
                        .into_iter()
                        .map(|(path, name)| ProjectRef { name, path })
                        .collect(),
                })
                .collect();
            sort_values(&mut values);
            ItemGroup {
                name,
                values,
                project_count,
            }
        })
        .collect();

    groups.sort_by(|a, b| {
        b.project_count
            .cmp(&a.project_count)
            .then_with(|| a.name.cmp(&b.name))
    });

    AggregateReport {
        total_unique: groups.len(),
        mismatch_count: groups.iter().filter(|g| g.has_mismatch()).count(),
        groups,
    }
}
