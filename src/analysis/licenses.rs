//! License inventory across projects.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::{LicenseInfo, OperationResult};

/// Licenses that may carry copyleft or commercial-use restrictions.
const PROBLEMATIC_LICENSES: &[&str] = &[
    "GPL",
    "AGPL",
    "LGPL",
    "CC-BY-SA",
    "CC-BY-NC",
    "SSPL",
    "BSL",
    "BUSL",
    "Elastic",
    "Commons Clause",
];

pub fn is_problematic_license(license: &str) -> bool {
    let upper = license.to_uppercase();
    PROBLEMATIC_LICENSES
        .iter()
        .any(|p| upper.contains(&p.to_uppercase()))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseGroup {
    pub license: String,
    /// Distinct `name@version` strings, sorted.
    pub packages: Vec<String>,
    pub is_problematic: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LicenseAnalysis {
    pub projects: Vec<OperationResult<Vec<LicenseInfo>>>,
    pub license_groups: Vec<LicenseGroup>,
    pub total_packages: usize,
    /// Packages under a problematic license.
    pub problematic_count: usize,
}

pub fn analyze_licenses(results: Vec<OperationResult<Vec<LicenseInfo>>>) -> LicenseAnalysis {
    let mut by_license: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for licenses in results
        .iter()
        .filter(|r| r.is_success())
        .filter_map(|r| r.payload())
    {
        for lic in licenses {
            by_license
                .entry(lic.license.clone())
                .or_default()
                .insert(format!("{}@{}", lic.name, lic.version));
        }
    }

    let mut license_groups: Vec<LicenseGroup> = by_license
        .into_iter()
        .map(|(license, packages)| LicenseGroup {
            is_problematic: is_problematic_license(&license),
            license,
            packages: packages.into_iter().collect(),
        })
        .collect();

    // Problematic first, then most packages.
    license_groups.sort_by(|a, b| {
        b.is_problematic
            .cmp(&a.is_problematic)
            .then_with(|| b.packages.len().cmp(&a.packages.len()))
            .then_with(|| a.license.cmp(&b.license))
    });

    let total_packages = license_groups.iter().map(|g| g.packages.len()).sum();
    let problematic_count = license_groups
        .iter()
        .filter(|g| g.is_problematic)
        .map(|g| g.packages.len())
        .sum();

    LicenseAnalysis {
        projects: results,
        license_groups,
        total_packages,
        problematic_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn problematic_detection_is_case_insensitive() {
        assert!(is_problematic_license("GPL-3.0"));
        assert!(is_problematic_license("lgpl-2.1-or-later"));
        assert!(is_problematic_license("BUSL-1.1"));
        assert!(!is_problematic_license("MIT OR Apache-2.0"));
        assert!(!is_problematic_license("BSD-3-Clause"));
    }
}
