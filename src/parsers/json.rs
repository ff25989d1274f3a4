//! Parsers for the JSON emitted by `cargo outdated`, `cargo audit` and `cargo license`.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{AuditReport, AuditWarning, LicenseInfo, OutdatedDep, Vulnerability};

// ---- cargo outdated --format json ----

#[derive(Debug, Deserialize)]
struct CargoOutdatedOutput {
    dependencies: Vec<CargoOutdatedDep>,
}

#[derive(Debug, Deserialize)]
struct CargoOutdatedDep {
    name: String,
    project: String,
    latest: String,
    kind: Option<String>,
}

/// Dependencies whose locked version differs from the latest one.
pub fn parse_cargo_outdated_json(json_str: &str) -> Result<Vec<OutdatedDep>> {
    let parsed: CargoOutdatedOutput =
        serde_json::from_str(json_str).context("parse cargo outdated JSON")?;

    Ok(parsed
        .dependencies
        .into_iter()
        .filter(|d| d.project != d.latest)
        .map(|d| OutdatedDep {
            name: d.name,
            current: d.project,
            latest: d.latest,
            kind: d.kind.unwrap_or_else(|| "Normal".to_string()),
        })
        .collect())
}

// ---- cargo audit --json ----

#[derive(Debug, Deserialize)]
struct CargoAuditOutput {
    vulnerabilities: CargoAuditVulns,
    warnings: Option<CargoAuditWarnings>,
}

#[derive(Debug, Deserialize)]
struct CargoAuditVulns {
    list: Vec<CargoAuditVuln>,
}

#[derive(Debug, Deserialize)]
struct CargoAuditVuln {
    advisory: CargoAuditAdvisory,
    package: CargoAuditPackage,
    versions: Option<CargoAuditVersions>,
}

#[derive(Debug, Deserialize)]
struct CargoAuditAdvisory {
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    url: Option<String>,
    cvss: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CargoAuditPackage {
    name: String,
    version: String,
}

#[derive(Debug, Deserialize)]
struct CargoAuditVersions {
    #[serde(default)]
    patched: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CargoAuditWarnings {
    unmaintained: Option<Vec<CargoAuditWarning>>,
    unsound: Option<Vec<CargoAuditWarning>>,
    yanked: Option<Vec<CargoAuditWarning>>,
}

#[derive(Debug, Deserialize)]
struct CargoAuditWarning {
    kind: String,
    package: CargoAuditPackage,
    advisory: Option<CargoAuditAdvisory>,
}

fn to_warning(w: CargoAuditWarning) -> AuditWarning {
    let (title, advisory_id, url) = match w.advisory {
        Some(a) => (a.title, a.id, a.url),
        // Yanked notices carry no advisory.
        None => {
            let title = format!("{} {} is {}", w.package.name, w.package.version, w.kind);
            (title, String::new(), None)
        }
    };
    AuditWarning {
        kind: w.kind,
        package: w.package.name,
        version: w.package.version,
        title,
        advisory_id,
        url,
    }
}

/// Vulnerabilities plus unmaintained/unsound/yanked warnings.
pub fn parse_cargo_audit_json(json_str: &str) -> Result<AuditReport> {
    let parsed: CargoAuditOutput =
        serde_json::from_str(json_str).context("parse cargo audit JSON")?;

    let vulnerabilities = parsed
        .vulnerabilities
        .list
        .into_iter()
        .map(|v| Vulnerability {
            id: v.advisory.id,
            package: v.package.name,
            version: v.package.version,
            title: v.advisory.title,
            description: v.advisory.description,
            severity: v.advisory.cvss.unwrap_or_else(|| "unknown".to_string()),
            url: v.advisory.url,
            patched_versions: v.versions.map(|v| v.patched).unwrap_or_default(),
        })
        .collect();

    let warnings = parsed
        .warnings
        .map(|w| {
            [w.unmaintained, w.unsound, w.yanked]
                .into_iter()
                .flatten()
                .flatten()
                .map(to_warning)
                .collect()
        })
        .unwrap_or_default();

    Ok(AuditReport {
        vulnerabilities,
        warnings,
    })
}

// ---- cargo license --json ----

#[derive(Debug, Deserialize)]
struct CargoLicenseEntry {
    name: String,
    version: String,
    authors: Option<String>,
    repository: Option<String>,
    license: Option<String>,
}

pub fn parse_cargo_license_json(json_str: &str) -> Result<Vec<LicenseInfo>> {
    let parsed: Vec<CargoLicenseEntry> =
        serde_json::from_str(json_str).context("parse cargo license JSON")?;

    Ok(parsed
        .into_iter()
        .map(|e| LicenseInfo {
            name: e.name,
            version: e.version,
            license: e.license.unwrap_or_else(|| "Unknown".to_string()),
            authors: e.authors,
            repository: e.repository,
        })
        .collect())
}
