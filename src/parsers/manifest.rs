//! Minimal `Cargo.toml` / `rust-toolchain` readers. Only the fields the engine needs.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{DeclaredDep, DepKind, ToolchainInfo};

#[derive(Debug, Default, Deserialize)]
pub struct ManifestSummary {
    package: Option<PackageSection>,
    dependencies: Option<toml::Table>,
    workspace: Option<WorkspaceSection>,
}

#[derive(Debug, Default, Deserialize)]
struct PackageSection {
    name: Option<String>,
    /// Explicit `package.workspace = "../.."`.
    workspace: Option<String>,
    #[serde(rename = "rust-version")]
    rust_version: Option<toml::Value>,
    edition: Option<toml::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct WorkspaceSection {
    #[serde(default)]
    exclude: Vec<String>,
}

impl ManifestSummary {
    pub fn package_name(&self) -> Option<&str> {
        self.package.as_ref()?.name.as_deref()
    }

    pub fn dep_count(&self) -> usize {
        self.dependencies.as_ref().map(|d| d.len()).unwrap_or(0)
    }

    /// Has a `[workspace]` table (virtual or root package).
    pub fn is_workspace_root(&self) -> bool {
        self.workspace.is_some()
    }

    pub fn workspace_exclude(&self) -> &[String] {
        self.workspace.as_ref().map(|w| w.exclude.as_slice()).unwrap_or(&[])
    }

    /// Relative path from `package.workspace`, if declared.
    pub fn explicit_workspace(&self) -> Option<&str> {
        self.package.as_ref()?.workspace.as_deref()
    }

    /// `rust-version` when given literally (not inherited with `workspace = true`).
    pub fn rust_version(&self) -> Option<&str> {
        self.package.as_ref()?.rust_version.as_ref()?.as_str()
    }

    pub fn edition(&self) -> Option<&str> {
        self.package.as_ref()?.edition.as_ref()?.as_str()
    }
}

pub fn parse_manifest(content: &str) -> Result<ManifestSummary> {
    toml::from_str(content).context("parse Cargo.toml")
}

#[derive(Debug, Deserialize)]
struct DependencyTables {
    dependencies: Option<toml::Table>,
    #[serde(rename = "dev-dependencies")]
    dev_dependencies: Option<toml::Table>,
    #[serde(rename = "build-dependencies")]
    build_dependencies: Option<toml::Table>,
}

/// Version requirement of one dependency entry. `None` for path/git/workspace-inherited deps.
fn extract_version(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Table(t) => t.get("version").and_then(|v| v.as_str().map(String::from)),
        _ => None,
    }
}

/// All versioned dependencies across normal, dev and build tables.
pub fn parse_declared_deps(content: &str) -> Result<Vec<DeclaredDep>> {
    let tables: DependencyTables = toml::from_str(content).context("parse Cargo.toml")?;
    let mut deps = Vec::new();
    for (table, kind) in [
        (tables.dependencies, DepKind::Normal),
        (tables.dev_dependencies, DepKind::Development),
        (tables.build_dependencies, DepKind::Build),
    ] {
        for (name, value) in table.into_iter().flatten() {
            if let Some(version) = extract_version(&value) {
                deps.push(DeclaredDep {
                    name,
                    version,
                    kind,
                });
            }
        }
    }
    Ok(deps)
}

#[derive(Debug, Deserialize)]
struct RustToolchainToml {
    toolchain: Option<RustToolchainSpec>,
}

#[derive(Debug, Deserialize)]
struct RustToolchainSpec {
    channel: Option<String>,
}

/// Channel from a `rust-toolchain.toml`.
pub fn parse_toolchain_toml(content: &str) -> Option<String> {
    toml::from_str::<RustToolchainToml>(content)
        .ok()?
        .toolchain?
        .channel
}

/// Channel from a legacy plain `rust-toolchain` file (single line), which may also be TOML.
pub fn parse_toolchain_plain(content: &str) -> Option<String> {
    if let Some(channel) = parse_toolchain_toml(content) {
        return Some(channel);
    }
    let trimmed = content.trim();
    (!trimmed.is_empty() && !trimmed.contains('\n')).then(|| trimmed.to_string())
}

/// Toolchain pin (from either toolchain file) plus MSRV/edition from the manifest.
pub fn toolchain_info(
    toolchain_toml: Option<&str>,
    toolchain_plain: Option<&str>,
    manifest: Option<&str>,
) -> ToolchainInfo {
    let channel = toolchain_toml
        .and_then(parse_toolchain_toml)
        .or_else(|| toolchain_plain.and_then(parse_toolchain_plain));
    let summary = manifest.and_then(|m| parse_manifest(m).ok());
    ToolchainInfo {
        toolchain: channel.clone(),
        channel,
        msrv: summary
            .as_ref()
            .and_then(|s| s.rust_version().map(String::from)),
        edition: summary.as_ref().and_then(|s| s.edition().map(String::from)),
    }
}
