//! Pure text → structure parsers for tool output and manifests.
//!
//! The engine never interprets tool output itself; operations hand stdout to these functions
//! and wrap whatever comes back (or the parse error) in an `OperationResult`.

pub mod json;
pub mod manifest;

pub use json::{parse_cargo_audit_json, parse_cargo_license_json, parse_cargo_outdated_json};
pub use manifest::{
    ManifestSummary, parse_declared_deps, parse_manifest, parse_toolchain_plain,
    parse_toolchain_toml, toolchain_info,
};
