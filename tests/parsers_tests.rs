use cratedeck::DepKind;
use cratedeck::parsers::{
    parse_cargo_audit_json, parse_cargo_license_json, parse_cargo_outdated_json,
    parse_declared_deps, parse_manifest, parse_toolchain_plain, toolchain_info,
};

// --- cargo outdated ---

#[test]
fn test_outdated_keeps_only_behind_deps() {
    let json = r#"{
        "crate_name": "demo",
        "dependencies": [
            {"name": "serde", "project": "1.0.150", "compat": "1.0.200", "latest": "1.0.200", "kind": "Normal", "platform": null},
            {"name": "log", "project": "0.4.22", "compat": "---", "latest": "0.4.22", "kind": "Normal", "platform": null},
            {"name": "tempfile", "project": "3.8.0", "compat": "3.10.0", "latest": "3.10.0", "kind": "Development", "platform": null}
        ]
    }"#;
    let deps = parse_cargo_outdated_json(json).unwrap();
    assert_eq!(deps.len(), 2);
    assert_eq!(deps[0].name, "serde");
    assert_eq!(deps[0].current, "1.0.150");
    assert_eq!(deps[0].latest, "1.0.200");
    assert_eq!(deps[1].kind, "Development");
}

#[test]
fn test_outdated_rejects_garbage() {
    assert!(parse_cargo_outdated_json("error: could not find Cargo.toml").is_err());
}

// --- cargo audit ---

#[test]
fn test_audit_vulnerabilities_and_warnings() {
    let json = r#"{
        "vulnerabilities": {
            "found": true,
            "count": 1,
            "list": [{
                "advisory": {
                    "id": "RUSTSEC-2023-0071",
                    "title": "Marvin Attack",
                    "description": "timing sidechannel",
                    "url": "https://rustsec.org/advisories/RUSTSEC-2023-0071",
                    "cvss": "CVSS:3.1/AV:N"
                },
                "package": {"name": "rsa", "version": "0.9.6"},
                "versions": {"patched": [], "unaffected": []}
            }]
        },
        "warnings": {
            "unmaintained": [{
                "kind": "unmaintained",
                "package": {"name": "instant", "version": "0.1.13"},
                "advisory": {"id": "RUSTSEC-2024-0384", "title": "instant is unmaintained", "url": null}
            }],
            "yanked": [{
                "kind": "yanked",
                "package": {"name": "futures-util", "version": "0.3.30"},
                "advisory": null
            }]
        }
    }"#;
    let report = parse_cargo_audit_json(json).unwrap();
    assert_eq!(report.vulnerabilities.len(), 1);
    let v = &report.vulnerabilities[0];
    assert_eq!(v.id, "RUSTSEC-2023-0071");
    assert_eq!(v.package, "rsa");
    assert_eq!(v.severity, "CVSS:3.1/AV:N");
    assert!(v.patched_versions.is_empty());

    assert_eq!(report.warnings.len(), 2);
    assert_eq!(report.warnings[0].advisory_id, "RUSTSEC-2024-0384");
    assert_eq!(report.warnings[1].kind, "yanked");
    assert_eq!(report.warnings[1].title, "futures-util 0.3.30 is yanked");
}

#[test]
fn test_audit_clean_report() {
    let json = r#"{"vulnerabilities": {"found": false, "count": 0, "list": []}, "warnings": {}}"#;
    let report = parse_cargo_audit_json(json).unwrap();
    assert!(report.vulnerabilities.is_empty());
    assert!(report.warnings.is_empty());
}

// --- cargo license ---

#[test]
fn test_license_entries() {
    let json = r#"[
        {"name": "anyhow", "version": "1.0.86", "authors": "David Tolnay", "repository": "https://github.com/dtolnay/anyhow", "license": "MIT OR Apache-2.0", "license_file": null, "description": "errors"},
        {"name": "mystery", "version": "0.1.0", "authors": null, "repository": null, "license": null, "license_file": "LICENSE", "description": null}
    ]"#;
    let licenses = parse_cargo_license_json(json).unwrap();
    assert_eq!(licenses.len(), 2);
    assert_eq!(licenses[0].license, "MIT OR Apache-2.0");
    assert_eq!(licenses[1].license, "Unknown");
    assert_eq!(licenses[1].authors, None);
}

// --- manifests ---

#[test]
fn test_declared_deps_all_tables() {
    let manifest = r#"
[package]
name = "demo"

[dependencies]
serde = { version = "1.0", features = ["derive"] }
log = "0.4"
local = { path = "../local" }
shared = { workspace = true }

[dev-dependencies]
tempfile = "3.10"

[build-dependencies]
cc = { version = "1" }
"#;
    let mut deps = parse_declared_deps(manifest).unwrap();
    deps.sort_by(|a, b| a.name.cmp(&b.name));
    let names: Vec<&str> = deps.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["cc", "log", "serde", "tempfile"]);
    assert_eq!(deps[0].kind, DepKind::Build);
    assert_eq!(deps[2].version, "1.0");
    assert_eq!(deps[3].kind, DepKind::Development);
}

#[test]
fn test_manifest_summary_fields() {
    let manifest = r#"
[package]
name = "demo"
rust-version = "1.74"
edition = "2021"

[dependencies]
a = "1"
b = "2"

[workspace]
members = ["crates/*"]
"#;
    let m = parse_manifest(manifest).unwrap();
    assert_eq!(m.package_name(), Some("demo"));
    assert_eq!(m.dep_count(), 2);
    assert!(m.is_workspace_root());
    assert!(m.workspace_exclude().is_empty());
    assert_eq!(m.rust_version(), Some("1.74"));
}

#[test]
fn test_inherited_rust_version_ignored() {
    let manifest = "[package]\nname = \"x\"\nrust-version.workspace = true\n";
    let m = parse_manifest(manifest).unwrap();
    assert_eq!(m.rust_version(), None);
}

// --- toolchain files ---

#[test]
fn test_toolchain_toml_wins_over_plain() {
    let info = toolchain_info(
        Some("[toolchain]\nchannel = \"1.80.0\"\ncomponents = [\"clippy\"]\n"),
        Some("nightly"),
        Some("[package]\nname = \"x\"\nrust-version = \"1.70\"\n"),
    );
    assert_eq!(info.toolchain.as_deref(), Some("1.80.0"));
    assert_eq!(info.msrv.as_deref(), Some("1.70"));
}

#[test]
fn test_plain_toolchain_file() {
    assert_eq!(parse_toolchain_plain("stable\n").as_deref(), Some("stable"));
    assert_eq!(parse_toolchain_plain("   \n"), None);
    let info = toolchain_info(None, None, None);
    assert_eq!(info.toolchain, None);
    assert_eq!(info.msrv, None);
}
