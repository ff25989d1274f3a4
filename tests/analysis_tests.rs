use cratedeck::analysis::{
    AuditSummary, OutdatedSummary, aggregate, analyze_dependencies, analyze_licenses,
    analyze_toolchains,
};
use cratedeck::{
    AuditReport, DeclaredDep, DepKind, LicenseInfo, OperationResult, OutdatedDep, ToolchainInfo,
    Vulnerability,
};

fn dep(name: &str, version: &str) -> DeclaredDep {
    DeclaredDep {
        name: name.to_string(),
        version: version.to_string(),
        kind: DepKind::Normal,
    }
}

fn lic(name: &str, license: &str) -> LicenseInfo {
    LicenseInfo {
        name: name.to_string(),
        version: "1.0.0".to_string(),
        license: license.to_string(),
        authors: None,
        repository: None,
    }
}

fn toolchain(pin: Option<&str>, msrv: Option<&str>) -> ToolchainInfo {
    ToolchainInfo {
        toolchain: pin.map(String::from),
        channel: pin.map(String::from),
        msrv: msrv.map(String::from),
        edition: Some("2021".to_string()),
    }
}

// --- dependencies ---

#[test]
fn test_dependency_version_groups() {
    let results = vec![
        OperationResult::ok("/p/a", vec![dep("serde", "1.0.150"), dep("log", "0.4")]),
        OperationResult::ok("/p/b", vec![dep("serde", "1.0.150")]),
        OperationResult::ok("/p/c", vec![dep("serde", "1.0.160"), dep("log", "0.4")]),
    ];
    let analysis = analyze_dependencies(results);
    let report = &analysis.report;

    assert_eq!(analysis.projects.len(), 3);
    assert_eq!(report.total_unique, 2);
    assert_eq!(report.mismatch_count, 1);

    let serde = report.group("serde").unwrap();
    assert!(serde.has_mismatch());
    assert_eq!(serde.project_count, 3);
    assert_eq!(serde.values[0].value, "1.0.150");
    assert_eq!(serde.values[0].projects.len(), 2);
    assert_eq!(serde.values[1].value, "1.0.160");
    assert_eq!(serde.values[1].projects.len(), 1);
    assert_eq!(serde.values[1].projects[0].name, "c");

    let log = report.group("log").unwrap();
    assert!(!log.has_mismatch());
    assert_eq!(log.project_count, 2);

    // Most widely used item first.
    assert_eq!(report.groups[0].name, "serde");
    assert_eq!(report.mismatches().count(), 1);
}

#[test]
fn test_failed_results_contribute_nothing() {
    let results: Vec<OperationResult<Vec<DeclaredDep>>> = vec![
        OperationResult::ok("/p/a", vec![dep("rand", "0.8")]),
        OperationResult::failed("/p/b", "cannot read Cargo.toml"),
    ];
    let analysis = analyze_dependencies(results);
    assert_eq!(analysis.report.total_unique, 1);
    assert_eq!(analysis.report.group("rand").unwrap().project_count, 1);
    // The failed project stays visible for the error list.
    assert_eq!(
        cratedeck::error_list(&analysis.projects),
        vec!["b: cannot read Cargo.toml".to_string()]
    );
}

#[test]
fn test_duplicate_pair_in_one_project_counts_once() {
    let results = vec![OperationResult::ok(
        "/p/a",
        vec![dep("cc", "1"), dep("cc", "1")],
    )];
    let analysis = analyze_dependencies(results);
    let cc = analysis.report.group("cc").unwrap();
    assert_eq!(cc.values.len(), 1);
    assert_eq!(cc.values[0].projects.len(), 1);
}

#[test]
fn test_aggregate_empty_input() {
    let results: Vec<OperationResult<Vec<(String, String)>>> = Vec::new();
    let report = aggregate(&results, |pairs| pairs.clone());
    assert_eq!(report.total_unique, 0);
    assert!(report.groups.is_empty());
}

// --- toolchains ---

#[test]
fn test_toolchain_mismatch_detected() {
    let analysis = analyze_toolchains(vec![
        OperationResult::ok("/p/a", toolchain(Some("stable"), Some("1.70"))),
        OperationResult::ok("/p/b", toolchain(Some("stable"), Some("1.74"))),
        OperationResult::ok("/p/c", toolchain(None, Some("1.70"))),
    ]);
    assert_eq!(analysis.toolchain_groups.len(), 1);
    assert_eq!(analysis.toolchain_groups[0].projects.len(), 2);
    assert_eq!(analysis.msrv_groups.len(), 2);
    assert_eq!(analysis.msrv_groups[0].value, "1.70");
    assert!(analysis.has_mismatches);
    assert_eq!(analysis.projects.len(), 3);
}

#[test]
fn test_toolchain_agreement() {
    let analysis = analyze_toolchains(vec![
        OperationResult::ok("/p/a", toolchain(Some("1.80.0"), None)),
        OperationResult::ok("/p/b", toolchain(Some("1.80.0"), None)),
    ]);
    assert!(!analysis.has_mismatches);
    assert!(analysis.msrv_groups.is_empty());
}

// --- licenses ---

#[test]
fn test_license_groups_problematic_first() {
    let analysis = analyze_licenses(vec![
        OperationResult::ok(
            "/p/a",
            vec![lic("serde", "MIT OR Apache-2.0"), lic("gpl-thing", "GPL-3.0")],
        ),
        OperationResult::ok(
            "/p/b",
            vec![lic("serde", "MIT OR Apache-2.0"), lic("log", "MIT OR Apache-2.0")],
        ),
        OperationResult::failed("/p/c", "cargo-license is not installed"),
    ]);

    assert_eq!(analysis.license_groups.len(), 2);
    assert_eq!(analysis.license_groups[0].license, "GPL-3.0");
    assert!(analysis.license_groups[0].is_problematic);
    assert_eq!(
        analysis.license_groups[1].packages,
        vec!["log@1.0.0", "serde@1.0.0"]
    );
    assert_eq!(analysis.total_packages, 3);
    assert_eq!(analysis.problematic_count, 1);
    assert_eq!(analysis.projects.len(), 3);
}

// --- summaries ---

#[test]
fn test_outdated_summary_counts() {
    let outdated = OutdatedDep {
        name: "tokio".to_string(),
        current: "1.0.0".to_string(),
        latest: "1.40.0".to_string(),
        kind: "Normal".to_string(),
    };
    let results = vec![
        OperationResult::ok("/p/a", vec![outdated.clone(), outdated]),
        OperationResult::ok("/p/b", Vec::new()),
        OperationResult::failed("/p/c", "boom"),
    ];
    let s = OutdatedSummary::from_results(&results);
    assert_eq!(s.projects_checked, 3);
    assert_eq!(s.projects_with_outdated, 1);
    assert_eq!(s.total_outdated, 2);
    assert_eq!(s.projects_failed, 1);
}

#[test]
fn test_audit_summary_counts() {
    let vuln = Vulnerability {
        id: "RUSTSEC-2024-0001".to_string(),
        package: "bad".to_string(),
        version: "0.1.0".to_string(),
        title: "Bad".to_string(),
        description: String::new(),
        severity: "high".to_string(),
        url: None,
        patched_versions: vec![],
    };
    let results = vec![
        OperationResult::ok(
            "/p/a",
            AuditReport {
                vulnerabilities: vec![vuln],
                warnings: vec![],
            },
        ),
        OperationResult::ok("/p/b", AuditReport::default()),
    ];
    let s = AuditSummary::from_results(&results);
    assert_eq!(s.vulnerable_projects, 1);
    assert_eq!(s.total_vulnerabilities, 1);
    assert_eq!(s.projects_failed, 0);
}
