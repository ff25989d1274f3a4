#![cfg(unix)]

use cratedeck::{
    AnalysisKind, BatchRun, CargoTools, CommandEvent, Deck, JobError, MemoryStore, OperationKind,
    OperationResult, OutdatedDep, PersistenceStore, error_list,
};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Stand-in for `cargo`: `outdated` is "missing" in projects named p3, hangs in projects holding
/// a `slow` file, and otherwise prints one outdated dependency. `sh` runs a shell snippet; any
/// other subcommand is "missing".
const FAKE_CARGO: &str = r#"#!/bin/sh
case "$1" in
  outdated)
    if [ -f slow ]; then
      sleep 30
    fi
    if [ "$(basename "$PWD")" = "p3" ]; then
      echo "error: no such command: \`outdated\`" >&2
      exit 101
    fi
    echo '{"crate_name":"x","dependencies":[{"name":"serde","project":"1.0.150","compat":"1.0.200","latest":"1.0.200","kind":"Normal","platform":null}]}'
    ;;
  sh)
    shift
    exec sh -c "$@"
    ;;
  *)
    echo "error: no such command: \`$1\`" >&2
    exit 101
    ;;
esac
"#;

fn fake_cargo(dir: &Path) -> PathBuf {
    let path = dir.join("fake-cargo");
    fs::write(&path, FAKE_CARGO).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn projects(root: &Path, n: usize) -> Vec<PathBuf> {
    (1..=n)
        .map(|i| {
            let dir = root.join(format!("p{}", i));
            fs::create_dir_all(&dir).unwrap();
            fs::write(
                dir.join("Cargo.toml"),
                format!("[package]\nname = \"p{}\"\n\n[dependencies]\nserde = \"1.0.150\"\n", i),
            )
            .unwrap();
            dir
        })
        .collect()
}

fn deck_with_fake(tmp: &TempDir, store: Option<Arc<dyn PersistenceStore>>) -> Deck {
    let cargo = fake_cargo(tmp.path());
    Deck::new(store)
        .with_tools(CargoTools::new(cargo.to_string_lossy()).timeout(Some(Duration::from_secs(30))))
        .concurrency(2)
}

// --- batches ---

#[test]
fn test_outdated_with_one_missing_tool() {
    let tmp = TempDir::new().unwrap();
    let paths = projects(tmp.path(), 5);
    let deck = deck_with_fake(&tmp, None);

    let batch = deck.check_all_outdated(&paths).unwrap();
    assert_eq!(batch.len(), 5);
    assert_eq!(batch.successes().count(), 4);
    assert_eq!(
        batch.error_list(),
        vec!["p3: cargo-outdated is not installed".to_string()]
    );
    let first = batch.results[0].payload().unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].current, "1.0.150");

    let cached = deck
        .get_cache::<Vec<OperationResult<Vec<OutdatedDep>>>>(AnalysisKind::Outdated)
        .unwrap();
    assert_eq!(cached.value.len(), 5);
    assert!(deck.list_jobs().is_empty());
}

#[test]
fn test_missing_audit_tool_fails_every_project() {
    let tmp = TempDir::new().unwrap();
    let paths = projects(tmp.path(), 2);
    let deck = deck_with_fake(&tmp, None);

    let batch = deck.check_all_audits(&paths).unwrap();
    assert_eq!(batch.failures().count(), 2);
    for r in &batch.results {
        assert_eq!(r.error(), Some("cargo-audit is not installed"));
    }
}

#[test]
fn test_run_batch_empty_paths() {
    let deck = Deck::new(None);
    assert!(deck.run_batch(&[], &OperationKind::Toolchain).is_err());
}

#[test]
fn test_dependency_analysis_cached_in_store() {
    let tmp = TempDir::new().unwrap();
    let paths = projects(tmp.path(), 3);
    let store: Arc<dyn PersistenceStore> = Arc::new(MemoryStore::new());
    let deck = Deck::new(Some(Arc::clone(&store)));

    let analysis = deck.analyze_dependencies(&paths).unwrap();
    let serde = analysis.report.group("serde").unwrap();
    assert_eq!(serde.project_count, 3);
    assert!(!serde.has_mismatch());

    // A fresh deck over the same store sees the cached report.
    let reopened = Deck::new(Some(store));
    assert!(
        reopened
            .get_cache::<serde_json::Value>(AnalysisKind::Dependencies)
            .is_some()
    );
}

#[test]
fn test_cancelled_batch_keeps_cached_result() {
    let tmp = TempDir::new().unwrap();
    let paths = projects(tmp.path(), 4);
    for p in &paths {
        fs::write(p.join("slow"), "").unwrap();
    }
    let deck = deck_with_fake(&tmp, None);
    let previous: Vec<OperationResult<Vec<OutdatedDep>>> = paths
        .iter()
        .map(|p| OperationResult::ok(p.clone(), Vec::new()))
        .collect();
    deck.save_cache(AnalysisKind::Outdated, &previous).unwrap();

    let start = Instant::now();
    let batch = thread::scope(|s| {
        let run = s.spawn(|| deck.check_all_outdated(&paths));
        while deck.list_jobs().is_empty() {
            thread::sleep(Duration::from_millis(10));
        }
        thread::sleep(Duration::from_millis(100));
        deck.registry().cancel_all();
        run.join().unwrap()
    })
    .unwrap();

    assert!(batch.cancelled);
    assert_eq!(batch.successes().count(), 0);
    assert!(start.elapsed() < Duration::from_secs(20));
    let cached = deck
        .get_cache::<Vec<OperationResult<Vec<OutdatedDep>>>>(AnalysisKind::Outdated)
        .unwrap();
    assert_eq!(cached.value, previous);
}

#[test]
fn test_dependency_analysis_lists_broken_manifest() {
    let tmp = TempDir::new().unwrap();
    let mut paths = projects(tmp.path(), 2);
    let broken = tmp.path().join("broken");
    fs::create_dir_all(&broken).unwrap();
    fs::write(broken.join("Cargo.toml"), "[package\nname = ").unwrap();
    paths.push(broken);

    let deck = Deck::new(None);
    let analysis = deck.analyze_dependencies(&paths).unwrap();
    assert_eq!(analysis.projects.len(), 3);
    assert_eq!(analysis.report.group("serde").unwrap().project_count, 2);

    let errors = error_list(&analysis.projects);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("broken: "));
}

#[test]
fn test_failed_command_keeps_stderr_tail() {
    let tmp = TempDir::new().unwrap();
    let paths = projects(tmp.path(), 1);
    let deck = deck_with_fake(&tmp, None);
    let script = "echo 'error[E0308]: mismatched types' >&2; echo ' --> src/main.rs:2:5' >&2; \
                  echo 'error: could not compile `p1`' >&2; exit 101";
    let kind = OperationKind::Command(vec!["sh".to_string(), script.to_string()]);

    let run = deck.run_batch(&paths, &kind).unwrap();
    let errors = run.error_list();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("exited with code 101"));
    assert!(errors[0].contains("error[E0308]: mismatched types"));
    assert!(errors[0].contains("src/main.rs:2:5"));
    assert!(errors[0].contains("could not compile"));
}

// --- tools ---

#[test]
fn test_check_tools_reports_each_extension() {
    let tmp = TempDir::new().unwrap();
    let paths = projects(tmp.path(), 1);
    let deck = deck_with_fake(&tmp, None);

    let tools = deck.check_tools(&paths[0]);
    let status: Vec<(&str, bool)> = tools
        .iter()
        .map(|t| (t.name.as_str(), t.installed))
        .collect();
    assert_eq!(
        status,
        vec![
            ("cargo-outdated", true),
            ("cargo-audit", false),
            ("cargo-license", false),
        ]
    );
    assert_eq!(tools[1].install_hint, "cargo install cargo-audit");
    assert!(deck.list_jobs().is_empty());
}

#[test]
fn test_clean_removes_target() {
    let tmp = TempDir::new().unwrap();
    let paths = projects(tmp.path(), 1);
    let debug = paths[0].join("target/debug");
    fs::create_dir_all(&debug).unwrap();
    fs::write(debug.join("artifact"), vec![1u8; 256]).unwrap();

    let deck = Deck::new(None);
    let run = deck
        .run_batch(&paths, &OperationKind::Clean { debug_only: false })
        .unwrap();
    let BatchRun::Clean(batch) = run else {
        panic!("expected a clean batch");
    };
    assert_eq!(batch.results[0].payload().unwrap().freed_bytes, 256);
    assert!(!paths[0].join("target").exists());
}

#[test]
fn test_command_batch_reports_exit_status() {
    let tmp = TempDir::new().unwrap();
    let paths = projects(tmp.path(), 2);
    let deck = deck_with_fake(&tmp, None);
    let kind = OperationKind::Command(vec!["sh".to_string(), "echo built".to_string()]);

    let run = deck.run_batch(&paths, &kind).unwrap();
    assert_eq!(run.len(), 2);
    assert_eq!(run.success_count(), 2);
    let BatchRun::Command(batch) = run else {
        panic!("expected a command batch");
    };
    assert_eq!(batch.results[1].payload().unwrap().stdout, "built");
}

// --- streaming ---

#[test]
fn test_streaming_cancel_removes_job() {
    let tmp = TempDir::new().unwrap();
    let paths = projects(tmp.path(), 1);
    let deck = deck_with_fake(&tmp, None);

    let (id, mut stream) = deck.run_streaming(
        &paths[0],
        "sh",
        &["echo compiling; sleep 30".to_string()],
    );
    assert_eq!(deck.list_jobs().len(), 1);
    assert_eq!(deck.settings().recent(), vec![paths[0].clone()]);

    match stream.next_timeout(Duration::from_secs(10)) {
        Some(CommandEvent::Line { line, .. }) => assert_eq!(line, "compiling"),
        other => panic!("expected a line, got {:?}", other),
    }

    deck.cancel_job(&id).unwrap();
    assert!(deck.list_jobs().is_empty());
    assert_eq!(deck.cancel_job(&id), Err(JobError::UnknownJob(id.clone())));

    let transcript = stream.into_transcript();
    assert!(!transcript.completion.success);
    assert!(transcript.completion.cancelled);
}

#[test]
fn test_streaming_job_removed_on_exit() {
    let tmp = TempDir::new().unwrap();
    let paths = projects(tmp.path(), 1);
    let deck = deck_with_fake(&tmp, None);

    let (_id, stream) = deck.run_streaming(&paths[0], "sh", &["echo done".to_string()]);
    let transcript = stream.into_transcript();
    assert!(transcript.completion.success);
    assert_eq!(transcript.lines.len(), 1);
    assert!(deck.list_jobs().is_empty());
}
