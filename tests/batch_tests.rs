use cratedeck::batch::CANCELLED;
use cratedeck::{BatchError, BatchExecutor, JobRegistry, OperationResult};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

fn fake_paths(n: usize) -> Vec<PathBuf> {
    (0..n).map(|i| PathBuf::from(format!("/projects/p{}", i))).collect()
}

fn executor(concurrency: usize) -> BatchExecutor {
    BatchExecutor::new(Arc::new(JobRegistry::new())).concurrency(concurrency)
}

// --- ordering and partial failure ---

#[test]
fn test_results_in_input_order() {
    let paths = fake_paths(10);
    let batch = executor(4)
        .run("order", &paths, |p, _| {
            // Later inputs finish first.
            let n: u64 = p.to_string_lossy().trim_start_matches("/projects/p").parse().unwrap();
            thread::sleep(Duration::from_millis(30 - n * 3));
            OperationResult::ok(p, n)
        })
        .unwrap();

    assert_eq!(batch.len(), 10);
    for (i, r) in batch.results.iter().enumerate() {
        assert_eq!(r.project_path(), paths[i].as_path());
        assert_eq!(r.payload(), Some(&(i as u64)));
    }
    assert!(!batch.cancelled);
}

#[test]
fn test_partial_failure_keeps_every_result() {
    let paths = fake_paths(5);
    let batch = executor(2)
        .run("mixed", &paths, |p, _| {
            if p.ends_with("p3") {
                OperationResult::failed(p, "boom")
            } else {
                OperationResult::ok(p, ())
            }
        })
        .unwrap();

    assert_eq!(batch.len(), 5);
    assert_eq!(batch.successes().count(), 4);
    assert_eq!(batch.error_list(), vec!["p3: boom".to_string()]);
}

#[test]
fn test_empty_input_is_no_projects() {
    let err = executor(2)
        .run("empty", &[], |p, _| OperationResult::ok(p, ()))
        .unwrap_err();
    assert_eq!(
        err,
        BatchError::NoProjects {
            label: "empty".to_string()
        }
    );
}

// --- concurrency ---

#[test]
fn test_concurrency_never_exceeded() {
    let paths = fake_paths(16);
    let in_flight = AtomicUsize::new(0);
    let peak = AtomicUsize::new(0);
    let batch = executor(3)
        .run("bounded", &paths, |p, _| {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(15));
            in_flight.fetch_sub(1, Ordering::SeqCst);
            OperationResult::ok(p, ())
        })
        .unwrap();

    assert_eq!(batch.successes().count(), 16);
    let peak = peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak in-flight {} exceeds 3", peak);
    assert!(peak >= 1);
}

#[test]
fn test_effective_concurrency_bounded_by_input() {
    let exec = executor(8);
    assert_eq!(exec.effective_concurrency(2), 2);
    assert_eq!(exec.effective_concurrency(0), 1);
    assert!(exec.effective_concurrency(100) <= 8);
}

// --- panics and cancellation ---

#[test]
fn test_panicking_unit_becomes_failure() {
    let paths = fake_paths(3);
    let batch = executor(2)
        .run("panicky", &paths, |p, _| {
            if p.ends_with("p1") {
                panic!("unit exploded");
            }
            OperationResult::ok(p, ())
        })
        .unwrap();

    assert_eq!(batch.successes().count(), 2);
    let failed = &batch.results[1];
    assert!(!failed.is_success());
    assert!(failed.error().unwrap().contains("unit exploded"));
}

#[test]
fn test_cancel_marks_remaining_units() {
    let registry = Arc::new(JobRegistry::new());
    let exec = BatchExecutor::new(Arc::clone(&registry)).concurrency(1);
    let paths = fake_paths(6);
    let batch = exec
        .run("cancel-me", &paths, |p, token| {
            if p.ends_with("p0") {
                registry.cancel_all();
                assert!(token.is_cancelled());
            }
            OperationResult::ok(p, ())
        })
        .unwrap();

    assert!(batch.cancelled);
    assert_eq!(batch.len(), 6);
    assert!(batch.results[0].is_success());
    for r in &batch.results[1..] {
        assert_eq!(r.error(), Some(CANCELLED));
    }
    assert!(registry.is_empty());
}

#[test]
fn test_batch_job_registered_while_running() {
    let registry = Arc::new(JobRegistry::new());
    let exec = BatchExecutor::new(Arc::clone(&registry)).concurrency(1);
    let batch = exec
        .run("watched", &fake_paths(2), |p, _| OperationResult::ok(p, registry.len()))
        .unwrap();
    assert!(batch.results.iter().all(|r| r.payload() == Some(&1)));
    assert!(registry.is_empty());
    assert!(batch.job_id.as_str().starts_with("batch-"));
}

#[test]
fn test_per_unit_jobs_registered() {
    let registry = Arc::new(JobRegistry::new());
    let exec = BatchExecutor::new(Arc::clone(&registry))
        .concurrency(1)
        .per_unit_jobs(true);
    let batch = exec
        .run("units", &fake_paths(3), |p, _| {
            let labels: Vec<String> = registry.list().into_iter().map(|j| j.label).collect();
            OperationResult::ok(p, labels)
        })
        .unwrap();

    for r in &batch.results {
        let labels = r.payload().unwrap();
        assert_eq!(labels.len(), 2);
        assert!(labels.iter().any(|l| l == &format!("units: {}", r.project_name())));
    }
    assert!(registry.is_empty());
}

#[test]
fn test_progress_callback_sees_each_unit() {
    let seen = AtomicUsize::new(0);
    let batch = executor(3)
        .run_with_progress(
            "progress",
            &fake_paths(7),
            |p, _| OperationResult::ok(p, ()),
            |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            },
        )
        .unwrap();
    assert_eq!(batch.len(), 7);
    assert_eq!(seen.load(Ordering::SeqCst), 7);
}
