#![cfg(unix)]

use cratedeck::process::{CommandSpec, run_buffered, spawn_streaming};
use cratedeck::{CancelToken, CommandEvent, StreamSource};
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn sh(dir: &TempDir, script: &str) -> CommandSpec {
    CommandSpec::new("sh", dir.path()).args(["-c", script])
}

// --- buffered ---

#[test]
fn test_buffered_captures_both_streams() {
    let tmp = TempDir::new().unwrap();
    let out = run_buffered(
        &sh(&tmp, "echo hello; echo oops >&2; echo world"),
        &CancelToken::new(),
    );
    assert!(out.success);
    assert_eq!(out.exit_code, Some(0));
    assert_eq!(out.stdout, "hello\nworld");
    assert_eq!(out.stderr, "oops");
    assert_eq!(out.command, "sh -c echo hello; echo oops >&2; echo world");
}

#[test]
fn test_buffered_nonzero_exit() {
    let tmp = TempDir::new().unwrap();
    let out = run_buffered(&sh(&tmp, "echo partial; exit 3"), &CancelToken::new());
    assert!(!out.success);
    assert_eq!(out.exit_code, Some(3));
    assert_eq!(out.stdout, "partial");
}

#[test]
fn test_buffered_spawn_failure_reported() {
    let tmp = TempDir::new().unwrap();
    let spec = CommandSpec::new("/definitely/not/a/real/program", tmp.path());
    let out = run_buffered(&spec, &CancelToken::new());
    assert!(!out.success);
    assert_eq!(out.exit_code, None);
    assert!(out.stderr.contains("Failed to start"));
}

#[test]
fn test_buffered_missing_cwd_reported() {
    let tmp = TempDir::new().unwrap();
    let spec = CommandSpec::new("sh", tmp.path().join("gone")).arg("-c").arg("true");
    let out = run_buffered(&spec, &CancelToken::new());
    assert!(!out.success);
    assert!(out.stderr.contains("does not exist"));
}

#[test]
fn test_buffered_timeout_stops_child() {
    let tmp = TempDir::new().unwrap();
    let spec = sh(&tmp, "sleep 30").timeout(Some(Duration::from_millis(200)));
    let start = Instant::now();
    let out = run_buffered(&spec, &CancelToken::new());
    assert!(!out.success);
    assert!(out.stderr.contains("timed out"));
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[test]
fn test_buffered_cancel_before_start() {
    let tmp = TempDir::new().unwrap();
    let token = CancelToken::new();
    token.cancel();
    let out = run_buffered(&sh(&tmp, "echo never"), &token);
    assert!(!out.success);
    assert!(out.stdout.is_empty());
}

#[test]
fn test_buffered_returns_when_grandchild_holds_pipes() {
    let tmp = TempDir::new().unwrap();
    let start = Instant::now();
    let out = run_buffered(&sh(&tmp, "sleep 30 & echo started"), &CancelToken::new());
    assert!(out.success);
    assert_eq!(out.stdout, "started");
    assert!(start.elapsed() < Duration::from_secs(10));
}

// --- streaming ---

#[test]
fn test_stream_lines_then_single_completion() {
    let tmp = TempDir::new().unwrap();
    let stream = spawn_streaming(
        sh(&tmp, "echo one; echo two >&2; echo three"),
        CancelToken::new(),
        None,
    );
    let transcript = stream.into_transcript();
    assert!(transcript.completion.success);
    assert_eq!(transcript.completion.exit_code, Some(0));
    assert_eq!(transcript.text(StreamSource::Stdout), "one\nthree");
    assert_eq!(transcript.text(StreamSource::Stderr), "two");
}

#[test]
fn test_stream_ends_after_completion() {
    let tmp = TempDir::new().unwrap();
    let mut stream = spawn_streaming(sh(&tmp, "echo only"), CancelToken::new(), None);
    let events: Vec<CommandEvent> = stream.by_ref().collect();
    assert_eq!(events.len(), 2);
    assert!(matches!(events.last(), Some(CommandEvent::Completed(_))));
    assert!(stream.is_finished());
    assert!(stream.next().is_none());
}

#[test]
fn test_stream_cancel_mid_output() {
    let tmp = TempDir::new().unwrap();
    let token = CancelToken::new();
    let mut stream = spawn_streaming(sh(&tmp, "echo first; sleep 30"), token.clone(), None);

    match stream.next_timeout(Duration::from_secs(10)) {
        Some(CommandEvent::Line { line, source }) => {
            assert_eq!(line, "first");
            assert_eq!(source, StreamSource::Stdout);
        }
        other => panic!("expected first line, got {:?}", other),
    }
    let start = Instant::now();
    token.cancel();
    let transcript = stream.into_transcript();
    assert!(!transcript.completion.success);
    assert!(transcript.completion.cancelled);
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[test]
fn test_on_exit_runs_before_completion() {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    let tmp = TempDir::new().unwrap();
    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    let stream = spawn_streaming(
        sh(&tmp, "true"),
        CancelToken::new(),
        Some(Box::new(move || flag.store(true, Ordering::SeqCst))),
    );
    for event in stream {
        if let CommandEvent::Completed(c) = event {
            assert!(c.success);
            assert!(ran.load(Ordering::SeqCst));
        }
    }
}
