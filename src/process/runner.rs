//! Spawn, watch and terminate child processes.
//!
//! One reader thread per pipe pushes lines into a shared channel; the calling (or a dedicated
//! waiter) thread polls the child and the cancellation token.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use log::{debug, warn};
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::CommandOutput;
use crate::jobs::CancelToken;
use crate::utils::config::ProcessConsts;

use super::CommandSpec;
use super::stream::{CommandEvent, CommandStream, Completion, StreamSource};

/// Hook run by the waiter thread right before the completion event is sent.
pub type OnExit = Box<dyn FnOnce() + Send>;

enum WaitOutcome {
    Exited(ExitStatus),
    Cancelled,
    TimedOut,
    Failed(std::io::Error),
}

fn build_command(spec: &CommandSpec) -> Command {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .current_dir(&spec.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // Own process group so termination reaches rustc/build-script grandchildren too.
        cmd.process_group(0);
    }
    cmd
}

/// Read `pipe` line by line (lossy UTF-8) and forward each line. Keeps draining after the
/// consumer hangs up so the child never blocks on a full pipe.
fn spawn_reader<R>(
    pipe: R,
    source: StreamSource,
    tx: Sender<CommandEvent>,
    done: Sender<()>,
) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    while matches!(buf.last(), Some(b'\n' | b'\r')) {
                        buf.pop();
                    }
                    let line = String::from_utf8_lossy(&buf).into_owned();
                    let _ = tx.send(CommandEvent::Line { line, source });
                }
            }
        }
        let _ = done.send(());
    })
}

#[cfg(unix)]
fn signal_group(child: &Child, signal: libc::c_int) {
    let pgid = child.id() as libc::pid_t;
    unsafe {
        libc::kill(-pgid, signal);
    }
}

/// SIGTERM the process group, wait up to the grace period, then kill.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        signal_group(child, libc::SIGTERM);
        let until = Instant::now() + ProcessConsts::TERM_GRACE;
        while Instant::now() < until {
            if let Ok(Some(_)) = child.try_wait() {
                // Leader is gone; clear out anything left in its group.
                signal_group(child, libc::SIGKILL);
                return;
            }
            thread::sleep(ProcessConsts::POLL_INTERVAL);
        }
        signal_group(child, libc::SIGKILL);
    }
    let _ = child.kill();
    let _ = child.wait();
}

fn wait_for_child(
    child: &mut Child,
    cancel: &CancelToken,
    deadline: Option<Instant>,
) -> WaitOutcome {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return WaitOutcome::Exited(status),
            Ok(None) => {}
            Err(e) => return WaitOutcome::Failed(e),
        }
        if cancel.is_cancelled() {
            terminate(child);
            return WaitOutcome::Cancelled;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            terminate(child);
            return WaitOutcome::TimedOut;
        }
        thread::sleep(ProcessConsts::POLL_INTERVAL);
    }
}

/// Wait for `n` reader-done signals, for at most `grace`. A grandchild that inherited the pipes
/// may keep them open after the child is gone. `cancel`, when given, also ends the wait.
fn join_readers(
    done_rx: &Receiver<()>,
    n: usize,
    grace: Duration,
    cancel: Option<&CancelToken>,
) {
    let until = Instant::now() + grace;
    let mut remaining = n;
    while remaining > 0 {
        let now = Instant::now();
        if now >= until || cancel.is_some_and(CancelToken::is_cancelled) {
            debug!("{} pipe reader(s) still open after child stopped; not waiting", remaining);
            return;
        }
        match done_rx.recv_timeout((until - now).min(ProcessConsts::POLL_INTERVAL)) {
            Ok(()) => remaining -= 1,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

fn spawn_failure(
    spec: &CommandSpec,
    msg: String,
    tx: &Sender<CommandEvent>,
    start: Instant,
) -> Completion {
    warn!("{}: {}", spec.display(), msg);
    let _ = tx.send(CommandEvent::Line {
        line: msg.clone(),
        source: StreamSource::Stderr,
    });
    Completion {
        success: false,
        duration_ms: start.elapsed().as_millis() as u64,
        error: Some(msg),
        ..Completion::default()
    }
}

/// Run `spec` on the current thread, forwarding lines to `tx`. Returns the completion without
/// sending it.
pub(crate) fn execute(
    spec: &CommandSpec,
    cancel: &CancelToken,
    tx: &Sender<CommandEvent>,
) -> Completion {
    let start = Instant::now();
    if !spec.cwd.is_dir() {
        return spawn_failure(
            spec,
            format!("Working directory does not exist: {}", spec.cwd.display()),
            tx,
            start,
        );
    }
    if cancel.is_cancelled() {
        return Completion {
            cancelled: true,
            error: Some("cancelled before start".to_string()),
            ..Completion::default()
        };
    }

    let mut child = match build_command(spec).spawn() {
        Ok(child) => child,
        Err(e) => {
            let msg = format!("Failed to start {}: {}", spec.program, e);
            return spawn_failure(spec, msg, tx, start);
        }
    };
    debug!("spawned {} (pid {}) in {}", spec.display(), child.id(), spec.cwd.display());

    let (done_tx, done_rx) = unbounded::<()>();
    let mut readers = 0;
    if let Some(stdout) = child.stdout.take() {
        spawn_reader(stdout, StreamSource::Stdout, tx.clone(), done_tx.clone());
        readers += 1;
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_reader(stderr, StreamSource::Stderr, tx.clone(), done_tx.clone());
        readers += 1;
    }
    drop(done_tx);

    let deadline = spec.timeout.map(|t| start + t);
    let outcome = wait_for_child(&mut child, cancel, deadline);
    match outcome {
        WaitOutcome::Exited(_) => {
            join_readers(&done_rx, readers, ProcessConsts::EXIT_DRAIN_GRACE, Some(cancel))
        }
        _ => join_readers(&done_rx, readers, ProcessConsts::READER_JOIN_GRACE, None),
    }

    let duration_ms = start.elapsed().as_millis() as u64;
    match outcome {
        WaitOutcome::Exited(status) => Completion {
            success: status.success(),
            exit_code: status.code(),
            duration_ms,
            ..Completion::default()
        },
        WaitOutcome::Cancelled => Completion {
            duration_ms,
            cancelled: true,
            error: Some("cancelled".to_string()),
            ..Completion::default()
        },
        WaitOutcome::TimedOut => Completion {
            duration_ms,
            timed_out: true,
            error: Some(format!(
                "timed out after {}s",
                spec.timeout.map(|t| t.as_secs()).unwrap_or(0)
            )),
            ..Completion::default()
        },
        WaitOutcome::Failed(e) => Completion {
            duration_ms,
            error: Some(format!("wait failed: {}", e)),
            ..Completion::default()
        },
    }
}

/// Run to completion and return full stdout/stderr. Never panics or errors: spawn failures come
/// back as `success = false` with the reason in `stderr`.
pub fn run_buffered(spec: &CommandSpec, cancel: &CancelToken) -> CommandOutput {
    let (tx, rx) = unbounded::<CommandEvent>();
    let completion = execute(spec, cancel, &tx);
    drop(tx);

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    for event in rx.try_iter() {
        if let CommandEvent::Line { line, source } = event {
            match source {
                StreamSource::Stdout => stdout.push(line),
                StreamSource::Stderr => stderr.push(line),
            }
        }
    }
    if (completion.cancelled || completion.timed_out)
        && let Some(err) = completion.error.as_ref()
    {
        stderr.push(err.clone());
    }

    CommandOutput {
        command: spec.display(),
        success: completion.success,
        stdout: stdout.join("\n"),
        stderr: stderr.join("\n"),
        exit_code: completion.exit_code,
        duration_ms: completion.duration_ms,
    }
}

/// Start `spec` on a background thread and return its event stream immediately.
/// `on_exit` runs after the process is gone and before the completion event is delivered.
pub fn spawn_streaming(
    spec: CommandSpec,
    cancel: CancelToken,
    on_exit: Option<OnExit>,
) -> CommandStream {
    let (tx, rx) = unbounded::<CommandEvent>();
    thread::spawn(move || {
        let completion = execute(&spec, &cancel, &tx);
        debug!(
            "{} finished: success={} exit={:?} in {}ms",
            spec.display(),
            completion.success,
            completion.exit_code,
            completion.duration_ms
        );
        if let Some(f) = on_exit {
            f();
        }
        let _ = tx.send(CommandEvent::Completed(completion));
    });
    CommandStream::new(rx)
}
