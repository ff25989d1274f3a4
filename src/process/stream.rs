//! Streaming command events: ordered line events followed by exactly one completion.

use crossbeam_channel::{Receiver, RecvTimeoutError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamSource {
    Stdout,
    Stderr,
}

/// Terminal event of a command run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    /// Stopped through its cancellation token.
    pub cancelled: bool,
    /// Stopped because its deadline passed.
    pub timed_out: bool,
    /// Spawn or wait failure, if any.
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandEvent {
    Line { line: String, source: StreamSource },
    Completed(Completion),
}

/// Finite, non-restartable sequence of [`CommandEvent`]s for one process.
///
/// Yields line events in production order (stdout and stderr interleaved), then one
/// [`CommandEvent::Completed`], then `None` forever.
pub struct CommandStream {
    rx: Receiver<CommandEvent>,
    finished: bool,
}

/// Everything a stream produced, once drained.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transcript {
    pub lines: Vec<(StreamSource, String)>,
    pub completion: Completion,
}

impl CommandStream {
    pub(crate) fn new(rx: Receiver<CommandEvent>) -> Self {
        Self {
            rx,
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn observe(&mut self, event: CommandEvent) -> CommandEvent {
        if matches!(event, CommandEvent::Completed(_)) {
            self.finished = true;
        }
        event
    }

    /// Like `next`, but gives up after `timeout`.
    /// `None` means nothing arrived, or the stream already ended.
    pub fn next_timeout(&mut self, timeout: Duration) -> Option<CommandEvent> {
        if self.finished {
            return None;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(self.observe(event)),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                self.finished = true;
                None
            }
        }
    }

    /// Drain the stream. A runner that vanished without a completion yields a failed one.
    pub fn into_transcript(self) -> Transcript {
        let mut transcript = Transcript::default();
        let mut completion = None;
        for event in self {
            match event {
                CommandEvent::Line { line, source } => transcript.lines.push((source, line)),
                CommandEvent::Completed(c) => completion = Some(c),
            }
        }
        transcript.completion = completion.unwrap_or_else(|| Completion {
            error: Some("runner exited without a completion event".to_string()),
            ..Completion::default()
        });
        transcript
    }
}

impl Iterator for CommandStream {
    type Item = CommandEvent;

    fn next(&mut self) -> Option<CommandEvent> {
        if self.finished {
            return None;
        }
        match self.rx.recv() {
            Ok(event) => Some(self.observe(event)),
            Err(_) => {
                self.finished = true;
                None
            }
        }
    }
}

impl Transcript {
    /// Lines from one source joined with newlines.
    pub fn text(&self, source: StreamSource) -> String {
        self.lines
            .iter()
            .filter(|(s, _)| *s == source)
            .map(|(_, l)| l.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
