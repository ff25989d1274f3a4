//! Background job registry: which long-running operations are in flight, and how to stop them.
//!
//! Cancellation is cooperative. The registry only flips a [`CancelToken`]; the owning operation
//! polls it (the process runner terminates its child when it sees the flag).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;

use crate::error::JobError;

/// Opaque job identifier, stable for the lifetime of the operation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Cooperative cancellation flag. Clones share the flag; [`CancelToken::child`] creates a token
/// that also reports cancelled when any ancestor is.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    parent: Option<Box<CancelToken>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(&self) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            parent: Some(Box::new(self.clone())),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
            || self.parent.as_ref().is_some_and(|p| p.is_cancelled())
    }
}

/// Snapshot of one registered job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundJob {
    pub id: JobId,
    pub label: String,
    /// Unix seconds.
    pub started_at: u64,
}

struct JobEntry {
    label: String,
    started_at: u64,
    token: CancelToken,
}

/// Thread-safe registry of active jobs.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, JobEntry>>,
    next_seq: AtomicU64,
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, JobEntry>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `id`. Fails if a job with the same id is currently active.
    pub fn add(&self, id: JobId, label: impl Into<String>) -> Result<CancelToken, JobError> {
        self.add_with_token(id, label, CancelToken::new())
    }

    fn add_with_token(
        &self,
        id: JobId,
        label: impl Into<String>,
        token: CancelToken,
    ) -> Result<CancelToken, JobError> {
        let mut jobs = self.lock();
        if jobs.contains_key(&id) {
            return Err(JobError::DuplicateJob(id));
        }
        let label = label.into();
        debug!("job started: {} ({})", id, label);
        jobs.insert(
            id,
            JobEntry {
                label,
                started_at: unix_now(),
                token: token.clone(),
            },
        );
        Ok(token)
    }

    /// Generate an id of the form `{prefix}-{unix_millis}-{seq}`. The sequence number makes it
    /// unique for the life of this registry even when two jobs start in the same millisecond.
    pub fn generate_id(&self, prefix: &str) -> JobId {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        JobId(format!("{}-{}-{}", prefix, unix_millis(), seq))
    }

    /// Register a job under a generated id and return a guard that deregisters it on drop.
    pub fn start(self: &Arc<Self>, prefix: &str, label: impl Into<String>) -> JobGuard {
        self.start_with_token(prefix, label, CancelToken::new())
    }

    /// Like [`JobRegistry::start`], but the job's token is `token` (e.g. a child of a batch token).
    pub fn start_with_token(
        self: &Arc<Self>,
        prefix: &str,
        label: impl Into<String>,
        token: CancelToken,
    ) -> JobGuard {
        let label = label.into();
        loop {
            let id = self.generate_id(prefix);
            // Generated ids only collide if a caller used `add` with the same shape; retry.
            if let Ok(token) = self.add_with_token(id.clone(), label.clone(), token.clone()) {
                return JobGuard {
                    registry: Arc::clone(self),
                    id,
                    token,
                };
            }
        }
    }

    /// Deregister `id`. Removing an unknown id is a no-op.
    pub fn remove(&self, id: &JobId) {
        if self.lock().remove(id).is_some() {
            debug!("job finished: {}", id);
        }
    }

    /// Signal the job's token and drop it from the registry. The owning operation still runs to
    /// its next cancellation check, and its own `remove` later becomes a no-op.
    pub fn cancel(&self, id: &JobId) -> Result<(), JobError> {
        match self.lock().remove(id) {
            Some(entry) => {
                entry.token.cancel();
                debug!("job cancelled: {} ({})", id, entry.label);
                Ok(())
            }
            None => Err(JobError::UnknownJob(id.clone())),
        }
    }

    /// Cancel everything (Ctrl+C).
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<(JobId, JobEntry)> = self.lock().drain().collect();
        for (_, entry) in &drained {
            entry.token.cancel();
        }
        drained.len()
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of active jobs, oldest first (ties by id).
    pub fn list(&self) -> Vec<BackgroundJob> {
        let mut jobs: Vec<BackgroundJob> = self
            .lock()
            .iter()
            .map(|(id, e)| BackgroundJob {
                id: id.clone(),
                label: e.label.clone(),
                started_at: e.started_at,
            })
            .collect();
        jobs.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
        jobs
    }
}

/// Registration that lasts as long as the guard. Dropping it removes the job.
pub struct JobGuard {
    registry: Arc<JobRegistry>,
    id: JobId,
    token: CancelToken,
}

impl JobGuard {
    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
    }
}
