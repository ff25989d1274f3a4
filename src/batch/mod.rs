//! Bounded-concurrency fan-out of one operation over many projects.
//!
//! A feeder pushes `(index, path)` pairs into a bounded crossbeam channel drained by a fixed set
//! of scoped worker threads; results come back on a second channel and are placed by index, so
//! the output always has one entry per input, in input order.

pub mod operations;

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use log::{debug, warn};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crate::error::BatchError;
use crate::jobs::{CancelToken, JobId, JobRegistry};
use crate::utils::config::BatchConsts;
use crate::utils::fd_limit::cap_concurrency;
use crate::{OperationResult, error_list, project_name_for};

pub use operations::{CargoTools, OperationKind};

/// Error recorded for units that never started because the batch was cancelled.
pub const CANCELLED: &str = "cancelled";

/// Results of one batch, one per input path, in input order.
#[derive(Clone, Debug)]
pub struct Batch<T> {
    pub job_id: JobId,
    pub results: Vec<OperationResult<T>>,
    /// The batch token was cancelled before every unit finished on its own.
    pub cancelled: bool,
}

impl<T> Batch<T> {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn successes(&self) -> impl Iterator<Item = &OperationResult<T>> {
        self.results.iter().filter(|r| r.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &OperationResult<T>> {
        self.results.iter().filter(|r| !r.is_success())
    }

    /// `"<project>: <error>"` for each failed unit, for display.
    pub fn error_list(&self) -> Vec<String> {
        error_list(&self.results)
    }
}

/// Runs an operation over a list of project paths with at most `concurrency` units in flight.
#[derive(Clone)]
pub struct BatchExecutor {
    registry: Arc<JobRegistry>,
    concurrency: usize,
    per_unit_jobs: bool,
}

impl BatchExecutor {
    pub fn new(registry: Arc<JobRegistry>) -> Self {
        Self {
            registry,
            concurrency: BatchConsts::DEFAULT_CONCURRENCY,
            per_unit_jobs: false,
        }
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n;
        self
    }

    /// Also register one job per in-flight project (cancellable individually).
    pub fn per_unit_jobs(mut self, enabled: bool) -> Self {
        self.per_unit_jobs = enabled;
        self
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Workers used for a batch of `units`: requested, capped by the FD limit and the input size.
    pub fn effective_concurrency(&self, units: usize) -> usize {
        cap_concurrency(self.concurrency).min(units).max(1)
    }

    pub fn run<T, F>(
        &self,
        label: &str,
        paths: &[PathBuf],
        op: F,
    ) -> Result<Batch<T>, BatchError>
    where
        T: Send,
        F: Fn(&Path, &CancelToken) -> OperationResult<T> + Sync,
    {
        self.run_with_progress(label, paths, op, |_| {})
    }

    /// Like [`BatchExecutor::run`], calling `on_done` on the caller's thread as each unit finishes.
    pub fn run_with_progress<T, F, P>(
        &self,
        label: &str,
        paths: &[PathBuf],
        op: F,
        on_done: P,
    ) -> Result<Batch<T>, BatchError>
    where
        T: Send,
        F: Fn(&Path, &CancelToken) -> OperationResult<T> + Sync,
        P: Fn(&OperationResult<T>),
    {
        if paths.is_empty() {
            return Err(BatchError::NoProjects {
                label: label.to_string(),
            });
        }

        let guard = self.registry.start("batch", label);
        let batch_token = guard.token().clone();
        let workers = self.effective_concurrency(paths.len());
        debug!(
            "batch {} ({}): {} projects, {} workers",
            guard.id(),
            label,
            paths.len(),
            workers
        );

        let mut slots: Vec<Option<OperationResult<T>>> = paths.iter().map(|_| None).collect();
        let (work_tx, work_rx) = bounded::<(usize, &Path)>(workers);
        let (result_tx, result_rx) = unbounded::<(usize, OperationResult<T>)>();

        thread::scope(|s| {
            for _ in 0..workers {
                let unit = UnitContext {
                    op: &op,
                    batch_token: &batch_token,
                    registry: &self.registry,
                    per_unit_jobs: self.per_unit_jobs,
                    label,
                };
                let work_rx = work_rx.clone();
                let result_tx = result_tx.clone();
                s.spawn(move || worker_loop(work_rx, result_tx, unit));
            }
            drop(work_rx);
            drop(result_tx);

            for (index, path) in paths.iter().enumerate() {
                if batch_token.is_cancelled() {
                    break;
                }
                if work_tx.send((index, path.as_path())).is_err() {
                    break;
                }
            }
            drop(work_tx);

            for (index, result) in result_rx.iter() {
                on_done(&result);
                slots[index] = Some(result);
            }
        });

        let cancelled = batch_token.is_cancelled();
        let results: Vec<OperationResult<T>> = slots
            .into_iter()
            .zip(paths)
            .map(|(slot, path)| slot.unwrap_or_else(|| OperationResult::failed(path, CANCELLED)))
            .collect();
        if cancelled {
            warn!("batch {} ({}) cancelled", guard.id(), label);
        }

        Ok(Batch {
            job_id: guard.id().clone(),
            results,
            cancelled,
        })
    }
}

/// Shared borrowed state handed to each worker.
struct UnitContext<'a, F> {
    op: &'a F,
    batch_token: &'a CancelToken,
    registry: &'a Arc<JobRegistry>,
    per_unit_jobs: bool,
    label: &'a str,
}

impl<F> Clone for UnitContext<'_, F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<F> Copy for UnitContext<'_, F> {}

/// Single batch worker: take units until the queue closes, send each result back by index.
fn worker_loop<T, F>(
    work_rx: Receiver<(usize, &Path)>,
    result_tx: Sender<(usize, OperationResult<T>)>,
    unit: UnitContext<'_, F>,
) where
    F: Fn(&Path, &CancelToken) -> OperationResult<T> + Sync,
{
    while let Ok((index, path)) = work_rx.recv() {
        let result = if unit.batch_token.is_cancelled() {
            OperationResult::failed(path, CANCELLED)
        } else {
            run_unit(path, unit)
        };
        if result_tx.send((index, result)).is_err() {
            break;
        }
    }
}

fn run_unit<T, F>(path: &Path, unit: UnitContext<'_, F>) -> OperationResult<T>
where
    F: Fn(&Path, &CancelToken) -> OperationResult<T> + Sync,
{
    let token = unit.batch_token.child();
    let _job = unit.per_unit_jobs.then(|| {
        let label = format!("{}: {}", unit.label, project_name_for(path));
        unit.registry.start_with_token("unit", label, token.clone())
    });
    match panic::catch_unwind(AssertUnwindSafe(|| (unit.op)(path, &token))) {
        Ok(result) => result,
        Err(payload) => {
            let msg = panic_message(payload.as_ref());
            warn!("operation panicked on {}: {}", path.display(), msg);
            OperationResult::failed(path, format!("operation panicked: {}", msg))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
