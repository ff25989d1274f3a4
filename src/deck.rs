//! The command surface: one [`Deck`] owns the job registry, the result cache and the settings,
//! and exposes scanning, batch operations, streaming runs and the cross-project analyses.

use log::{debug, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::analysis::{
    DependencyAnalysis, LicenseAnalysis, ToolchainAnalysis, analyze_dependencies,
    analyze_licenses, analyze_toolchains,
};
use crate::batch::operations::{clean_target, read_declared_deps, read_toolchain};
use crate::batch::{Batch, BatchExecutor, CargoTools, OperationKind};
use crate::cache::{AnalysisKind, CachedResult, ResultCache};
use crate::error::{BatchError, CacheError, DiscoveryError, JobError};
use crate::jobs::{BackgroundJob, CancelToken, JobId, JobRegistry};
use crate::locator::{ScanOutcome, locate_projects};
use crate::process::{CommandSpec, CommandStream, OnExit, spawn_streaming};
use crate::settings::Settings;
use crate::store::PersistenceStore;
use crate::utils::config::BatchConsts;
use crate::{
    AuditReport, CleanReport, CommandOutput, DeclaredDep, LicenseInfo, OperationResult, Opts,
    OutdatedDep, ProjectDescriptor, ScanOpts, ToolStatus, ToolchainInfo, project_name_for,
};

/// Called once per finished project with its path and success flag.
pub type ProgressHook = Arc<dyn Fn(&Path, bool) + Send + Sync>;

/// Typed results of [`Deck::run_batch`].
#[derive(Clone, Debug)]
pub enum BatchRun {
    Outdated(Batch<Vec<OutdatedDep>>),
    Audit(Batch<AuditReport>),
    Licenses(Batch<Vec<LicenseInfo>>),
    Toolchain(Batch<ToolchainInfo>),
    Dependencies(Batch<Vec<DeclaredDep>>),
    Command(Batch<CommandOutput>),
    Clean(Batch<CleanReport>),
}

macro_rules! each_batch {
    ($run:expr, $b:ident => $body:expr) => {
        match $run {
            BatchRun::Outdated($b) => $body,
            BatchRun::Audit($b) => $body,
            BatchRun::Licenses($b) => $body,
            BatchRun::Toolchain($b) => $body,
            BatchRun::Dependencies($b) => $body,
            BatchRun::Command($b) => $body,
            BatchRun::Clean($b) => $body,
        }
    };
}

impl BatchRun {
    pub fn job_id(&self) -> &JobId {
        each_batch!(self, b => &b.job_id)
    }

    pub fn len(&self) -> usize {
        each_batch!(self, b => b.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn success_count(&self) -> usize {
        each_batch!(self, b => b.successes().count())
    }

    pub fn cancelled(&self) -> bool {
        each_batch!(self, b => b.cancelled)
    }

    /// `"<project>: <error>"` per failed project.
    pub fn error_list(&self) -> Vec<String> {
        each_batch!(self, b => b.error_list())
    }
}

pub struct Deck {
    registry: Arc<JobRegistry>,
    cache: ResultCache,
    settings: Settings,
    tools: CargoTools,
    scan_opts: ScanOpts,
    concurrency: usize,
    per_unit_jobs: bool,
    progress: Mutex<Option<ProgressHook>>,
}

impl Deck {
    /// New deck over `store` (cache and settings are loaded from it right away).
    pub fn new(store: Option<Arc<dyn PersistenceStore>>) -> Self {
        let cache = ResultCache::new(store.clone());
        cache.load();
        Self {
            registry: Arc::new(JobRegistry::new()),
            cache,
            settings: Settings::load(store),
            tools: CargoTools::default(),
            scan_opts: ScanOpts::default(),
            concurrency: BatchConsts::DEFAULT_CONCURRENCY,
            per_unit_jobs: false,
            progress: Mutex::new(None),
        }
    }

    /// Deck configured from merged CLI/config options.
    pub fn from_opts(opts: &Opts, store: Option<Arc<dyn PersistenceStore>>) -> Self {
        Self::new(store)
            .with_tools(
                CargoTools::new(opts.cargo.clone())
                    .timeout(opts.timeout_secs.map(Duration::from_secs)),
            )
            .with_scan_opts(ScanOpts::from(opts))
            .concurrency(opts.jobs)
            .per_unit_jobs(opts.per_unit_jobs)
    }

    pub fn with_tools(mut self, tools: CargoTools) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_scan_opts(mut self, opts: ScanOpts) -> Self {
        self.scan_opts = opts;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n;
        self
    }

    pub fn per_unit_jobs(mut self, enabled: bool) -> Self {
        self.per_unit_jobs = enabled;
        self
    }

    /// Install (or clear) the per-project progress callback used by every batch.
    pub fn set_progress(&self, hook: Option<ProgressHook>) {
        *self.progress.lock().unwrap_or_else(PoisonError::into_inner) = hook;
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn tools(&self) -> &CargoTools {
        &self.tools
    }

    // ---- Discovery ----

    /// Discover projects under `root`.
    pub fn scan(&self, root: &Path) -> Result<Vec<ProjectDescriptor>, DiscoveryError> {
        Ok(self.scan_outcome(root)?.projects)
    }

    /// Like [`Deck::scan`], also returning the paths the walk had to skip.
    pub fn scan_outcome(&self, root: &Path) -> Result<ScanOutcome, DiscoveryError> {
        locate_projects(root, &self.scan_opts)
    }

    // ---- Batches ----

    fn executor(&self) -> BatchExecutor {
        BatchExecutor::new(Arc::clone(&self.registry))
            .concurrency(self.concurrency)
            .per_unit_jobs(self.per_unit_jobs)
    }

    fn batch<T, F>(&self, label: &str, paths: &[PathBuf], op: F) -> Result<Batch<T>, BatchError>
    where
        T: Send,
        F: Fn(&Path, &CancelToken) -> OperationResult<T> + Sync,
    {
        let hook = self
            .progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        self.executor().run_with_progress(label, paths, op, |r| {
            if let Some(hook) = &hook {
                hook(r.project_path(), r.is_success());
            }
        })
    }

    /// Run one operation over `paths`. Fails only for an empty path list.
    pub fn run_batch(
        &self,
        paths: &[PathBuf],
        kind: &OperationKind,
    ) -> Result<BatchRun, BatchError> {
        let label = kind.label();
        let tools = &self.tools;
        let run = match kind {
            OperationKind::Outdated => {
                BatchRun::Outdated(self.batch(label, paths, |p, c| tools.check_outdated(p, c))?)
            }
            OperationKind::Audit => {
                BatchRun::Audit(self.batch(label, paths, |p, c| tools.check_audit(p, c))?)
            }
            OperationKind::Licenses => {
                BatchRun::Licenses(self.batch(label, paths, |p, c| tools.check_licenses(p, c))?)
            }
            OperationKind::Toolchain => {
                BatchRun::Toolchain(self.batch(label, paths, read_toolchain)?)
            }
            OperationKind::Dependencies => {
                BatchRun::Dependencies(self.batch(label, paths, read_declared_deps)?)
            }
            OperationKind::Command(args) => {
                let op = |p: &Path, c: &CancelToken| tools.run_command(p, args, c);
                BatchRun::Command(self.batch(label, paths, op)?)
            }
            OperationKind::Clean { debug_only } => {
                let op = |p: &Path, c: &CancelToken| clean_target(p, *debug_only, c);
                BatchRun::Clean(self.batch(label, paths, op)?)
            }
        };
        Ok(run)
    }

    /// Start `cargo <command> <args>` in `project` and stream its output. The job is registered
    /// until the process exits (or is cancelled through [`Deck::cancel_job`]).
    pub fn run_streaming(
        &self,
        project: &Path,
        command: &str,
        args: &[String],
    ) -> (JobId, CommandStream) {
        let spec = CommandSpec::new(&self.tools.program, project)
            .arg(command)
            .args(args.iter().cloned())
            .timeout(self.tools.timeout);
        let label = format!("{} ({})", spec.display(), project_name_for(project));
        let guard = self.registry.start("run", label);
        let id = guard.id().clone();
        let token = guard.token().clone();
        self.settings.add_recent(project);
        debug!("streaming {} as job {}", spec.display(), id);
        let on_exit: OnExit = Box::new(move || drop(guard));
        (id, spawn_streaming(spec, token, Some(on_exit)))
    }

    /// Which of the cargo extensions used by the analyses are installed, checked from `dir`.
    pub fn check_tools(&self, dir: &Path) -> Vec<ToolStatus> {
        let guard = self.registry.start("tools", "check installed tools");
        self.tools.check_tools(dir, guard.token())
    }

    // ---- Jobs ----

    pub fn cancel_job(&self, id: &JobId) -> Result<(), JobError> {
        self.registry.cancel(id)
    }

    pub fn list_jobs(&self) -> Vec<BackgroundJob> {
        self.registry.list()
    }

    // ---- Cache ----

    pub fn get_cache<T: DeserializeOwned>(&self, kind: AnalysisKind) -> Option<CachedResult<T>> {
        self.cache.get(kind)
    }

    pub fn save_cache<T: Serialize>(
        &self,
        kind: AnalysisKind,
        value: &T,
    ) -> Result<u64, CacheError> {
        self.cache.save(kind, value)
    }

    /// Replace the cached entry for `kind`, unless the run was cancelled: a partial run never
    /// displaces the last complete one.
    fn remember<T: Serialize>(&self, kind: AnalysisKind, cancelled: bool, value: &T) {
        if cancelled {
            debug!("{} run was cancelled; keeping the cached result", kind.as_str());
            return;
        }
        if let Err(e) = self.cache.save(kind, value) {
            warn!("{}", e);
        }
    }

    // ---- Analyses ----

    /// Outdated dependencies per project; results are cached.
    pub fn check_all_outdated(
        &self,
        paths: &[PathBuf],
    ) -> Result<Batch<Vec<OutdatedDep>>, BatchError> {
        let batch = self.batch("outdated", paths, |p, c| self.tools.check_outdated(p, c))?;
        self.remember(AnalysisKind::Outdated, batch.cancelled, &batch.results);
        Ok(batch)
    }

    /// Audit report per project; results are cached.
    pub fn check_all_audits(&self, paths: &[PathBuf]) -> Result<Batch<AuditReport>, BatchError> {
        let batch = self.batch("audit", paths, |p, c| self.tools.check_audit(p, c))?;
        self.remember(AnalysisKind::Audit, batch.cancelled, &batch.results);
        Ok(batch)
    }

    pub fn check_all_licenses(&self, paths: &[PathBuf]) -> Result<LicenseAnalysis, BatchError> {
        let batch = self.batch("licenses", paths, |p, c| self.tools.check_licenses(p, c))?;
        let analysis = analyze_licenses(batch.results);
        self.remember(AnalysisKind::Licenses, batch.cancelled, &analysis);
        Ok(analysis)
    }

    pub fn analyze_dependencies(
        &self,
        paths: &[PathBuf],
    ) -> Result<DependencyAnalysis, BatchError> {
        let batch = self.batch("dependencies", paths, read_declared_deps)?;
        let analysis = analyze_dependencies(batch.results);
        self.remember(AnalysisKind::Dependencies, batch.cancelled, &analysis);
        Ok(analysis)
    }

    pub fn analyze_toolchains(&self, paths: &[PathBuf]) -> Result<ToolchainAnalysis, BatchError> {
        let batch = self.batch("toolchain", paths, read_toolchain)?;
        let analysis = analyze_toolchains(batch.results);
        self.remember(AnalysisKind::Toolchain, batch.cancelled, &analysis);
        Ok(analysis)
    }

    pub fn clean_projects(
        &self,
        paths: &[PathBuf],
        debug_only: bool,
    ) -> Result<Batch<CleanReport>, BatchError> {
        self.batch("clean", paths, |p, c| clean_target(p, debug_only, c))
    }
}
