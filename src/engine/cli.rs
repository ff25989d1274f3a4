//! CLI command handler: merge options, open the store, dispatch the subcommand.

use anyhow::{Context, Result, bail};
use kdam::Animation;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;

use crate::batch::OperationKind;
use crate::cache::AnalysisKind;
use crate::deck::{BatchRun, Deck};
use crate::engine::arg_parser::{Cli, Commands, CommonArgs};
use crate::engine::progress::{
    ProgressBarConfig, create_progress_bar, finish_progress_bar, progress_hook,
};
use crate::engine::report;
use crate::jobs::JobRegistry;
use crate::process::{CommandEvent, StreamSource};
use crate::store::{PersistenceStore, SqliteStore};
use crate::utils::deck_toml::{apply_file_to_opts, load_deck_toml};
use crate::utils::setup_logging;
use crate::{Opts, ProjectDescriptor, error_list};

/// Defaults, then `.cratedeck.toml` from the root, then CLI flags.
pub fn build_opts(common: &CommonArgs) -> Opts {
    let mut opts = Opts::default();
    if let Some(file) = load_deck_toml(&common.root) {
        apply_file_to_opts(&file, &mut opts);
    }
    if common.db.is_some() {
        opts.db_path = common.db.clone();
    }
    if !common.exclude.is_empty() {
        opts.exclude = common.exclude.clone();
    }
    if let Some(v) = common.max_depth {
        opts.max_depth = v;
    }
    if let Some(v) = common.jobs {
        opts.jobs = v;
    }
    if let Some(ref v) = common.cargo {
        opts.cargo = v.clone();
    }
    if common.timeout.is_some() {
        opts.timeout_secs = common.timeout;
    }
    if let Some(v) = common.per_unit_jobs {
        opts.per_unit_jobs = v;
    }
    if let Some(v) = common.follow_links {
        opts.follow_links = v;
    }
    if let Some(v) = common.verbose {
        opts.verbose = v;
    }
    opts
}

/// SQLite store at the configured path. A store that cannot be opened is not fatal: the run
/// continues with in-memory cache and settings.
fn open_store(common: &CommonArgs, opts: &Opts) -> Option<Arc<dyn PersistenceStore>> {
    if common.no_store {
        return None;
    }
    let path = opts.db_path.clone().unwrap_or_else(|| common.db_path());
    match SqliteStore::open(&path) {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            warn!("store unavailable ({:#}); cache and settings will not persist", e);
            None
        }
    }
}

/// Ctrl+C cancels every registered job; runners terminate their children and batches wind down.
fn install_ctrlc(registry: Arc<JobRegistry>) -> Result<()> {
    ctrlc::set_handler(move || {
        let n = registry.cancel_all();
        warn!("interrupted: cancelling {} job(s)", n);
    })
    .context("set Ctrl+C handler")
}

/// Project paths for batch commands, skipping hidden projects.
fn visible_paths(deck: &Deck, projects: &[ProjectDescriptor]) -> Vec<PathBuf> {
    let settings = deck.settings();
    projects
        .iter()
        .filter(|p| !settings.is_hidden(&p.path))
        .map(|p| p.path.clone())
        .collect()
}

/// Match by exact path, then by case-insensitive name.
fn find_project<'a>(
    projects: &'a [ProjectDescriptor],
    query: &str,
) -> Result<&'a ProjectDescriptor> {
    let as_path = PathBuf::from(query).canonicalize().ok();
    projects
        .iter()
        .find(|p| as_path.as_ref() == Some(&p.path))
        .or_else(|| projects.iter().find(|p| p.name.eq_ignore_ascii_case(query)))
        .with_context(|| format!("no project named or located at '{}'", query))
}

/// Run `f` with a progress bar over `total` projects when verbose.
fn with_progress<R>(
    deck: &Deck,
    opts: &Opts,
    total: usize,
    desc: &'static str,
    f: impl FnOnce() -> R,
) -> R {
    if !opts.verbose {
        return f();
    }
    let bar = create_progress_bar(ProgressBarConfig::new(total, desc, Animation::Classic));
    deck.set_progress(Some(progress_hook(&bar)));
    let out = f();
    deck.set_progress(None);
    finish_progress_bar(&bar);
    out
}

fn print_cached(deck: &Deck, kind: AnalysisKind) -> Result<()> {
    let Some(cached) = deck.get_cache::<serde_json::Value>(kind) else {
        println!("No cached {} result", kind);
        return Ok(());
    };
    println!("{} captured at {} (unix)", kind, cached.captured_at);
    println!(
        "{}",
        serde_json::to_string_pretty(&cached.value).context("format cached value")?
    );
    Ok(())
}

/// Stream `cargo <args>` in one project until it completes or is cancelled.
fn stream_project(deck: &Deck, project: &ProjectDescriptor, args: &[String]) -> Result<()> {
    let Some((command, rest)) = args.split_first() else {
        bail!("missing cargo command");
    };
    let (id, stream) = deck.run_streaming(&project.path, command, rest);
    info!("job {} started in {}", id, project.path.display());
    let mut completion = None;
    for event in stream {
        match event {
            CommandEvent::Line { line, source } => match source {
                StreamSource::Stdout => println!("{}", line),
                StreamSource::Stderr => eprintln!("{}", line),
            },
            CommandEvent::Completed(c) => completion = Some(c),
        }
    }
    let Some(c) = completion else {
        bail!("command ended without a completion event");
    };
    if c.cancelled {
        bail!("cancelled");
    }
    if !c.success {
        match (&c.error, c.exit_code) {
            (Some(err), _) => bail!("{}", err),
            (None, Some(code)) => bail!("cargo exited with code {}", code),
            (None, None) => bail!("cargo terminated by a signal"),
        }
    }
    Ok(())
}

/// Run the selected subcommand.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let opts = build_opts(&cli.common);
    setup_logging(opts.verbose);
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_uppercase(),
        opts
    );

    let store = open_store(&cli.common, &opts);
    let deck = Deck::from_opts(&opts, store);
    install_ctrlc(Arc::clone(deck.registry()))?;

    let root = &cli.common.root;
    match &cli.command {
        Commands::Cache { kind } => return print_cached(&deck, *kind),
        Commands::Tools => {
            report::print_tools(&deck.check_tools(root));
            return Ok(());
        }
        _ => {}
    }

    let outcome = deck
        .scan_outcome(root)
        .with_context(|| format!("scan {}", root.display()))?;
    if let Ok(canonical) = root.canonicalize() {
        deck.settings().set_scan_root(&canonical);
    }
    for (path, msg) in &outcome.skipped {
        debug!("skipped {}: {}", path.display(), msg);
    }
    let projects = outcome.projects;
    let paths = visible_paths(&deck, &projects);

    match &cli.command {
        Commands::Scan { json } => {
            if *json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&projects).context("serialize projects")?
                );
            } else {
                report::print_projects(&projects);
            }
        }
        Commands::Outdated => {
            let batch = with_progress(&deck, &opts, paths.len(), "Outdated", || {
                deck.check_all_outdated(&paths)
            })?;
            report::print_outdated(&batch);
            report::print_errors(&batch.error_list());
        }
        Commands::Audit => {
            let batch = with_progress(&deck, &opts, paths.len(), "Audit", || {
                deck.check_all_audits(&paths)
            })?;
            report::print_audit(&batch);
            report::print_errors(&batch.error_list());
        }
        Commands::Licenses => {
            let analysis = with_progress(&deck, &opts, paths.len(), "Licenses", || {
                deck.check_all_licenses(&paths)
            })?;
            report::print_licenses(&analysis);
            report::print_errors(&error_list(&analysis.projects));
        }
        Commands::Deps => {
            let analysis = deck.analyze_dependencies(&paths)?;
            report::print_aggregate(&analysis.report, "dependencies");
            report::print_errors(&error_list(&analysis.projects));
        }
        Commands::Toolchains => {
            let analysis = deck.analyze_toolchains(&paths)?;
            report::print_toolchains(&analysis);
            report::print_errors(&error_list(&analysis.projects));
        }
        Commands::Exec { args } => {
            let kind = OperationKind::Command(args.clone());
            let run = with_progress(&deck, &opts, paths.len(), "Exec", || {
                deck.run_batch(&paths, &kind)
            })?;
            if let BatchRun::Command(batch) = &run {
                report::print_command_outputs(batch);
            }
            report::print_batch_summary(&run);
            report::print_errors(&run.error_list());
        }
        Commands::Run { project, args } => {
            let project = find_project(&projects, project)?;
            stream_project(&deck, project, args)?;
        }
        Commands::Clean { debug_only } => {
            let batch = with_progress(&deck, &opts, paths.len(), "Clean", || {
                deck.clean_projects(&paths, *debug_only)
            })?;
            let freed: u64 = batch
                .successes()
                .filter_map(|r| r.payload())
                .map(|c| c.freed_bytes)
                .sum();
            println!("Freed {}", report::format_bytes(freed));
            report::print_errors(&batch.error_list());
        }
        Commands::Favorite { project } => {
            let project = find_project(&projects, project)?;
            let now = deck.settings().toggle_favorite(&project.path);
            println!("{} {}", project.name, if now { "is a favorite" } else { "unfavorited" });
        }
        Commands::Hide { project } => {
            let project = find_project(&projects, project)?;
            let now = deck.settings().toggle_hidden(&project.path);
            println!("{} {}", project.name, if now { "hidden" } else { "visible" });
        }
        Commands::Cache { .. } | Commands::Tools => {}
    }
    Ok(())
}
