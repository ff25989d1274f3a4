use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::cache::AnalysisKind;
use crate::utils::config::PackagePaths;

struct DefaultArgs;

impl DefaultArgs {
    pub const ROOT: &'static str = ".";
}

/// Manage many local Cargo projects at once.
#[derive(Clone, Parser)]
#[command(name = "cratedeck")]
#[command(about = "Scan, audit and run cargo across every project under a directory.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Clone, Subcommand)]
pub enum Commands {
    /// List Cargo projects under the root.
    Scan {
        /// Print descriptors as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Check every project for outdated dependencies (needs cargo-outdated).
    Outdated,
    /// Run a security audit on every project (needs cargo-audit).
    Audit,
    /// Group dependency licenses across projects (needs cargo-license).
    Licenses,
    /// Find dependencies declared at different versions across projects.
    Deps,
    /// Compare toolchain pins and MSRV across projects.
    Toolchains,
    /// Run a cargo command in every project, e.g. `cratedeck exec -- check --all-targets`.
    Exec {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Stream a cargo command in one project, e.g. `cratedeck run mycrate -- test`. Ctrl+C cancels.
    Run {
        /// Project name or path.
        project: String,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Report which of cargo-outdated, cargo-audit and cargo-license are installed.
    Tools,
    /// Delete build artifacts.
    Clean {
        /// Only remove `target/debug`.
        #[arg(long)]
        debug_only: bool,
    },
    /// Show the last cached result of an analysis.
    /// KIND: outdated, audit, dependencies, toolchain or licenses.
    Cache { kind: AnalysisKind },
    /// Toggle a project's favorite flag.
    Favorite { project: String },
    /// Toggle whether a project is hidden from batch commands.
    Hide { project: String },
}

#[derive(Clone, Args)]
pub struct CommonArgs {
    /// Directory to scan. Default: current directory.
    #[arg(long, short = 'r', global = true, default_value = DefaultArgs::ROOT)]
    pub root: PathBuf,

    /// Path to the cratedeck store. Default: `.cratedeck` in the root.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Keep cache and settings in memory only.
    #[arg(long, global = true)]
    pub no_store: bool,

    /// Projects processed at once.
    #[arg(long, short = 'j', global = true)]
    pub jobs: Option<usize>,

    /// Exclude patterns (glob syntax). Repeat for several: -e vendor -e 'tmp-*'
    #[arg(long, short = 'e', global = true)]
    pub exclude: Vec<String>,

    /// Maximum directory depth below the root.
    #[arg(long, global = true)]
    pub max_depth: Option<usize>,

    /// Cargo executable.
    #[arg(long, global = true)]
    pub cargo: Option<String>,

    /// Per-command deadline in seconds.
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Register one cancellable job per in-flight project.
    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub per_unit_jobs: Option<bool>,

    /// Follow symbolic links while scanning.
    #[arg(long, short = 'f', global = true, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub follow_links: Option<bool>,

    /// Verbose output.
    #[arg(long, short = 'v', global = true, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}

impl CommonArgs {
    /// Store path from `--db`, defaulting to the package db filename in the root.
    pub fn db_path(&self) -> PathBuf {
        self.db
            .clone()
            .unwrap_or_else(|| self.root.join(PackagePaths::get().db_filename()))
    }
}
