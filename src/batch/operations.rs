//! Per-project operations run by the batch executor.
//!
//! Each operation turns one project directory into an [`OperationResult`]. Tool failures are
//! never raised: a missing cargo subcommand, a nonzero exit or unparsable output all become a
//! failed result with a readable message.

use anyhow::Result;
use log::debug;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::jobs::CancelToken;
use crate::locator::dir_size;
use crate::parsers::{
    parse_cargo_audit_json, parse_cargo_license_json, parse_cargo_outdated_json,
    parse_declared_deps, toolchain_info,
};
use crate::process::{CommandSpec, run_buffered};
use crate::utils::config::{ProcessConsts, ScanConsts};
use crate::{
    AuditReport, CleanReport, CommandOutput, DeclaredDep, LicenseInfo, OperationResult,
    OutdatedDep, ToolStatus, ToolchainInfo,
};

/// stderr fragments cargo prints when a subcommand binary is missing.
const NOT_INSTALLED_MARKERS: &[&str] = &["no such command", "no such subcommand"];

/// Cargo extensions behind the outdated, audit and license analyses.
pub const REQUIRED_TOOLS: &[&str] = &["outdated", "audit", "license"];

/// Which per-project operation a batch runs (see [`Deck::run_batch`](crate::Deck::run_batch)).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperationKind {
    Outdated,
    Audit,
    Licenses,
    Toolchain,
    Dependencies,
    /// Arbitrary cargo arguments, e.g. `["check", "--all-targets"]`.
    Command(Vec<String>),
    Clean { debug_only: bool },
}

impl OperationKind {
    /// Short label used for job names and progress bars.
    pub fn label(&self) -> &'static str {
        match self {
            OperationKind::Outdated => "outdated",
            OperationKind::Audit => "audit",
            OperationKind::Licenses => "licenses",
            OperationKind::Toolchain => "toolchain",
            OperationKind::Dependencies => "dependencies",
            OperationKind::Command(_) => "command",
            OperationKind::Clean { .. } => "clean",
        }
    }
}

/// How to invoke cargo: executable and optional per-command deadline.
#[derive(Clone, Debug)]
pub struct CargoTools {
    pub program: String,
    pub timeout: Option<Duration>,
}

impl Default for CargoTools {
    fn default() -> Self {
        Self {
            program: ProcessConsts::CARGO.to_string(),
            timeout: None,
        }
    }
}

pub fn is_not_installed(stderr: &str) -> bool {
    NOT_INSTALLED_MARKERS.iter().any(|m| stderr.contains(m))
}

/// Last `max_lines` non-blank stderr lines of a run, in order.
fn stderr_tail(out: &CommandOutput, max_lines: usize) -> String {
    let mut tail: Vec<&str> = out
        .stderr
        .lines()
        .rev()
        .filter(|l| !l.trim().is_empty())
        .take(max_lines)
        .collect();
    tail.reverse();
    tail.join("\n")
}

/// Explanation of a failed run, ending with up to `max_lines` of its stderr.
fn failure_message(out: &CommandOutput, max_lines: usize) -> String {
    let detail = stderr_tail(out, max_lines);
    let detail = if max_lines == 1 { detail.trim() } else { detail.as_str() };
    match (out.exit_code, detail.is_empty()) {
        (Some(code), true) => format!("`{}` exited with code {}", out.command, code),
        (Some(code), false) if detail.contains('\n') => {
            format!("`{}` exited with code {}:\n{}", out.command, code, detail)
        }
        (Some(code), false) => format!("`{}` exited with code {}: {}", out.command, code, detail),
        (None, true) => format!("`{}` did not complete", out.command),
        (None, false) => detail.to_string(),
    }
}

impl CargoTools {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn spec(&self, dir: &Path, args: &[&str]) -> CommandSpec {
        CommandSpec::new(&self.program, dir)
            .args(args.iter().copied())
            .timeout(self.timeout)
    }

    /// Run a cargo subcommand whose JSON stdout is parsed by `parse`. Some tools (`audit`)
    /// exit nonzero when they find something, so stdout is tried before the exit status.
    fn run_json_tool<T>(
        &self,
        dir: &Path,
        subcommand: &str,
        args: &[&str],
        cancel: &CancelToken,
        parse: impl FnOnce(&str) -> Result<T>,
    ) -> OperationResult<T> {
        let out = run_buffered(&self.spec(dir, args), cancel);
        if cancel.is_cancelled() {
            return OperationResult::failed(dir, "cancelled");
        }
        if is_not_installed(&out.stderr) {
            return OperationResult::failed(dir, format!("cargo-{} is not installed", subcommand));
        }
        if out.stdout.trim().is_empty() {
            return OperationResult::failed(dir, failure_message(&out, 1));
        }
        match parse(&out.stdout) {
            Ok(payload) => OperationResult::ok(dir, payload),
            Err(e) if out.success => {
                OperationResult::failed(dir, format!("Failed to parse output: {:#}", e))
            }
            Err(_) => OperationResult::failed(dir, failure_message(&out, 1)),
        }
    }

    pub fn check_outdated(
        &self,
        dir: &Path,
        cancel: &CancelToken,
    ) -> OperationResult<Vec<OutdatedDep>> {
        self.run_json_tool(
            dir,
            "outdated",
            &["outdated", "--format", "json", "--root-deps-only"],
            cancel,
            parse_cargo_outdated_json,
        )
    }

    pub fn check_audit(&self, dir: &Path, cancel: &CancelToken) -> OperationResult<AuditReport> {
        self.run_json_tool(dir, "audit", &["audit", "--json"], cancel, parse_cargo_audit_json)
    }

    pub fn check_licenses(
        &self,
        dir: &Path,
        cancel: &CancelToken,
    ) -> OperationResult<Vec<LicenseInfo>> {
        self.run_json_tool(
            dir,
            "license",
            &["license", "--json"],
            cancel,
            parse_cargo_license_json,
        )
    }

    /// Check each of [`REQUIRED_TOOLS`] with `cargo <sub> --version`, run in `dir`.
    pub fn check_tools(&self, dir: &Path, cancel: &CancelToken) -> Vec<ToolStatus> {
        REQUIRED_TOOLS
            .iter()
            .map(|&sub| {
                let out = run_buffered(&self.spec(dir, &[sub, "--version"]), cancel);
                let installed = out.success && !is_not_installed(&out.stderr);
                debug!("cargo-{}: installed={}", sub, installed);
                ToolStatus {
                    name: format!("cargo-{}", sub),
                    subcommand: sub.to_string(),
                    installed,
                    install_hint: format!("cargo install cargo-{}", sub),
                }
            })
            .collect()
    }

    /// Arbitrary cargo command. The result is a success only when cargo exits 0. A failure
    /// carries the exit code and the trailing stderr lines (compiler and test output).
    pub fn run_command(
        &self,
        dir: &Path,
        args: &[String],
        cancel: &CancelToken,
    ) -> OperationResult<CommandOutput> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let out = run_buffered(&self.spec(dir, &args), cancel);
        debug!("{} in {}: success={}", out.command, dir.display(), out.success);
        if out.success {
            return OperationResult::ok(dir, out);
        }
        let msg = match args.first() {
            Some(sub) if is_not_installed(&out.stderr) => format!("cargo-{} is not installed", sub),
            _ => failure_message(&out, ProcessConsts::ERROR_TAIL_LINES),
        };
        OperationResult::failed(dir, msg)
    }
}

/// Toolchain pin and MSRV from the project's files. No process is spawned.
pub fn read_toolchain(dir: &Path, _cancel: &CancelToken) -> OperationResult<ToolchainInfo> {
    let manifest = match fs::read_to_string(dir.join(ScanConsts::MANIFEST)) {
        Ok(m) => m,
        Err(e) => return OperationResult::failed(dir, format!("cannot read Cargo.toml: {}", e)),
    };
    let toolchain_toml = fs::read_to_string(dir.join("rust-toolchain.toml")).ok();
    let toolchain_plain = fs::read_to_string(dir.join("rust-toolchain")).ok();
    OperationResult::ok(
        dir,
        toolchain_info(
            toolchain_toml.as_deref(),
            toolchain_plain.as_deref(),
            Some(&manifest),
        ),
    )
}

/// Declared dependencies from the project's manifest.
pub fn read_declared_deps(
    dir: &Path,
    _cancel: &CancelToken,
) -> OperationResult<Vec<DeclaredDep>> {
    let manifest = match fs::read_to_string(dir.join(ScanConsts::MANIFEST)) {
        Ok(m) => m,
        Err(e) => return OperationResult::failed(dir, format!("cannot read Cargo.toml: {}", e)),
    };
    match parse_declared_deps(&manifest) {
        Ok(deps) => OperationResult::ok(dir, deps),
        Err(e) => OperationResult::failed(dir, format!("{:#}", e)),
    }
}

/// Remove `target/` (or only `target/debug`). Freed bytes are measured before removal.
pub fn clean_target(
    dir: &Path,
    debug_only: bool,
    cancel: &CancelToken,
) -> OperationResult<CleanReport> {
    if cancel.is_cancelled() {
        return OperationResult::failed(dir, "cancelled");
    }
    let target = dir.join(ScanConsts::TARGET_DIR);
    let victim = if debug_only {
        target.join("debug")
    } else {
        target
    };
    if !victim.exists() {
        return OperationResult::ok(
            dir,
            CleanReport {
                freed_bytes: 0,
                debug_only,
            },
        );
    }
    let freed_bytes = dir_size(&victim);
    match fs::remove_dir_all(&victim) {
        Ok(()) => OperationResult::ok(
            dir,
            CleanReport {
                freed_bytes,
                debug_only,
            },
        ),
        Err(e) => OperationResult::failed(dir, format!("remove {}: {}", victim.display(), e)),
    }
}
