//! Plain-text reports for the CLI.

use colored::Colorize;

use crate::analysis::{
    AggregateReport, AuditSummary, LicenseAnalysis, OutdatedSummary, ToolchainAnalysis, ValueGroup,
};
use crate::batch::Batch;
use crate::deck::BatchRun;
use crate::utils::logger::Colors;
use crate::{AuditReport, CommandOutput, OutdatedDep, ProjectDescriptor, ToolStatus};

/// Human-readable byte count (binary units).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

pub fn print_projects(projects: &[ProjectDescriptor]) {
    let total: u64 = projects.iter().map(|p| p.target_size).sum();
    for p in projects {
        let ws = match &p.workspace_root {
            Some(root) => format!(" (member of {})", root.display()),
            None => String::new(),
        };
        println!(
            "{:<32} {:>10}  {:>3} deps  {}{}",
            p.name.bold(),
            format_bytes(p.target_size),
            p.dep_count,
            p.path.display(),
            Colors::colorize(Colors::DIM, &ws)
        );
    }
    println!(
        "{} projects, {} in target directories",
        projects.len(),
        format_bytes(total)
    );
}

/// Trailing error list shared by every batch command.
pub fn print_errors(errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    println!("\n{} ({}):", Colors::colorize(Colors::FAILED, "Errors"), errors.len());
    for e in errors {
        println!("  {} {}", Colors::colorize(Colors::FAILED, "✗"), e);
    }
}

pub fn print_outdated(batch: &Batch<Vec<OutdatedDep>>) {
    for r in batch.successes() {
        let deps = r.payload().map(Vec::as_slice).unwrap_or(&[]);
        if deps.is_empty() {
            println!("{} {}", Colors::colorize(Colors::OK, "✓"), r.project_name());
            continue;
        }
        println!("{} {}", Colors::colorize(Colors::MISMATCH, "!"), r.project_name().bold());
        for d in deps {
            println!("    {:<28} {} → {}  {}", d.name, d.current, d.latest, d.kind.dimmed());
        }
    }
    let s = OutdatedSummary::from_results(&batch.results);
    println!(
        "\n{} checked, {} with outdated dependencies ({} total), {} failed",
        s.projects_checked, s.projects_with_outdated, s.total_outdated, s.projects_failed
    );
}

pub fn print_audit(batch: &Batch<AuditReport>) {
    for r in batch.successes() {
        let Some(report) = r.payload() else { continue };
        if report.vulnerabilities.is_empty() && report.warnings.is_empty() {
            println!("{} {}", Colors::colorize(Colors::OK, "✓"), r.project_name());
            continue;
        }
        println!("{} {}", Colors::colorize(Colors::FAILED, "!"), r.project_name().bold());
        for v in &report.vulnerabilities {
            println!(
                "    {} {} {}: {} [{}]",
                Colors::colorize(Colors::FAILED, &v.id),
                v.package,
                v.version,
                v.title,
                v.severity
            );
        }
        for w in &report.warnings {
            println!(
                "    {} {} {}: {}",
                Colors::colorize(Colors::MISMATCH, &w.kind),
                w.package,
                w.version,
                w.title
            );
        }
    }
    let s = AuditSummary::from_results(&batch.results);
    println!(
        "\n{} checked, {} vulnerable ({} vulnerabilities, {} warnings), {} failed",
        s.projects_checked,
        s.vulnerable_projects,
        s.total_vulnerabilities,
        s.total_warnings,
        s.projects_failed
    );
}

fn print_value_groups(values: &[ValueGroup], indent: &str) {
    for v in values {
        let names: Vec<&str> = v.projects.iter().map(|p| p.name.as_str()).collect();
        println!(
            "{}{:<14} {}",
            indent,
            v.value,
            Colors::colorize(Colors::DIM, &names.join(", "))
        );
    }
}

/// Mismatched items first, then a one-line total.
pub fn print_aggregate(report: &AggregateReport, what: &str) {
    for g in report.mismatches() {
        println!(
            "{} {} ({} projects)",
            Colors::colorize(Colors::MISMATCH, "≠"),
            g.name.bold(),
            g.project_count
        );
        print_value_groups(&g.values, "    ");
    }
    println!(
        "\n{} unique {}, {} with mismatched versions",
        report.total_unique, what, report.mismatch_count
    );
}

pub fn print_toolchains(analysis: &ToolchainAnalysis) {
    println!("{}", "Toolchains".bold());
    print_value_groups(&analysis.toolchain_groups, "  ");
    println!("{}", "MSRV".bold());
    print_value_groups(&analysis.msrv_groups, "  ");
    if analysis.has_mismatches {
        let msg = "Projects disagree on toolchain or MSRV";
        println!("\n{}", Colors::colorize(Colors::MISMATCH, msg));
    } else {
        println!("\n{}", Colors::colorize(Colors::OK, "All pinned projects agree"));
    }
}

pub fn print_licenses(analysis: &LicenseAnalysis) {
    for g in &analysis.license_groups {
        let marker = if g.is_problematic {
            Colors::colorize(Colors::FAILED, "!")
        } else {
            Colors::colorize(Colors::OK, " ")
        };
        println!("{} {:<40} {:>4} packages", marker, g.license, g.packages.len());
    }
    println!(
        "\n{} packages, {} under licenses that need review",
        analysis.total_packages, analysis.problematic_count
    );
}

pub fn print_command_outputs(batch: &Batch<CommandOutput>) {
    for r in &batch.results {
        let status = if r.is_success() {
            Colors::colorize(Colors::OK, "✓")
        } else {
            Colors::colorize(Colors::FAILED, "✗")
        };
        let ms = r.payload().map(|o| o.duration_ms).unwrap_or(0);
        println!("{} {} ({} ms)", status, r.project_name(), ms);
    }
}

/// Generic summary line for a typed batch.
pub fn print_batch_summary(run: &BatchRun) {
    let mut line = format!("{}/{} succeeded", run.success_count(), run.len());
    if run.cancelled() {
        line.push_str(", cancelled");
    }
    println!("{}", line);
}

pub fn print_tools(tools: &[ToolStatus]) {
    for t in tools {
        if t.installed {
            println!("{} {}", Colors::colorize(Colors::OK, "✓"), t.name);
        } else {
            println!(
                "{} {:<16} {}",
                Colors::colorize(Colors::FAILED, "✗"),
                t.name,
                Colors::colorize(Colors::DIM, &t.install_hint)
            );
        }
    }
}
