//! Colored stderr logging and report colors.

use colored::{ColoredString, Colorize};
use env_logger::Builder;
use log::{Level, LevelFilter};
use std::io::Write;

/// Module path without the crate prefix (`cratedeck::batch::operations` -> `batch::operations`).
fn short_target(target: &str) -> &str {
    target
        .strip_prefix(env!("CARGO_PKG_NAME"))
        .map(|t| t.trim_start_matches("::"))
        .filter(|t| !t.is_empty())
        .unwrap_or(target)
}

/// Install the logger once. Dependencies log at warn; this crate at info (debug when verbose).
/// Later calls are ignored, so tests and the CLI can both call it.
pub fn setup_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let _ = Builder::from_default_env()
        .filter_level(LevelFilter::Warn)
        .filter_module(env!("CARGO_PKG_NAME"), level)
        .format(|buf, record| {
            let name = env!("CARGO_PKG_NAME").cyan();
            let target = short_target(record.target());
            let line = match record.level() {
                Level::Error => {
                    format!("[{} {} {}] {}", name, "ERROR".red(), target, record.args())
                }
                Level::Warn => {
                    format!("[{} {} {}] {}", name, "WARN".yellow(), target, record.args())
                }
                Level::Debug | Level::Trace => format!(
                    "[{} {}] {}",
                    name,
                    target.bright_black(),
                    record.args()
                ),
                Level::Info => format!("[{}] {}", name, record.args()),
            };
            writeln!(buf, "{}", line)
        })
        .try_init();
}

/// Terminal colors for report output.
pub struct Colors;

impl Colors {
    pub const OK: &'static str = "green";
    pub const FAILED: &'static str = "red";
    pub const MISMATCH: &'static str = "yellow";
    pub const DIM: &'static str = "bright black";

    pub fn colorize(color: &str, text: &str) -> ColoredString {
        text.color(color)
    }
}
