//! Command-line front end: argument parsing, handlers, progress and report printing.

pub mod arg_parser;
pub mod cli;
pub mod progress;
pub mod report;

pub use arg_parser::{Cli, Commands, CommonArgs};
pub use cli::{build_opts, handle_run};
