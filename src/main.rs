//! cratedeck CLI: scan, audit and run cargo across many projects.

use anyhow::Result;
use clap::Parser;
use cratedeck::engine::arg_parser::Cli;
use cratedeck::engine::handle_run;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
