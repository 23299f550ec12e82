//! `soundlaw` command-line entry point.

use clap::Parser;
use soundlaw::cli::{run, Cli};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run(cli)
}
