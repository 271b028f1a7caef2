//! Errata Control - CLI for recording and exporting error reports

use anyhow::Result;
use clap::Parser;
use erratactl::cli::Cli;
use erratactl::{commands, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    commands::run(cli).await
}
