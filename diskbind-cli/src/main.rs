//! diskbind command-line interface.

mod cli;
mod commands;

use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::init_tracing();
    cli::Cli::parse().run().await
}
