//! Propel destination connector binary.
//!
//! Implements the `spec`, `check` and `write` commands of the Airbyte protocol. Protocol messages
//! are written to stdout, diagnostics go to stderr through `tracing`.

use anyhow::Result;
use clap::Parser;

use crate::commands::Command;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "destination-propel", about = "Propel destination connector")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    telemetry::init_tracing(env!("CARGO_CRATE_NAME"))?;

    args.command.run().await
}
