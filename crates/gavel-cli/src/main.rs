//! Gavel CLI binary entrypoint.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use gavel_cli::cli::{Cli, Commands};
use gavel_cli::commands;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let app = commands::build_app(&cli.state_dir, &cli.base_url)?;

    match cli.command {
        Commands::HandleDocument { file } => commands::handle_document(&app, &file),
        Commands::SendScheduled { rate, date } => {
            commands::send_scheduled(&app, rate.into(), date)
        }
        Commands::Cleanup => commands::cleanup(&app),
        Commands::AddAlert(args) => commands::add_alert(&app, &args),
        Commands::AddUser(args) => commands::add_user(&app, &args),
    }
}
