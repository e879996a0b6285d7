//! Pipelog CLI binary entrypoint.
//!
//! This is the main entry point for the `pipelog` command-line tool.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use pipelog_cli::app::{build_service, load_config, require_service};
use pipelog_cli::cli::{Cli, Commands};
use pipelog_cli::commands::{
    FetchCommand, FilesCommand, InvalidateCommand, ReadCommand, SearchCommand,
};
use pipelog_cli::output::OutputFormat;

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), pipelog_cli::CliError> {
    let format = OutputFormat::new(cli.format);
    let config = load_config(&cli, |name| std::env::var(name).ok())?;
    let mut stdout = io::stdout().lock();

    match &cli.command {
        Commands::Fetch(run) => {
            let service = require_service(&cli, &config)?;
            FetchCommand::new(&service)
                .execute(&mut stdout, &format, run)
                .await?;
        }
        Commands::Read(args) => {
            let service = require_service(&cli, &config)?;
            ReadCommand::new(&service)
                .execute(&mut stdout, &format, args)
                .await?;
        }
        Commands::Search(args) => {
            let service = require_service(&cli, &config)?;
            SearchCommand::new(&service)
                .execute(&mut stdout, &format, args)
                .await?;
        }
        Commands::Files(args) => {
            let service = build_service(&cli, &config)?;
            FilesCommand::new(service.as_ref())
                .execute(&mut stdout, &format, args)
                .await?;
        }
        Commands::Invalidate(run) => {
            InvalidateCommand::new(&config.storage_paths())
                .execute(&mut stdout, &format, run)
                .await?;
        }
    }

    Ok(())
}
