// keyscope - scoped CLI tokens for the Keyscope secrets service

mod api;
mod auth;
mod cli;
mod config;
mod desktop;
mod env;
mod error;
mod store;

use std::process::ExitCode;

use clap::Parser;
use error::CliError;

fn main() -> ExitCode {
    // Parse CLI arguments first to get verbose flag
    let args = cli::Cli::parse();

    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    // Logs share stderr with prompts; stdout stays clean for tokens and JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(log_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli::execute(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match &err {
                CliError::Aborted => eprintln!("{}", err),
                _ => eprintln!("Error: {}", err),
            }
            ExitCode::from(err.exit_code())
        }
    }
}
