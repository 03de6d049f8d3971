// ABOUTME: Entry point for the stacklink CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use stacklink::config::{self, Config};
use stacklink::error::Result;
use stacklink::output::{Output, OutputMode};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let output = Output::new(OutputMode::from_flags(cli.quiet, cli.json));
    if let Err(e) = run(cli.command, &output).await {
        output.error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(command: Commands, output: &Output) -> Result<()> {
    let cwd = env::current_dir()?;
    match command {
        Commands::Init { force } => {
            config::init_config(&cwd, force)?;
            output.success(&format!("Wrote {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::Publish {
            from_file,
            set,
            validate,
        } => {
            let config = Config::discover(&cwd)?;
            commands::publish(&config, from_file, set, validate, output).await
        }
        Commands::Fetch { key } => {
            let config = Config::discover(&cwd)?;
            commands::fetch(&config, key.as_deref(), output).await
        }
        Commands::Deploy {
            expect_digest,
            gateway_out,
        } => {
            let config = Config::discover(&cwd)?;
            commands::deploy(&config, expect_digest, gateway_out, output).await
        }
        Commands::Remove {
            acknowledge: _,
            restore_image,
        } => {
            let config = Config::discover(&cwd)?;
            commands::remove(&config, restore_image.as_deref(), output).await
        }
        Commands::Status => {
            let config = Config::discover(&cwd)?;
            commands::status(&config, output).await
        }
    }
}
