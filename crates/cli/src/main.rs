//! tcharvest CLI - Main Entry Point
//!
//! Extracts test-case scripts from a test-management web UI into a
//! directory of plain-text files.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{extract, import, init, pages};

/// tcharvest - test-case script extractor
#[derive(Parser)]
#[command(name = "tcharvest")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (TOML); defaults apply when it does not exist
    #[arg(short, long, default_value = "tcharvest.toml", env = "TCHARVEST_CONFIG", global = true)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every test case of a listing into text files
    Extract(extract::ExtractArgs),

    /// List the pages open in a running browser
    Pages(pages::PagesArgs),

    /// Save a hand-pasted test case as a text file
    Import(import::ImportArgs),

    /// Write a configuration file with default values
    InitConfig(init::InitConfigArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Extract(args) => extract::execute(args, &cli.config).await,
        Commands::Pages(args) => pages::execute(args, &cli.config).await,
        Commands::Import(args) => import::execute(args, &cli.config),
        Commands::InitConfig(args) => init::execute(args, &cli.config),
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
