// ABOUTME: Entry point for the manifest-pin CLI application.
// ABOUTME: Parses arguments, sets up logging and dispatches to command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use manifest_pin::error::Result;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

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

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Extract {
            manifest_dir,
            output,
        } => commands::extract(&manifest_dir, &output),
        Commands::Resolve {
            images_file,
            output,
            resolver,
        } => commands::resolve(&images_file, &output, &resolver).await,
        Commands::Replace {
            manifest_dir,
            replacements_file,
            dry_run,
        } => commands::replace(&manifest_dir, &replacements_file, dry_run),
        Commands::Pin {
            manifest_dir,
            output_extract,
            output_replace,
            dry_run,
            resolver,
        } => {
            commands::pin(
                &manifest_dir,
                &output_extract,
                &output_replace,
                dry_run,
                &resolver,
            )
            .await
        }
    }
}
