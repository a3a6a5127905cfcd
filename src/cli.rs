// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines the extract, resolve, replace and pin subcommands and their arguments.

use clap::{Args, Parser, Subcommand};
use manifest_pin::pinning::{DEFAULT_CONCURRENCY, DEFAULT_OUTPUT_EXTRACT, DEFAULT_OUTPUT_REPLACE};
use manifest_pin::resolver::ResolverKind;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "manifest-pin")]
#[command(about = "Pin the image references of operator manifests to digests")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Identify all the image references in the CSVs found in MANIFEST_DIR
    Extract {
        manifest_dir: PathBuf,

        /// Where to store the extracted references; - for stdout
        #[arg(long, default_value = "-")]
        output: PathBuf,
    },

    /// Resolve a list of image tags to digests; IMAGES_FILE may be - for stdin
    Resolve {
        images_file: PathBuf,

        /// Where to store the replacements; - for stdout
        #[arg(long, default_value = "-")]
        output: PathBuf,

        #[command(flatten)]
        resolver: ResolverArgs,
    },

    /// Modify the image references in the CSVs found in MANIFEST_DIR using REPLACEMENTS_FILE
    Replace {
        manifest_dir: PathBuf,

        replacements_file: PathBuf,

        /// Check that the manifests accept the replacements without writing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Extract, resolve and replace every image reference in MANIFEST_DIR
    Pin {
        manifest_dir: PathBuf,

        /// Where to store the extracted references
        #[arg(long, default_value = DEFAULT_OUTPUT_EXTRACT)]
        output_extract: PathBuf,

        /// Where to store the resolved replacements
        #[arg(long, default_value = DEFAULT_OUTPUT_REPLACE)]
        output_replace: PathBuf,

        /// Resolve and validate without modifying the manifests
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        resolver: ResolverArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ResolverArgs {
    /// The resolver to use
    #[arg(short, long, value_enum)]
    pub resolver: Option<ResolverKind>,

    /// Resolver arguments as key=value pairs (path, authFile)
    #[arg(long = "resolver-args", value_parser = parse_key_value, value_delimiter = ',')]
    pub resolver_args: Vec<(String, String)>,

    /// Authentication file for registry access
    #[arg(short = 'a', long)]
    pub authfile: Option<PathBuf>,

    /// YAML file with resolver settings; flags take precedence
    #[arg(long)]
    pub resolver_config: Option<PathBuf>,

    /// Maximum number of references resolved at once
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {s:?}"))?;
    Ok((key.trim().to_string(), value.to_string()))
}
