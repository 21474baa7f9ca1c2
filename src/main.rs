//! Identity Stack CLI
//!
//! Synthesizes the federated identity stack from environment configuration
//! and publishes its discovery parameters.
//!
//! # Usage
//! ```bash
//! # Print the stack template
//! identity-stack --env-file .env synth
//!
//! # Show which federated providers are enabled
//! identity-stack providers
//!
//! # Upsert /{APP_NAME}/Cognito/* into a parameter file
//! identity-stack publish --store parameters.json --dry-run
//! ```

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use identity_stack::parameter_store::{publish_parameters, FileParameterStore};
use identity_stack::stack::{
    provider_catalog, synthesize, BrandingDocument, BrandingInput, ProviderStatus, StackConfig,
    Synthesis,
};

// ============================================================
// CLI Definition
// ============================================================

#[derive(Parser)]
#[command(name = "identity-stack")]
#[command(about = "Federated identity stack synthesizer", long_about = None)]
#[command(version)]
struct Cli {
    /// Load environment variables from this file before resolving
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Branding override document (JSON)
    #[arg(long, global = true, env = "BRANDING_FILE")]
    branding: Option<PathBuf>,

    /// Directory branding asset files are read from
    #[arg(long, global = true, env = "BRANDING_ASSETS_DIR", default_value = "assets")]
    assets_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print or write the stack template
    Synth {
        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// List federated providers and whether they are enabled
    Providers,

    /// Print or write the exported parameter set
    Export {
        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Upsert exported parameters into a parameter store file
    Publish {
        /// Parameter store file
        #[arg(long, env = "PARAMETER_STORE_FILE")]
        store: PathBuf,

        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },
}

// ============================================================
// Main Entry Point
// ============================================================

#[tokio::main]
async fn main() -> Result<()> {
    // The env file has to be in the environment before clap reads `env =` keys
    let env_file = env_file_from_args(std::env::args_os());
    load_env_file(env_file.as_deref())?;

    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.json_logs);
    if let Some(path) = &env_file {
        info!(path = %path.display(), "Environment file loaded");
    }

    let config = StackConfig::from_env()?;

    match &cli.command {
        Commands::Synth { out } => {
            let synthesis = run_synthesis(&cli, &config)?;
            let rendered = synthesis
                .template()
                .to_json()
                .context("Failed to render stack template")?;
            write_output(out.as_deref(), &rendered)?;
            info!(
                stack = %synthesis.stack_name(),
                resources = synthesis.graph().len(),
                "✅ Stack template written"
            );
        }

        Commands::Providers => {
            println!("\n{:<10} {:<10} {:<40}", "PROVIDER", "STATUS", "MISSING");
            println!("{}", "-".repeat(60));

            for entry in provider_catalog(&config) {
                let (status, missing) = match &entry.status {
                    ProviderStatus::Active => ("active", String::new()),
                    ProviderStatus::Inactive { missing } => ("inactive", missing.join(", ")),
                };
                println!("{:<10} {:<10} {:<40}", entry.kind.provider_name(), status, missing);
            }
        }

        Commands::Export { out } => {
            let synthesis = run_synthesis(&cli, &config)?;
            let rendered = serde_json::to_string_pretty(synthesis.parameters())
                .context("Failed to render parameters")?;
            write_output(out.as_deref(), &rendered)?;
            info!(count = synthesis.parameters().len(), "✅ Parameters exported");
        }

        Commands::Publish { store, dry_run } => {
            let synthesis = run_synthesis(&cli, &config)?;
            if *dry_run {
                warn!("DRY RUN - parameter store will not be modified");
            }

            let store = FileParameterStore::new(store);
            let summary = publish_parameters(&store, synthesis.parameters(), *dry_run).await?;

            println!(
                "created: {}, updated: {}, unchanged: {}",
                summary.created, summary.updated, summary.unchanged
            );
            info!(
                store = %store.path().display(),
                total = summary.total(),
                "✅ Parameters published"
            );
        }
    }

    Ok(())
}

/// Pick `--env-file` out of the raw arguments without validating the rest
fn env_file_from_args<I, T>(args: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = Cli::command()
        .ignore_errors(true)
        .try_get_matches_from(args)
        .ok()?;

    // Global flags given after the subcommand live in its matches
    let mut current = Some(&matches);
    while let Some(level) = current {
        if let Some(path) = level.try_get_one::<PathBuf>("env_file").ok().flatten() {
            return Some(path.clone());
        }
        current = level.subcommand().map(|(_, sub)| sub);
    }
    None
}

/// Load the named env file, or `.env` from the working directory if present
fn load_env_file(path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("Failed to load env file {}", path.display()))?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }
    Ok(())
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // stdout carries command output, logs go to stderr
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run_synthesis(cli: &Cli, config: &StackConfig) -> Result<Synthesis> {
    let branding = load_branding(cli)?;
    synthesize(config, branding).context("Identity stack synthesis failed")
}

/// Read the override document (if any) and its assets
fn load_branding(cli: &Cli) -> Result<BrandingInput> {
    let branding_file = &cli.branding;
    let assets_dir = &cli.assets_dir;

    let document = match branding_file {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read branding file {}", path.display()))?;
            BrandingDocument::from_json(&raw)?
        }
        None => BrandingDocument::default(),
    };

    info!(
        branding = ?branding_file,
        assets_dir = %assets_dir.display(),
        "Loading branding"
    );
    document.load(assets_dir)
}

fn write_output(out: Option<&Path>, content: &str) -> Result<()> {
    match out {
        Some(path) => std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            println!("{}", content);
            Ok(())
        }
    }
}
