use clap::{Parser, Subcommand};
use esdump::cli::dump::DumpArgs;
use esdump::cli::restore::RestoreArgs;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "esdump")]
#[command(about = "Dump search index documents to disk and restore them", long_about = None)]
struct Cli {
    /// Config file path, overriding the default search locations
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the mapping and matching documents of an index to a dump directory
    Dump(DumpArgs),
    /// Create an index from a dump directory and bulk-load its documents
    Restore(RestoreArgs),
    /// Create or check the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a commented sample config
    Init {
        /// Print to stdout instead of writing the config file
        #[arg(long)]
        stdout: bool,
    },
    /// Load the config file and report every problem found
    Validate,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "esdump=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Dump(args) => esdump::cli::dump::run(config_path, args).await?,
        Commands::Restore(args) => esdump::cli::restore::run(config_path, args).await?,
        Commands::Config { action } => match action {
            ConfigAction::Init { stdout } => esdump::cli::config::init(stdout)?,
            ConfigAction::Validate => {
                esdump::cli::config::validate(esdump::config::resolve_config_path(config_path))?
            }
        },
    }

    Ok(())
}
