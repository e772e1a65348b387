use clap::{Parser, Subcommand};

use reflex_cli::commands::{self, CartridgeCommands, GrainCommands};
use reflex_cli::output::OutputFormat;

#[derive(Parser)]
#[command(name = "reflex-cli")]
#[command(about = "Command-line interface for the reflex-cache knowledge grounding service")]
#[command(version, long_about = None)]
struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Human)]
    format: OutputFormat,

    /// Enable verbose (debug-level) logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cartridge management: add facts, query, inspect the manifest.
    #[command(alias = "cart")]
    Cartridge {
        #[command(subcommand)]
        command: CartridgeCommands,
    },
    /// Grain inspection: list crystallised grains, check routing decisions.
    Grain {
        #[command(subcommand)]
        command: GrainCommands,
    },
    /// Run a query through the grain-then-cartridge cascade.
    Query {
        #[arg(long)]
        root: std::path::PathBuf,
        #[arg(long)]
        name: String,
        text: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    match cli.command {
        Commands::Cartridge { command } => commands::run_cartridge(command, cli.format)?,
        Commands::Grain { command } => commands::run_grain(command, cli.format)?,
        Commands::Query { root, name, text } => commands::run_query(root, name, text).await?,
    }

    Ok(())
}
