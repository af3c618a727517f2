//! AutoGraph CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use config::{Config, CONFIG_FILE};

#[derive(Parser)]
#[command(name = "autograph")]
#[command(about = "Diagram version diffs and offline edit sync", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Workspace root (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Config file, relative to the root unless absolute
    #[arg(short, long, default_value = CONFIG_FILE)]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the document store server
    Serve {
        /// Port to listen on (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,
    },
    /// Diff two canvas document JSON files
    Diff {
        /// Older version
        old: PathBuf,
        /// Newer version
        new: PathBuf,
        /// Pretty-print the result
        #[arg(long)]
        pretty: bool,
    },
    /// Diff two stored versions of a diagram
    Compare {
        #[arg(short, long)]
        diagram: String,
        #[arg(long)]
        from: u64,
        #[arg(long)]
        to: u64,
    },
    /// Inspect and replay the offline edit queue
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
    /// Delete the data directory (pending edits and cached documents)
    Clear {
        /// Confirm that pending edits may be lost
        #[arg(long)]
        yes: bool,
    },
    /// Show version
    Version,
}

#[derive(Subcommand)]
pub enum QueueAction {
    /// Queue an edit for a diagram
    Enqueue {
        #[arg(short, long)]
        diagram: String,
        /// create, update or delete
        #[arg(short, long)]
        kind: autograph_sync::EditKind,
        /// Canvas document JSON file (create and update)
        #[arg(long)]
        document: Option<PathBuf>,
        /// Version the edit was made against
        #[arg(long)]
        base_version: Option<u64>,
    },
    /// List pending edits in replay order
    List {
        #[arg(short, long)]
        diagram: Option<String>,
    },
    /// Replay pending edits now
    Flush,
    /// Show queue counts and health
    Status,
    /// Keep flushing with backoff until Ctrl-C
    Watch,
    /// Put a held edit back in line
    Requeue { id: String },
    /// Discard every pending edit
    Clear {
        /// Confirm that pending edits will be lost
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("autograph={}", log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config_path = if cli.config.is_absolute() {
        cli.config.clone()
    } else {
        cli.root.join(&cli.config)
    };
    let config = Config::load(&config_path)?;
    tracing::debug!("Workspace root: {}", cli.root.display());

    match cli.command {
        Commands::Serve { port, host } => commands::serve(&config, host, port).await,
        Commands::Diff { old, new, pretty } => commands::diff(&config, &old, &new, pretty),
        Commands::Compare { diagram, from, to } => {
            commands::compare(&cli.root, &config, &diagram, from, to).await
        }
        Commands::Queue { action } => commands::queue(&cli.root, &config, action).await,
        Commands::Clear { yes } => commands::clear(&cli.root, &config, yes),
        Commands::Version => {
            println!("AutoGraph v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
