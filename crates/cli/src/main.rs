//! Gradwise CLI, the main entry point.
//!
//! Commands:
//! - `chat`    Interactive chat or single-message mode
//! - `memory`  Inspect and manage the retrieval store
//! - `tools`   List the registered tools
//! - `config`  Create or print the configuration

use clap::{Parser, Subcommand};

mod commands;
mod runtime;

#[derive(Parser)]
#[command(
    name = "gradwise",
    about = "Gradwise: your graduate application assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Session to continue
        #[arg(long, default_value = "cli")]
        session: String,

        /// Print the stage trace after each reply
        #[arg(long)]
        trace: bool,
    },

    /// Manage stored memories
    Memory {
        #[command(subcommand)]
        command: MemoryCommand,
    },

    /// List available tools
    Tools,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum MemoryCommand {
    /// Record counts and backend details
    Stats,

    /// Search stored records
    Search {
        query: String,

        #[arg(short, long, default_value_t = 5)]
        limit: usize,

        /// Only records of this kind (conversation, domain_note, preference)
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// Most recent records of one kind
    Recent {
        #[arg(short, long, default_value = "conversation")]
        kind: String,

        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Store a preference that shapes later answers
    Remember {
        text: String,

        #[arg(short, long, default_value = "general")]
        category: String,

        #[arg(long, default_value = "cli")]
        session: String,
    },

    /// Delete every stored record
    Clear {
        #[arg(long)]
        confirm: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Chat { message, session, trace } => commands::chat::run(message, &session, trace).await?,
        Commands::Memory { command } => match command {
            MemoryCommand::Stats => commands::memory::stats().await?,
            MemoryCommand::Search { query, limit, kind } => {
                commands::memory::search(&query, limit, kind.as_deref()).await?
            }
            MemoryCommand::Recent { kind, limit } => commands::memory::recent(&kind, limit).await?,
            MemoryCommand::Remember { text, category, session } => {
                commands::memory::remember(&text, &category, &session).await?
            }
            MemoryCommand::Clear { confirm } => commands::memory::clear(confirm).await?,
        },
        Commands::Tools => commands::tools::run().await?,
        Commands::Config { command } => match command {
            ConfigCommand::Init { force } => commands::config_cmd::init(force).await?,
            ConfigCommand::Show => commands::config_cmd::show().await?,
        },
    }

    Ok(())
}
