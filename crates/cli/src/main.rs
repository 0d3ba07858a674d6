//! CodeSage CLI: the main entry point.
//!
//! Commands:
//! - `models`: List known model profiles and their prompt budgets
//! - `tokens`: Count tokens in a file or a string
//! - `assemble`: Build the prompt for a query over a local project
//! - `correction`: Check a transcript for a self-correction trigger
//! - `config`: Show the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "codesage",
    about = "CodeSage: token-budgeted prompt assembly and ReAct stepping over a codebase",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a config file (default: ~/.codesage/config.toml)
    #[arg(long, global = true, env = "CODESAGE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List known model profiles
    Models,

    /// Count tokens for a model
    Tokens {
        /// Text to count (omit when using --file)
        text: Option<String>,

        /// Count the contents of a file instead
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Model whose profile to use
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Gather and assemble the prompt for a query
    Assemble {
        /// Project root directory
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// The user query
        #[arg(short, long)]
        query: String,

        /// Model whose budget to assemble for
        #[arg(short, long)]
        model: Option<String>,

        /// Explicit file or folder references (repeatable)
        #[arg(short, long = "path")]
        paths: Vec<String>,

        /// The file currently focused in the editor
        #[arg(long)]
        implicit: Option<String>,

        /// JSON transcript to include as recent conversation
        #[arg(long)]
        history: Option<PathBuf>,

        /// Run keyword search over the project for extra context
        #[arg(long)]
        search: bool,

        /// Print a JSON report instead of the prompt
        #[arg(long)]
        json: bool,
    },

    /// Analyze a transcript for a self-correction trigger
    Correction {
        /// JSON transcript (array of turns)
        #[arg(long)]
        history: PathBuf,

        /// The new user input
        #[arg(short, long)]
        input: String,

        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    Config {
        /// Print a starter config file instead
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Models => commands::models::run(config).await?,
        Commands::Tokens { text, file, model } => {
            commands::tokens::run(config, text, file, model).await?
        }
        Commands::Assemble {
            root,
            query,
            model,
            paths,
            implicit,
            history,
            search,
            json,
        } => {
            let args = commands::assemble::AssembleArgs {
                root,
                query,
                model,
                paths,
                implicit,
                history,
                search,
            };
            commands::assemble::run(config, args, json).await?
        }
        Commands::Correction {
            history,
            input,
            json,
        } => commands::correction::run(config, history, input, json).await?,
        Commands::Config { default } => commands::config_cmd::run(config, default).await?,
    }

    Ok(())
}
