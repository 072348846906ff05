//! `diceyml` command line tool

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

mod commands;

use commands::render::Format;

#[derive(Parser)]
#[command(name = "diceyml")]
#[command(about = "Resolve, validate and render diceyml deployment descriptors")]
#[command(version)]
struct Cli {
    /// Descriptor file path
    #[arg(short, long, global = true, default_value = "dice.yml")]
    file: PathBuf,

    /// Log pass boundaries
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the descriptor and print every finding
    Validate {
        /// Resolve for this environment before validating
        #[arg(short, long)]
        env: Option<String>,

        /// Print findings as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Print the resolved descriptor
    Render {
        /// Target environment
        #[arg(short, long)]
        env: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Yaml)]
        format: Format,

        /// Skip validation
        #[arg(long)]
        no_validate: bool,
    },

    /// Print the service startup order
    Deps,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Validate { env, json } => commands::validate::run(&cli.file, env.as_deref(), json),
        Commands::Render {
            env,
            format,
            no_validate,
        } => commands::render::run(&cli.file, env.as_deref(), format, !no_validate),
        Commands::Deps => commands::deps::run(&cli.file),
    }
}
