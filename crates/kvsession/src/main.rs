//! kvsession - inspect and maintain persisted web sessions
//!
//! Main entry point for the kvsession CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{config, session};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// kvsession - inspect and maintain persisted web sessions
#[derive(Parser)]
#[command(name = "kvsession")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// SQLite database path (overrides [sqlite].path)
    #[arg(long, global = true, env = "KVSESSION_DB")]
    pub db: Option<PathBuf>,

    /// User config directory (overrides KVSESSION_CONFIG_DIR)
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print a stored session
    Get(session::GetArgs),

    /// Store a session from a JSON object
    Set(session::SetArgs),

    /// Delete a session
    Destroy(session::DestroyArgs),

    /// Refresh a session's expiry
    Touch(session::TouchArgs),

    /// Delete every expired session
    Purge(session::PurgeArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_json);

    let ctx = commands::Context {
        db_path: cli.db,
        config_dir: cli.config_dir,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Get(args) => session::get(args, &ctx).await,
        Commands::Set(args) => session::set(args, &ctx).await,
        Commands::Destroy(args) => session::destroy(args, &ctx).await,
        Commands::Touch(args) => session::touch(args, &ctx).await,
        Commands::Purge(args) => session::purge(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}

/// Logs go to stderr so stdout stays clean for command output.
fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose {
        "kvsession=debug,kvsession_core=debug,kvsession_config=debug,kvsession_sqlite=debug,info"
    } else {
        "kvsession=info,kvsession_core=info,kvsession_config=info,kvsession_sqlite=info,warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
