//! Config command - configuration management.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use kvsession_config::{ConfigLayers, PROJECT_CONFIG_FILE};
use serde_json::json;

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the resolved store configuration and its sources
    Show,

    /// Initialize a config file with defaults
    Init {
        /// Create project-local config (./kvsession.toml) instead of user config
        #[arg(long)]
        local: bool,
    },
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx).await,
        ConfigCommand::Init { local } => cmd_init(local, ctx).await,
    }
}

async fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = kvsession_config::load_config(ctx.config_dir.as_deref());
    let config = &loaded.config;
    let store = config.store_config()?;
    let db_path = ctx.db_path(config).ok();

    if ctx.json_output {
        let value = json!({
            "sources": loaded
                .loaded_from()
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>(),
            "warnings": loaded.warnings(),
            "table": {
                "name": store.table_name,
                "hash_key": store.hash_key,
                "sort_key": store.sort_key,
                "hash_prefix": store.hash_prefix,
            },
            "session": {
                "ttl_ms": store.ttl.map(|d| d.as_millis() as u64),
                "default_ttl_ms": store.default_ttl.as_millis() as u64,
                "touch_interval_ms": store.touch_interval.as_millis() as u64,
                "keep_expired": store.expired_policy.keeps(),
                "optimistic_touch": store.optimistic_touch,
            },
            "sqlite": { "path": db_path.map(|p| p.display().to_string()) },
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("# kvsession Configuration\n");

    // Sources
    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("No config files loaded (using defaults)\n");
    } else {
        println!("Config files:");
        for source in &sources {
            println!("  {}", source.display());
        }
        println!();
    }

    println!("Table:");
    println!("  name:        {}", store.table_name);
    println!("  hash key:    {}", store.hash_key);
    println!(
        "  sort key:    {}",
        store.sort_key.as_deref().unwrap_or("(none)")
    );
    println!("  hash prefix: {:?}", store.hash_prefix);
    println!();

    println!("Session:");
    match store.ttl {
        Some(ttl) => println!("  ttl:            {} ms", ttl.as_millis()),
        None => println!("  ttl:            cookie max-age"),
    }
    println!("  default ttl:    {} ms", store.default_ttl.as_millis());
    println!("  touch interval: {} ms", store.touch_interval.as_millis());
    println!("  keep expired:   {}", store.expired_policy.keeps());
    println!("  optimistic:     {}", store.optimistic_touch);
    println!();

    println!("SQLite:");
    match db_path {
        Some(path) => println!("  path: {}", path.display()),
        None => println!("  path: (unresolved, pass --db)"),
    }
    println!();

    // Warnings
    let warnings = loaded.warnings();
    if !warnings.is_empty() {
        println!("Warnings:");
        for w in &warnings {
            println!("  ⚠ {}", w);
        }
        println!();
    }

    if ctx.verbose {
        println!("---\nRaw config:\n");
        if let Ok(toml_str) = config.to_toml() {
            println!("{}", toml_str);
        }
    }

    Ok(())
}

async fn cmd_init(local: bool, ctx: &Context) -> Result<()> {
    let path = if local {
        PathBuf::from(PROJECT_CONFIG_FILE)
    } else {
        ConfigLayers::discover(ctx.config_dir.as_deref())
            .user
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
    };

    if kvsession_config::init_config_file(&path)? {
        println!("Created config file: {}", path.display());
    } else {
        println!("Config file already exists: {}", path.display());
    }
    Ok(())
}
