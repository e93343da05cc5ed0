//! Persistkit CLI - object-relational persistence over SQLite

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use persistkit::config::{self, Config};
use persistkit::storage::CursorMode;
use persistkit::{Persistence, sample, ui};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod demo;

#[derive(Parser)]
#[command(name = "persistkit")]
#[command(version)]
#[command(about = "Object-relational persistence core - declared schemas on SQLite")]
#[command(long_about = r#"
Persistkit maps declared Rust types onto SQLite tables:
  • One primary table per type, one junction table per list reference
  • Transactional add / update / remove with relation bookkeeping
  • Shallow hydration with explicit unresolved links

Example usage:
  persistkit init --database ./.persistkit/persistkit.db
  persistkit demo
  persistkit stats --json
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a persistkit.toml
    Init {
        /// Path to the config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Database file, or :memory:
        #[arg(short, long)]
        database: Option<String>,

        /// Cursor variant (streaming, buffered)
        #[arg(long)]
        cursor: Option<String>,

        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Run the sample model through the persistence core
    Demo {
        /// Path to the config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Database file, or :memory:
        #[arg(short, long)]
        database: Option<String>,
    },

    /// Show row counts of every managed table
    Stats {
        /// Path to the config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Database file, or :memory:
        #[arg(short, long)]
        database: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Drop and recreate every managed table
    Clear {
        /// Path to the config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Database file, or :memory:
        #[arg(short, long)]
        database: Option<String>,
    },
}

/// Config file (if any) with the command-line database override applied
fn resolve_config(path: Option<&Path>, database: Option<String>) -> anyhow::Result<Config> {
    let mut config = config::load_config(path)?.unwrap_or_default();
    if let Some(database) = database {
        config.database = database;
    }
    Ok(config)
}

fn open(config: &Config) -> anyhow::Result<Persistence> {
    Ok(Persistence::open(config, sample::registry_builder())?)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Init {
            config: config_path,
            database,
            cursor,
            force,
        } => {
            let path = config_path.unwrap_or_else(config::default_config_path);
            let mut config = Config::default();
            if let Some(database) = database {
                config.database = database;
            }
            if let Some(cursor) = cursor {
                config.cursor = cursor.parse::<CursorMode>()?;
            }

            config::write_config(&path, &config, force)?;
            if !config.is_in_memory() {
                config::ensure_db_dir(Path::new(&config.database))?;
                let root = path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new("."));
                config::ensure_gitignore(root)?;
            }

            ui::success(&format!("Wrote {}", path.display()));
            ui::info("Database", &config.database);
            ui::info("Cursor", config.cursor.as_str());
        }

        Commands::Demo { config: config_path, database } => {
            let config = resolve_config(config_path.as_deref(), database)?;
            tracing::info!("Running demo against {}", config.database);
            let ctx = open(&config)?;
            demo::run(&ctx)?;
            println!("{}", ui::stats_table(&ctx.stats()?));
            ctx.close()?;
        }

        Commands::Stats {
            config: config_path,
            database,
            json,
        } => {
            let config = resolve_config(config_path.as_deref(), database)?;
            let ctx = open(&config)?;
            let stats = ctx.stats()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                ui::header(&format!("Persistkit Statistics ({})", config.database));
                println!("{}", ui::stats_table(&stats));
            }
            ctx.close()?;
        }

        Commands::Clear { config: config_path, database } => {
            let config = resolve_config(config_path.as_deref(), database)?;
            let ctx = open(&config)?;
            ctx.clear()?;
            ui::success(&format!("Cleared {} tables in {}", ctx.stats()?.len(), config.database));
            ctx.close()?;
        }
    }

    Ok(())
}
