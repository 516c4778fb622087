//! stowage command-line entry point.
//!
//! Reads configuration from `STOWAGE_*` variables (and the file named by
//! `STOWAGE_CONFIG_FILE`), applies command-line overrides, then runs one
//! command against the configured engine. Logs go to stderr so values
//! written to stdout stay clean for piping.
//!
//! # Commands
//!
//! - `put` - Store a value under a key
//! - `get` - Write a stored value to stdout
//! - `rm` - Remove keys
//! - `ls` - List stored keys
//! - `stat` - Show store or key metadata as JSON
//! - `clear` - Remove every key
//! - `migrate` - Copy every entry into another engine
//! - `purge` - Drop old entries from a SQLite store

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use stowage_core::{EngineKind, SqliteEngine, SqliteOptions, StoreConfig};
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

use commands::parse_key;

/// Key-value blob storage on files or SQLite.
#[derive(Parser)]
#[command(name = "stowage")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Engine to use instead of the configured one
    #[arg(global = true, short, long, value_enum)]
    engine: Option<EngineArg>,

    /// Root directory (file engine) or database file (sqlite engine)
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Subdirectory of the root to store keys in (file engine)
    #[arg(global = true, long)]
    subdirectory: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(global = true, long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a value read from --value, --file or stdin
    Put {
        key: String,

        /// Value to store
        #[arg(long, conflicts_with = "file")]
        value: Option<String>,

        /// Read the value from this file
        #[arg(long)]
        file: Option<PathBuf>,

        /// Use the key as-is instead of hashing it
        #[arg(long)]
        verbatim: bool,
    },

    /// Write a stored value to stdout
    Get {
        key: String,

        /// Write the value to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Use the key as-is instead of hashing it
        #[arg(long)]
        verbatim: bool,
    },

    /// Remove keys; missing keys are ignored
    Rm {
        #[arg(required = true)]
        keys: Vec<String>,

        /// Use the keys as-is instead of hashing them
        #[arg(long)]
        verbatim: bool,
    },

    /// List stored keys
    Ls {
        /// Also print each key's last write time
        #[arg(short, long)]
        long: bool,
    },

    /// Show store metadata, or a key's metadata when a key is given
    Stat {
        key: Option<String>,

        /// Use the key as-is instead of hashing it
        #[arg(long)]
        verbatim: bool,
    },

    /// Remove every key
    Clear {
        /// Confirm removal
        #[arg(long)]
        yes: bool,
    },

    /// Copy every entry into another engine
    Migrate {
        /// Engine to copy into
        #[arg(long, value_enum)]
        to_engine: EngineArg,

        /// Root directory or database file of the target
        #[arg(long)]
        to_path: PathBuf,

        /// Subdirectory of the target root (file engine)
        #[arg(long)]
        to_subdirectory: Option<String>,
    },

    /// Drop entries from a SQLite store by age or count
    Purge {
        /// Remove entries last written more than this many days ago
        #[arg(long)]
        older_than_days: Option<i64>,

        /// Keep only the newest N entries
        #[arg(long)]
        max_entries: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EngineArg {
    File,
    Sqlite,
}

impl From<EngineArg> for EngineKind {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::File => EngineKind::File,
            EngineArg::Sqlite => EngineKind::Sqlite,
        }
    }
}

fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    let mut config = StoreConfig::load().context("failed to load configuration")?;
    commands::apply_overrides(&mut config, cli.engine.map(Into::into), cli.path, cli.subdirectory);
    tracing::debug!(?config, "resolved configuration");

    let mut stdout = tokio::io::stdout();

    match cli.command {
        Commands::Put { key, value, file, verbatim } => {
            let key = parse_key(&key, verbatim)?;
            let data = commands::entries::read_input(value, file).await?;
            let engine = config.open_engine().await?;
            commands::entries::put(engine.as_ref(), &key, data).await?;
            stdout.write_all(format!("{key}\n").as_bytes()).await?;
        }
        Commands::Get { key, output, verbatim } => {
            let key = parse_key(&key, verbatim)?;
            let engine = config.open_engine().await?;
            match output {
                Some(path) => {
                    let mut file = tokio::fs::File::create(&path)
                        .await
                        .with_context(|| format!("failed to create {}", path.display()))?;
                    commands::entries::get(engine.as_ref(), &key, &mut file).await?;
                }
                None => commands::entries::get(engine.as_ref(), &key, &mut stdout).await?,
            }
        }
        Commands::Rm { keys, verbatim } => {
            let keys = keys.iter().map(|k| parse_key(k, verbatim)).collect::<Result<Vec<_>>>()?;
            let engine = config.open_engine().await?;
            commands::entries::remove(engine.as_ref(), &keys).await?;
        }
        Commands::Ls { long } => {
            let engine = config.open_engine().await?;
            commands::entries::list(engine.as_ref(), long, &mut stdout).await?;
        }
        Commands::Stat { key, verbatim } => {
            let engine = config.open_engine().await?;
            let json = match key {
                Some(key) => {
                    let key = parse_key(&key, verbatim)?;
                    serde_json::to_string_pretty(&commands::stat::key_stat(engine.as_ref(), &key).await?)?
                }
                None => serde_json::to_string_pretty(&commands::stat::store_stat(engine.as_ref(), &config).await?)?,
            };
            stdout.write_all(format!("{json}\n").as_bytes()).await?;
        }
        Commands::Clear { yes } => {
            if !yes {
                bail!("refusing to remove every key without --yes");
            }
            let engine = config.open_engine().await?;
            let removed = commands::entries::clear(engine.as_ref()).await?;
            stdout.write_all(format!("removed {removed} keys\n").as_bytes()).await?;
        }
        Commands::Migrate { to_engine, to_path, to_subdirectory } => {
            let target_config = commands::migrate::target_config(&config, to_engine.into(), to_path, to_subdirectory)?;
            let source = config.open_engine().await?;
            let target = target_config.open_engine().await?;
            let copied = commands::migrate::run(source.as_ref(), target.as_ref()).await?;
            stdout.write_all(format!("migrated {copied} entries\n").as_bytes()).await?;
        }
        Commands::Purge { older_than_days, max_entries } => {
            if config.engine != EngineKind::Sqlite {
                bail!("purge is only supported by the sqlite engine");
            }
            let options = SqliteOptions { busy_timeout: config.busy_timeout(), ..SqliteOptions::default() };
            let engine = SqliteEngine::open_with(&config.db_path, options).await?;
            let output = commands::purge::run(&engine, older_than_days, max_entries).await?;
            stdout.write_all(format!("{}\n", serde_json::to_string_pretty(&output)?).as_bytes()).await?;
            engine.close().await?;
        }
    }

    stdout.flush().await?;
    Ok(())
}
