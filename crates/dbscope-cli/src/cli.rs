//! dbscope - read-only database introspection for AI agents
//!
//! Usage:
//!   dbscope --config databases.json databases [--connect]
//!   dbscope --config databases.json schema <component> --database <id> [--table <name>]
//!   dbscope --config databases.json query "<sql>" --database <id> [--param <value>...]
//!   dbscope tools
//!
//! Each run serves a single tool call and then exits, so the schema cache and
//! its sweep task start empty every time. The cache only pays off when
//! `DatabaseTools` is embedded in a long-lived host that serves many calls.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use dbscope_connection::DatabaseManager;
use dbscope_schema::SchemaCache;
use dbscope_services::{DatabaseTools, QueryArgs, SchemaExplorerArgs};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dbscope")]
#[command(about = "Read-only database introspection for AI agents")]
#[command(version)]
struct Cli {
    /// Path to the database configuration JSON
    #[arg(long, env = "DBSCOPE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log output format (logs go to stderr)
    #[arg(long, value_enum, default_value = "fmt", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured databases
    Databases {
        /// Connect every database and report which succeeded
        #[arg(long)]
        connect: bool,
    },

    /// Explore the schema of one database
    Schema {
        /// tables, columns, relationships or full
        component: String,

        /// Database ID
        #[arg(short, long)]
        database: String,

        /// Table name (required for columns)
        #[arg(short, long)]
        table: Option<String>,

        /// Timeout in milliseconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Run a read-only query
    Query {
        /// SQL statement
        query: String,

        /// Database ID
        #[arg(short, long)]
        database: String,

        /// Positional parameter, repeatable
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// Timeout in milliseconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Print the tool definitions as JSON
    Tools,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Fmt,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Fmt => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    if let Commands::Tools = cli.command {
        return print_json(&DatabaseTools::definitions());
    }

    let config = cli
        .config
        .context("no database configuration given; pass --config or set DBSCOPE_CONFIG")?;
    let manager = Arc::new(DatabaseManager::new());
    manager
        .load_config_file(&config)
        .await
        .with_context(|| format!("failed to load {}", config.display()))?;

    let cache = Arc::new(SchemaCache::from_env());
    let shutdown = CancellationToken::new();
    let sweep = cache.spawn_cleanup(shutdown.clone());

    let tools = DatabaseTools::new(Arc::clone(&manager), cache);
    let outcome = run(cli.command, &manager, tools, &shutdown).await;

    shutdown.cancel();
    if let Err(e) = sweep.await {
        tracing::debug!(error = %e, "cache sweep task ended abnormally");
    }
    if let Err(e) = manager.close_all().await {
        tracing::warn!(error = %e, "failed to close connections");
    }
    outcome
}

async fn run(
    command: Commands,
    manager: &DatabaseManager,
    tools: DatabaseTools,
    shutdown: &CancellationToken,
) -> Result<()> {
    // Ctrl-C cancels the running call
    let call_token = shutdown.child_token();
    let interrupt = call_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, cancelling");
            interrupt.cancel();
        }
    });

    match command {
        Commands::Databases { connect } => {
            if connect {
                manager.connect_all().await?;
            }
            let connected = manager.connected_databases();
            let databases: Vec<serde_json::Value> = manager
                .list_databases()
                .into_iter()
                .filter_map(|id| manager.config(&id))
                .map(|config| {
                    json!({
                        "id": config.id,
                        "type": config.db_type,
                        "label": config.label(),
                        "connected": connected.contains(&config.id),
                    })
                })
                .collect();
            print_json(&databases)
        }
        Commands::Schema {
            component,
            database,
            table,
            timeout,
        } => {
            manager
                .connect(&database)
                .await
                .with_context(|| format!("failed to connect to {database}"))?;
            let args = SchemaExplorerArgs {
                component: Some(component),
                table,
                timeout,
                database: Some(database),
            };
            let output = tools
                .schema_explorer()
                .call_with_cancellation(args, call_token)
                .await?;
            print_json(&output)
        }
        Commands::Query {
            query,
            database,
            params,
            timeout,
        } => {
            manager
                .connect(&database)
                .await
                .with_context(|| format!("failed to connect to {database}"))?;
            let args = QueryArgs {
                query: Some(query),
                params,
                timeout,
                database: Some(database),
            };
            let output = tools
                .query_tool()
                .call_with_cancellation(args, call_token)
                .await?;
            print_json(&output)
        }
        Commands::Tools => print_json(&DatabaseTools::definitions()),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to encode output")?;
    println!("{text}");
    Ok(())
}
