//! # org-assist CLI (`assist`)
//!
//! ## Usage
//!
//! ```bash
//! assist --config ./config/assist.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `assist init` | Create the SQLite database and run schema migrations |
//! | `assist serve` | Start the HTTP API |
//! | `assist index <file.json>` | Index one document or an array of documents |
//! | `assist remove <schema> <table> <id> --org <org>` | Remove an indexed entity |
//! | `assist stats <org>` | Indexed counts by content type |
//! | `assist overview <org>` | Re-render the organization overview document |
//! | `assist search --org <org> "<query>"` | Raw similarity search |
//! | `assist query --org <org> --user <user> "<text>"` | Ask a question or request an action |
//! | `assist history <session> [--clear]` | Show or clear a session |
//! | `assist tools` | List the action catalog |
//!
//! Log verbosity follows `RUST_LOG` (default `info`); logs go to stderr.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use org_assist::config;
use org_assist::engine::QueryRequest;
use org_assist::{commands, migrate, server};
use org_assist_core::models::DocumentKey;

/// org-assist: retrieval-augmented answers and tool-calling actions over
/// organizational data.
#[derive(Parser)]
#[command(name = "assist", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/assist.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Index documents from a JSON file (one object or an array).
    Index {
        file: PathBuf,
    },

    /// Remove an indexed entity and its vectors.
    Remove {
        schema: String,
        table: String,
        id: String,
        #[arg(long)]
        org: String,
    },

    /// Show indexed counts for an organization.
    Stats {
        org: String,
    },

    /// Re-render and index the organization overview.
    Overview {
        org: String,
    },

    /// Similarity search inside one organization.
    Search {
        query: String,
        #[arg(long)]
        org: String,
        /// Restrict to a content type (repeatable).
        #[arg(long = "type")]
        content_types: Vec<String>,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Ask a question or request an action; prints the JSON response.
    Query {
        text: String,
        #[arg(long)]
        org: String,
        #[arg(long)]
        user: String,
        /// Continue an existing session.
        #[arg(long)]
        session: Option<String>,
        /// Tool categories to bind, comma-separated (default: all).
        #[arg(long, value_delimiter = ',')]
        tools: Option<Vec<String>>,
    },

    /// Show recent turns of a session, or delete it.
    History {
        session: String,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        clear: bool,
    },

    /// List the action catalog.
    Tools {
        /// Only these categories (repeatable).
        #[arg(long = "category")]
        categories: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // The catalog is static; no config needed.
    if let Commands::Tools { categories } = &cli.command {
        return commands::run_tools(categories);
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Index { file } => {
            commands::run_index(&cfg, &file).await?;
        }
        Commands::Remove {
            schema,
            table,
            id,
            org,
        } => {
            let key = DocumentKey {
                organization_id: org,
                source_schema: schema,
                source_table: table,
                source_id: id,
            };
            commands::run_remove(&cfg, key).await?;
        }
        Commands::Stats { org } => {
            commands::run_stats(&cfg, &org).await?;
        }
        Commands::Overview { org } => {
            commands::run_overview(&cfg, &org).await?;
        }
        Commands::Search {
            query,
            org,
            content_types,
            limit,
        } => {
            commands::run_search(&cfg, org, query, content_types, limit).await?;
        }
        Commands::Query {
            text,
            org,
            user,
            session,
            tools,
        } => {
            let request = QueryRequest {
                organization_id: org,
                user_id: user,
                session_id: session,
                query: text,
                enabled_tool_categories: tools,
            };
            commands::run_query(&cfg, request).await?;
        }
        Commands::History {
            session,
            limit,
            clear,
        } => {
            commands::run_history(&cfg, &session, limit, clear).await?;
        }
        Commands::Tools { .. } => {}
    }

    Ok(())
}
