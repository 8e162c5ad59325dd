//! # mdseek CLI
//!
//! ## Usage
//!
//! ```bash
//! mdseek --config ./config/mdseek.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mdseek sources` | List configured repositories and local-copy status |
//! | `mdseek ingest` | Run one ingest pass and print the report |
//! | `mdseek search "<query>"` | Ingest, then run one query |
//! | `mdseek serve` | Ingest on startup, then serve the HTTP API |
//!
//! Log verbosity is controlled with `RUST_LOG` (default `info`).

use anyhow::bail;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use mdseek::config;
use mdseek::search::search_command;
use mdseek::server::run_server;
use mdseek::service::DocService;
use mdseek::sources::list_sources;

/// mdseek: semantic search over Markdown documents in git repositories.
#[derive(Parser)]
#[command(
    name = "mdseek",
    about = "Semantic search over Markdown documents in git repositories",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/mdseek.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured sources and whether a local working copy exists.
    Sources,

    /// Sync every source, embed its Markdown files, and build the index.
    Ingest {
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Ingest, then run a single query and print the page.
    Search {
        /// Free-text query.
        query: String,

        /// Page number, starting at 1.
        #[arg(long)]
        page: Option<i64>,

        /// Results per page (defaults to `search.default_size`).
        #[arg(long)]
        size: Option<i64>,
    },

    /// Ingest on startup, then serve the HTTP API on `[server].bind`.
    Serve,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Sources => {
            list_sources(&cfg)?;
        }
        Commands::Ingest { json } => {
            let service = DocService::from_config(cfg)?;
            let report = service.ingest().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.summary());
                for source in &report.sources {
                    match (&source.action, &source.error) {
                        (_, Some(err)) => println!("  {:<20} skipped: {}", source.name, err),
                        (Some(action), None) => println!(
                            "  {:<20} {:?}, {} documents",
                            source.name, action, source.documents
                        ),
                        (None, None) => {}
                    }
                }
                for failure in &report.failures {
                    println!("  skipped item: {}", failure);
                }
            }
            if !report.ok {
                bail!("{}", report.summary());
            }
        }
        Commands::Search { query, page, size } => {
            let service = DocService::from_config(cfg)?;
            search_command(&service, &query, page, size).await?;
        }
        Commands::Serve => {
            let service = Arc::new(DocService::from_config(cfg)?);
            match service.ingest().await {
                Ok(report) if report.ok => {}
                Ok(report) => tracing::warn!("serving without an index: {}", report.summary()),
                Err(e) => tracing::warn!("serving without an index: {:#}", e),
            }
            run_server(service).await?;
        }
    }

    Ok(())
}
