//! CLI command implementations

use anyhow::{Context, bail};
use clap::Subcommand;
use serde::Serialize;
use undertow_core::{EpisodeId, UndertowConfig};
use undertow_search::{SearchHit, StreamLookupService};

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the JSON API server
    Serve {
        /// Host to bind to, overriding UNDERTOW_HOST
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to, overriding UNDERTOW_PORT
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Search the catalog by title
    Search {
        /// Title to search for
        term: String,
    },
    /// Show a catalog entry
    Info {
        /// Catalog id
        id: u64,
    },
    /// Resolve a catalog entry to its provider session
    Resolve {
        /// Catalog id
        id: u64,
    },
    /// List provider episodes for a catalog entry
    Episodes {
        /// Catalog id
        id: u64,
        /// Listing page, starting at 1
        #[arg(short, long, default_value = "1")]
        page: u32,
    },
    /// Extract stream variants for one episode
    Streams {
        /// Catalog id
        id: u64,
        /// Provider episode session token
        episode: String,
    },
    /// Drop the cached provider session for a catalog entry
    Forget {
        /// Catalog id
        id: u64,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns the lookup or server error of the command that fails
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    let config = UndertowConfig::from_env();

    match command {
        Commands::Serve { host, port } => serve(config, host, port).await,
        lookup_command => run_lookup(&config, lookup_command).await,
    }
}

/// Start the API server with optional listener overrides
///
/// # Errors
/// - The store or HTTP client could not be set up, or the listener could not bind
pub async fn serve(
    mut config: UndertowConfig,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    undertow_web::run_server(config)
        .await
        .map_err(|e| anyhow::anyhow!("server failed: {e}"))
}

async fn run_lookup(config: &UndertowConfig, command: Commands) -> anyhow::Result<()> {
    let lookup = StreamLookupService::connect(config)
        .await
        .context("failed to set up lookup service")?;

    match command {
        Commands::Serve { .. } => bail!("serve is not a lookup command"),
        Commands::Search { term } => {
            let entries = lookup.search_catalog(&term).await?;
            let hits: Vec<SearchHit> = entries.iter().map(SearchHit::from).collect();
            print_json(&hits)
        }
        Commands::Info { id } => print_json(&lookup.catalog_entry(id).await?),
        Commands::Resolve { id } => {
            let (entry, session) = lookup.resolve_by_id(id).await?;
            print_json(&serde_json::json!({
                "id": entry.id,
                "search_term": entry.search_term(),
                "session": session,
            }))
        }
        Commands::Episodes { id, page } => print_json(&lookup.list_episodes(id, page).await?),
        Commands::Streams { id, episode } => {
            let Some(episode) = EpisodeId::parse(&episode) else {
                bail!("episode session must not be empty");
            };
            print_json(&lookup.get_variants(id, &episode).await?)
        }
        Commands::Forget { id } => {
            lookup.invalidate_session(id).await?;
            tracing::info!("Dropped cached session for {}", id);
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{rendered}");
    Ok(())
}
