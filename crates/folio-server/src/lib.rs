//! HTTP server for Folio.
//!
//! Serves the JSON API that edits documentation trees and the published
//! static sites those trees are built into.
//!
//! # Architecture
//!
//! ```text
//! Editor ──HTTP──► axum router (folio-server)
//!                      │
//!                      ├─► /api/docs/*  ──► TreeStore (folio-tree)
//!                      │                        │ BuildTrigger
//!                      │                        ▼
//!                      │                  BuildScheduler ──► ProjectBuilder
//!                      │                  (folio-build)        │ materialize
//!                      │                                       │ generator
//!                      │                                       ▼
//!                      └─► anything else ──► SiteRouter ──► sites/<project>/
//! ```

mod app;
mod auth;
mod error;
mod handlers;
mod middleware;
mod sites;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use folio_build::{BuildScheduler, GeneratorCommand, ProjectBuilder, SchedulerConfig};
use folio_config::EditorToken;
use folio_site::{SiteLayout, SiteRouter};
use folio_tree::{NullSink, TreeError, TreeStore};
use sites::SiteIndex;
use state::AppState;

pub use auth::{Authenticator, StaticTokens};

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Redirect target for requests no site serves.
    pub admin_path: String,
    /// Root of project sources and published sites.
    pub data_dir: PathBuf,
    /// SQLite database file.
    pub database: PathBuf,
    /// Debounce and worker settings.
    pub scheduler: SchedulerConfig,
    /// Static-site generator invocation and time limit.
    pub generator: GeneratorCommand,
    /// Accepted editor tokens.
    pub editors: Vec<EditorToken>,
}

/// Create server configuration from Folio config.
#[must_use]
pub fn server_config_from_folio_config(config: &folio_config::Config) -> ServerConfig {
    ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        admin_path: config.server.admin_path.clone(),
        data_dir: config.storage_resolved.data_dir.clone(),
        database: config.storage_resolved.database.clone(),
        scheduler: SchedulerConfig {
            debounce: config.build.debounce(),
            workers: config.build.workers,
        },
        generator: GeneratorCommand::new(config.build.command.clone(), config.build.args.clone())
            .with_timeout(config.build.timeout()),
        editors: config.auth.editors.clone(),
    }
}

/// Failure to bring up the store and scheduler.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("cannot create data directory {}: {source}", .path.display())]
    DataDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot open database: {0}")]
    Database(#[from] TreeError),
}

/// Tree store wired to a running build scheduler.
pub struct Services {
    /// Store whose mutations enqueue builds on `scheduler`.
    pub store: TreeStore,
    pub scheduler: BuildScheduler,
    pub layout: SiteLayout,
    /// Routing table invalidated by every mutation of `store`.
    sites: Arc<SiteIndex>,
}

impl Services {
    /// Open the database and start the scheduler.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn start(config: &ServerConfig) -> Result<Self, StartError> {
        tokio::fs::create_dir_all(&config.data_dir)
            .await
            .map_err(|source| StartError::DataDir {
                path: config.data_dir.clone(),
                source,
            })?;

        // The builder reads through a store without a sink; builds never
        // trigger builds.
        let reader = TreeStore::open(&config.database, Arc::new(NullSink)).await?;
        let layout = SiteLayout::new(config.data_dir.clone());
        let builder = ProjectBuilder::new(reader.clone(), layout.clone(), config.generator.clone());
        let scheduler = BuildScheduler::new(Arc::new(builder), config.scheduler.clone());
        let sites = Arc::new(SiteIndex::default());
        let store = reader.with_sink(sites.sink(Arc::new(scheduler.clone())));

        Ok(Self {
            store,
            scheduler,
            layout,
            sites,
        })
    }
}

/// Run the server.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or the server fails to
/// start.
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let services = Services::start(&config).await?;

    let state = Arc::new(AppState {
        store: services.store,
        scheduler: services.scheduler,
        router: SiteRouter::new(services.layout),
        sites: services.sites,
        auth: Arc::new(StaticTokens::new(&config.editors)),
        admin_path: config.admin_path.clone(),
    });
    if config.editors.is_empty() {
        tracing::warn!("No editor tokens configured, the API is read-only");
    }

    let app = app::create_router(state);

    let addr = SocketAddr::from_str(&format!("{}:{}", config.host, config.port))?;
    tracing::info!(
        address = %addr,
        data_dir = %config.data_dir.display(),
        "Starting server"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for shutdown signal (Ctrl-C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}
