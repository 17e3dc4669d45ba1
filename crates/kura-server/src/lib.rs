//! kura server library
//!
//! HTTP adapter over the kura storage engine.

pub mod config;
pub mod constants;
pub mod error;
pub mod routes;

use std::sync::Arc;

use anyhow::Context;
use kura_store::{Disk, Storage};
use tokio::net::TcpListener;

pub use config::{Args, ServerConfig};
pub use error::ApiError;
pub use routes::router;

/// HTTP server
pub struct HttpServer {
    config: ServerConfig,
}

impl HttpServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Open the storage root, bind, and serve until the process exits.
    pub async fn run(&self) -> anyhow::Result<()> {
        let storage = Storage::open(&self.config.root)
            .await
            .with_context(|| format!("opening storage at {}", self.config.root.display()))?;

        let listener = TcpListener::bind(&self.config.bind_addr)
            .await
            .with_context(|| format!("binding {}", self.config.bind_addr))?;

        tracing::info!("Serving {} on {}", self.config.root.display(), listener.local_addr()?);
        serve(listener, Arc::new(storage), self.config.max_upload_bytes).await
    }
}

/// Serve the storage API on an already bound listener.
pub async fn serve<D: Disk + 'static>(
    listener: TcpListener,
    storage: Arc<Storage<D>>,
    max_upload_bytes: usize,
) -> anyhow::Result<()> {
    axum::serve(listener, router(storage, max_upload_bytes))
        .await
        .context("http server failed")
}
