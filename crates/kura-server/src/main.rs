//! kura server binary
//!
//! HTTP file storage over a local directory.
//!
//! ## Usage
//!
//! ```bash
//! # Serve ./storage on localhost:8080
//! kura-server
//!
//! # Somewhere else
//! kura-server --root /srv/files --addr 0.0.0.0:9000
//! ```

use std::process::ExitCode;

use clap::Parser;
use kura_server::{Args, HttpServer, ServerConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr));

    #[cfg(feature = "telemetry")]
    let _otel_guard = if kura_telemetry::otel_enabled() {
        match kura_telemetry::otel_layer("kura-server") {
            Ok((otel_layer, guard)) => {
                registry.with(otel_layer).init();
                Some(guard)
            }
            Err(e) => {
                registry.init();
                tracing::warn!("OTel export disabled: {}", e);
                None
            }
        }
    } else {
        registry.init();
        None
    };

    #[cfg(not(feature = "telemetry"))]
    registry.init();

    let config = ServerConfig::from(Args::parse());
    tracing::info!("Starting kura server on {}...", config.bind_addr);

    if let Err(e) = HttpServer::new(config).run().await {
        tracing::error!("Server error: {:#}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
