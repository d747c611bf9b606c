//! Bodega server binary.
//!
//! Reads `BODEGA_*` environment configuration, opens the builds root,
//! starts the retention sweeper (when an oracle URL is configured),
//! and serves the artifact protocol until Ctrl+C.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::Request;
use axum::ServiceExt;
use tracing_subscriber::EnvFilter;

use bodega_api::{service, AppState, Config};
use bodega_oracle::{OracleConfig, TagOracle};
use bodega_store::ArtifactStore;
use bodega_sweep::{SweepConfig, Sweeper};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            std::process::exit(2);
        }
    };

    let store = Arc::new(
        ArtifactStore::open(&config.builds_root).expect("failed to open builds root"),
    );
    tracing::info!(builds_root = %store.root().display(), "artifact store ready");

    let sweeper = match &config.oracle_url {
        Some(url) => {
            let oracle = TagOracle::new(OracleConfig {
                url: url.clone(),
                timeout_secs: config.oracle_timeout_secs,
            })
            .expect("failed to build oracle client");
            tracing::info!(
                oracle_url = %url,
                interval_secs = config.sweep_interval.as_secs(),
                grace_secs = config.grace_period.as_secs(),
                policy = ?config.oracle_unreachable_policy,
                "starting retention sweeper"
            );
            Some(
                Sweeper::new(
                    store.clone(),
                    Arc::new(oracle),
                    SweepConfig {
                        interval: config.sweep_interval,
                        grace_period: config.grace_period,
                        unreachable_policy: config.oracle_unreachable_policy,
                    },
                )
                .spawn(),
            )
        }
        None => {
            tracing::warn!("BODEGA_ORACLE_URL is not set; retention sweeps are disabled");
            None
        }
    };

    let app = service(AppState::new(store));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    tracing::info!("bodega listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind listener");
    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    if let Some(handle) = sweeper {
        handle.shutdown().await;
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    tracing::info!("shutdown signal received");
}
