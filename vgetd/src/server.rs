use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;

use vget_core::VgetConfig;

use crate::api::{self, AppState};
use crate::{build_engine, sweeper, Result};

/// Bring up the engine, the cleanup sweeper and the HTTP surface, then
/// serve until a shutdown signal arrives.
pub async fn run(config: VgetConfig, bind_override: Option<SocketAddr>) -> Result<()> {
    let engine = build_engine(&config)?;

    if config.cleanup.enabled {
        tokio::spawn(sweeper::run(config.media_dir(), config.cleanup.clone()));
    }

    let address: SocketAddr = match bind_override {
        Some(address) => address,
        None => config.server.bind_addr.parse()?,
    };
    let app = api::router(AppState::new(engine));

    let listener = TcpListener::bind(address).await?;
    info!(%address, "vgetd API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
