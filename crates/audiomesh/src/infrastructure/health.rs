//! HTTP health endpoint.

use std::future::Future;
use std::net::SocketAddr;

use axum::{routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub fn router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Binds `addr` and serves the API until `shutdown` resolves.
pub async fn serve<F>(addr: SocketAddr, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    serve_on(listener, shutdown).await
}

/// Serves the API on an already-bound listener until `shutdown` resolves.
pub async fn serve_on<F>(listener: TcpListener, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(addr = ?listener.local_addr().ok(), "health API listening");
    axum::serve(listener, router())
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("health API stopped");
    Ok(())
}
