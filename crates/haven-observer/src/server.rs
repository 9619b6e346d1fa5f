//! HTTP server bootstrap.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Bind and serve the observer API until the process is stopped.
///
/// # Errors
///
/// Returns the bind or serve error from the underlying listener.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> std::io::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "observer API listening");
    axum::serve(listener, router).await
}
