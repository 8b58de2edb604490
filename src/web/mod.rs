//! HTTP front end: link requests, grade consultation and the batch trigger.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Basic authentication for the admin route
pub mod admin;
/// Link request form parsing and validation
pub mod forms;
/// Route handlers
pub mod handlers;

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    Router,
    routing::{get, post},
};

use crate::app::App;

/// Every route, sharing `app`.
pub fn router(app: Arc<App>) -> Router {
    Router::new()
        .route("/", get(handlers::index).post(handlers::request_link))
        .route("/consultar", get(handlers::consult))
        .route("/admin/notify", post(handlers::notify))
        .with_state(app)
}

/// Serves [`router`] on `addr` until the process is stopped.
pub async fn serve(app: Arc<App>, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Could not bind {addr}"))?;

    tracing::info!("Listening on http://{addr}");
    axum::serve(listener, router(app))
        .await
        .context("Server stopped unexpectedly")
}
