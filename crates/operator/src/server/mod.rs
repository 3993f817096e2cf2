mod routes;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::Result;

/// Health and metrics endpoints; the operator has no other HTTP surface.
pub struct Server;

impl Server {
    pub fn build_router() -> Router {
        Router::new()
            .route("/healthz", get(routes::health))
            .route("/metrics", get(routes::metrics))
            .layer(TraceLayer::new_for_http())
    }

    pub async fn start(addr: &str) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, Self::build_router()).await?;
        Ok(())
    }
}
