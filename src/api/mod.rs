use std::net::SocketAddr;

use axum::routing::get;
use axum::Router;
use serde::Serialize;
use snafu::ResultExt;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::{ApplicationError, BindAddressSnafu, WebServerSnafu};

mod error;
mod posts;
mod state;
pub mod visitor;

pub use error::*;
pub use state::*;

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

/// Successful responses are wrapped as `{"status": "success", "data": ...}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    status: &'static str,
    data: T,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Envelope {
            status: "success",
            data,
        }
    }
}

pub fn create_router(app: App) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest("/api/posts", posts::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(app)
}

pub async fn serve(address: SocketAddr, app: App) -> Result<(), ApplicationError> {
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .context(BindAddressSnafu { address })?;

    tracing::info!(%address, "listening");

    let service = create_router(app).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context(WebServerSnafu)
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "could not listen for the shutdown signal");
        std::future::pending::<()>().await;
    }

    tracing::info!("shutting down");
}
