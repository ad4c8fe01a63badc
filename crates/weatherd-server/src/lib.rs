//! HTTP endpoint for weatherd.
//!
//! Exposes `GET /v1/forecast?lat=..&lon=..` and `GET /healthz` on top of a
//! [`weatherd_forecast::ForecastResolver`].

pub mod middleware;
pub mod routes;

pub use middleware::{RequestId, REQUEST_ID_HEADER};
pub use routes::{create_router, request_deadline, AppState};

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Serve `router` until `shutdown` is cancelled, then stop accepting and wait
/// for in-flight requests to finish.
///
/// # Errors
/// Accepting connections fails.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("starting weatherd on {}", addr);
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
