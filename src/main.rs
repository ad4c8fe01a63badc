use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use weatherd_core::Config;
use weatherd_forecast::{Bands, ForecastResolver, NwsClient, RetryPolicy, TtlCache};
use weatherd_server::{create_router, request_deadline, serve, AppState};

/// How long in-flight requests may drain after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    weatherd_core::init_logging(config.log_level)?;

    let config = match config.validated() {
        Ok((config, _)) => config,
        Err(e) => {
            tracing::error!("{} ({})", e.user_message(), e);
            std::process::exit(1);
        }
    };

    let client = NwsClient::new(&config.nws_base_url, &config.nws_user_agent, config.http_timeout)
        .context("Failed to build upstream client")?;
    let cache = Arc::new(TtlCache::new(config.cache_ttl));
    tracing::info!(
        "weatherd {} ({}) starting: upstream {}, cache ttl {:?}",
        weatherd_core::VERSION,
        weatherd_core::COMMIT,
        client.base_url(),
        cache.default_ttl()
    );
    let resolver = ForecastResolver::new(
        client,
        cache,
        Bands {
            cold_max: config.cold_max,
            hot_min: config.hot_min,
        },
    );

    let request_timeout = request_deadline(config.http_timeout, &RetryPolicy::default());
    let abort = CancellationToken::new();
    let router = create_router(AppState::new(resolver, request_timeout, abort.clone()));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("listening on {}", addr);

    let shutdown = CancellationToken::new();
    let mut server = tokio::spawn(serve(listener, router, shutdown.clone()));

    tokio::select! {
        result = &mut server => {
            // Server exited on its own; nothing to drain.
            result.context("server task failed")?.context("server startup error")?;
            return Ok(());
        }
        _ = shutdown_signal() => {}
    }

    tracing::info!("initiating graceful shutdown...");
    shutdown.cancel();

    match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
        Ok(result) => {
            result.context("server task failed")?.context("server shutdown error")?;
        }
        Err(_) => {
            tracing::warn!(
                "requests still in flight after {:?}, cancelling them",
                SHUTDOWN_GRACE
            );
            abort.cancel();
            server.await.context("server task failed")?.context("server shutdown error")?;
        }
    }

    tracing::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
