//! tubarr server binary
//!
//! Loads `.env` and configuration, then runs the REST API and the
//! background source poller until SIGTERM or SIGINT.
//!
//! - Swagger UI: `http://localhost:8000/api/v1/swagger-ui`
//! - Events stream: `http://localhost:8000/api/v1/events`

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tubarr::{Config, Tubarr};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tubarr=info,tower_http=info")),
        )
        .init();

    let config = Config::load()?;
    tracing::info!(config = ?config.redacted(), "configuration loaded");

    let app = Tubarr::new(config).await?;
    let poller = app.start_update_checker();

    let stop_server = CancellationToken::new();
    let server = app.config().web.enabled.then(|| {
        let stop = stop_server.clone();
        tokio::spawn(tubarr::api::start_api_server(app.clone(), async move {
            stop.cancelled().await;
        }))
    });
    if server.is_none() {
        tracing::info!("REST API disabled");
    }

    tubarr::run_with_shutdown(app).await?;
    stop_server.cancel();

    if let Some(server) = server {
        match server.await {
            Ok(Err(e)) => tracing::error!(error = %e, "API server failed"),
            Err(e) => tracing::error!(error = %e, "API server task panicked"),
            Ok(Ok(())) => {}
        }
    }
    poller.await.ok();
    Ok(())
}
