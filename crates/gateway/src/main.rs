use arena_gateway::config::{GatewayConfig, StartupError};
use arena_gateway::http;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(err) = run().await {
        eprintln!("STARTUP_ERROR {}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    let config = GatewayConfig::load()?;
    let app = http::router(config.clone()).await?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .map_err(|err| StartupError {
            code: "ERR_BIND_FAILED",
            message: format!("failed to bind {}: {}", config.bind_addr, err),
        })?;

    tracing::info!(
        bind_addr = %config.bind_addr,
        organization_id = config.organization_id,
        snapshot = %config.snapshot_path.display(),
        auth_mode = ?config.auth_mode,
        "arena-gateway listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| StartupError {
            code: "ERR_SERVER_FAILED",
            message: err.to_string(),
        })
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("arena-gateway shutting down"),
        Err(err) => {
            tracing::warn!(error = %err, "arena-gateway signal handler unavailable");
            std::future::pending::<()>().await;
        }
    }
}
