use std::sync::Arc;

use server::backend::rest::RestBackend;
use server::config::{load_feature_flags, PortalConfig};
use server::state::AppState;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    server::telemetry::init_tracing();

    let flags = load_feature_flags().clone();
    if flags.telemetry {
        if let Err(e) = server::telemetry::init_telemetry() {
            tracing::warn!(error = %e, "OTLP telemetry disabled");
        }
    }
    server::health::record_start_time();

    let config = match PortalConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };
    let port = config.port;

    let backend = match RestBackend::new(&config) {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            tracing::error!(error = %e, "Backend client could not be built");
            std::process::exit(1);
        }
    };

    let state = AppState::new(backend, config, flags);
    let _listener = state.practices.spawn_listener(&state.feed);
    let app = server::build_router(state);

    let listener = match tokio::net::TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(port, error = %e, "Could not bind");
            std::process::exit(1);
        }
    };
    tracing::info!(port, "Portal server listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Could not listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutting down");
}
