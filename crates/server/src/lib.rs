pub mod config;

pub mod auth;
pub mod backend;
pub mod health;
pub mod openapi;
pub mod practice_store;
pub mod realtime;
pub mod repo;
pub mod rest;
pub mod state;
pub mod storage;
pub mod telemetry;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::state::AppState;

/// Assemble the full application: API, hooks, health, docs and static pages,
/// behind the auth middleware and the route guard.
pub fn build_router(state: AppState) -> Router {
    let flags = state.flags.clone();

    let mut router = rest::api_router().route("/health", get(health::health_check));

    if flags.change_webhook {
        router = router.route("/hooks/db-change", post(realtime::db_change));
    }

    if flags.static_site {
        match state.config.static_dir.as_deref() {
            Some(dir) => router = router.fallback_service(ServeDir::new(dir)),
            None => tracing::warn!("static_site is on but STATIC_DIR is not set"),
        }
    }

    if flags.telemetry {
        router = router.layer(telemetry::OtelTraceLayer);
    }

    // The guard reads the session the auth middleware attaches, so auth wraps it.
    let mut router = router
        .layer(from_fn_with_state(state.clone(), auth::guard::route_guard))
        .layer(from_fn_with_state(state.clone(), auth::middleware::auth_middleware))
        .with_state(state);

    if flags.docs {
        router = router.merge(Scalar::with_url("/docs", openapi::ApiDoc::openapi()));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}
