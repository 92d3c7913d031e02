//! Page-level route guard.
//!
//! This only steers browsers to the right page. Every API action still
//! checks the caller through the role extractors, and the backend applies
//! its own row-level policies.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use shared_types::routes;

use super::Session;
use crate::state::AppState;

const ASSET_EXTENSIONS: &[&str] = &[
    ".svg", ".png", ".jpg", ".jpeg", ".gif", ".webp", ".ico", ".css", ".js",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionView {
    Anonymous,
    SignedIn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Pass,
    Redirect(String),
    /// Redirect to the caller's role home. The role is looked up only then.
    RedirectHome,
}

pub fn is_asset(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    ASSET_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/') || rest.starts_with('?'))
}

pub fn is_public(path: &str) -> bool {
    path == "/" || routes::PUBLIC_PREFIXES.iter().any(|p| matches_prefix(path, p))
}

pub fn decide(path: &str, session: SessionView) -> GuardDecision {
    if path == routes::LEGACY_STUDENTS {
        return GuardDecision::Redirect(routes::STUDENT_HOME.to_string());
    }

    if is_public(path) {
        let on_auth_page = routes::AUTH_PAGES.iter().any(|p| matches_prefix(path, p));
        if on_auth_page && session == SessionView::SignedIn {
            return GuardDecision::RedirectHome;
        }
        return GuardDecision::Pass;
    }

    match session {
        SessionView::Anonymous => GuardDecision::Redirect(routes::LOGIN.to_string()),
        SessionView::SignedIn => GuardDecision::Pass,
    }
}

/// Applies [`decide`] to every non-asset request. Runs inside the auth
/// middleware so the session is already resolved.
pub async fn route_guard(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    if is_asset(&path) {
        return next.run(req).await;
    }

    let session = req.extensions().get::<Session>().cloned();
    let view = if session.is_some() {
        SessionView::SignedIn
    } else {
        SessionView::Anonymous
    };

    match decide(&path, view) {
        GuardDecision::Pass => next.run(req).await,
        GuardDecision::Redirect(to) => {
            tracing::debug!(%path, %to, "Guard redirect");
            Redirect::temporary(&to).into_response()
        }
        GuardDecision::RedirectHome => {
            let role = match session {
                Some(session) => super::resolve_role(&state, &session).await,
                None => Default::default(),
            };
            Redirect::temporary(role.home_path()).into_response()
        }
    }
}
