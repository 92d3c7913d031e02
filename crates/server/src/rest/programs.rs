use axum::{extract::State, Json};

use shared_types::{AppError, Program};

use crate::auth::extractors::MaybeSession;
use crate::backend::{AccessToken, Conn};
use crate::repo::programs;
use crate::state::AppState;

/// Academic programs for profile and vacancy forms. Public: the signup
/// pages need the list before anyone has a session.
#[utoipa::path(
    get,
    path = "/api/programs",
    responses(
        (status = 200, description = "All programs", body = Vec<Program>)
    ),
    tag = "programs"
)]
#[tracing::instrument(skip(state, session))]
pub async fn list_programs(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
) -> Result<Json<Vec<Program>>, AppError> {
    let anon = AccessToken::new(state.config.anon_key.clone());
    let conn = match &session {
        Some(session) => session.conn(&state),
        None => Conn::new(state.backend.as_ref(), &anon),
    };
    let rows = programs::list(conn).await?;
    Ok(Json(rows))
}
