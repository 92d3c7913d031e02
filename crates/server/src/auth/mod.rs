pub mod cookies;
pub mod extractors;
pub mod guard;
pub mod jwt;
pub mod middleware;

use shared_types::Role;

use crate::backend::{AccessToken, Conn};
use crate::state::AppState;

/// The signed-in user behind a request, inserted into request extensions
/// by [`middleware::auth_middleware`].
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub email: Option<String>,
    pub token: AccessToken,
}

impl Session {
    pub fn conn<'a>(&'a self, state: &'a AppState) -> Conn<'a> {
        Conn::new(state.backend.as_ref(), &self.token)
    }
}

/// Portal role from `profiles.role`. A missing profile, a missing role or a
/// failed lookup all read as student.
pub async fn resolve_role(state: &AppState, session: &Session) -> Role {
    match crate::repo::profiles::role_of(session.conn(state), &session.user_id).await {
        Ok(Some(role)) => role,
        Ok(None) => Role::Student,
        Err(e) => {
            tracing::warn!(user_id = %session.user_id, error = %e, "Role lookup failed, assuming student");
            Role::Student
        }
    }
}
