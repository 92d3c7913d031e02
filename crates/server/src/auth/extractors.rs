use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use shared_types::{AppError, Profile, Role};

use super::Session;
use crate::backend::Conn;
use crate::state::AppState;

/// Extractor that requires a session. Returns 401 without one.
pub struct SessionRequired(pub Session);

impl<S: Send + Sync> FromRequestParts<S> for SessionRequired {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .map(SessionRequired)
            .ok_or_else(|| AppError::unauthorized("Inicia sesión para continuar."))
    }
}

/// Extractor that optionally extracts the session. Never fails.
pub struct MaybeSession(pub Option<Session>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeSession {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeSession(parts.extensions.get::<Session>().cloned()))
    }
}

/// A session together with the caller's profile row.
#[derive(Debug, Clone)]
pub struct Caller {
    pub session: Session,
    pub profile: Option<Profile>,
    pub role: Role,
}

impl Caller {
    pub async fn load(state: &AppState, session: Session) -> Result<Self, AppError> {
        let profile = crate::repo::profiles::find(session.conn(state), &session.user_id).await?;
        let role = profile.as_ref().map(Profile::role).unwrap_or_default();
        Ok(Self {
            session,
            profile,
            role,
        })
    }

    pub fn id(&self) -> &str {
        &self.session.user_id
    }

    pub fn conn<'a>(&'a self, state: &'a AppState) -> Conn<'a> {
        self.session.conn(state)
    }

    pub fn program_id(&self) -> Option<&str> {
        self.profile
            .as_ref()
            .and_then(|p| p.program_id.as_deref())
            .filter(|p| !p.is_empty())
    }
}

pub const STUDENT: u8 = 0;
pub const PROFESSOR: u8 = 1;
pub const COMPANY: u8 = 2;

/// Extractor that requires a session AND a specific portal role.
/// Returns 401 if unauthenticated, 403 if the profile role differs.
///
/// Role constants:
/// - 0 = Student (also the role of users without a profile)
/// - 1 = Professor
/// - 2 = Company
pub struct RoleRequired<const ROLE: u8>(pub Caller);

pub type StudentCaller = RoleRequired<STUDENT>;
pub type ProfessorCaller = RoleRequired<PROFESSOR>;
pub type CompanyCaller = RoleRequired<COMPANY>;

fn required_role(role: u8) -> Role {
    match role {
        PROFESSOR => Role::Professor,
        COMPANY => Role::Company,
        _ => Role::Student,
    }
}

impl<const ROLE: u8, S> FromRequestParts<S> for RoleRequired<ROLE>
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::unauthorized("Inicia sesión para continuar."))?;

        let app = AppState::from_ref(state);
        let caller = Caller::load(&app, session).await?;

        let required = required_role(ROLE);
        if caller.role != required {
            return Err(AppError::forbidden(format!(
                "Esta sección es solo para el rol {}",
                required.as_str()
            )));
        }

        Ok(RoleRequired(caller))
    }
}
