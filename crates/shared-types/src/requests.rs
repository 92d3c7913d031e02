use serde::{Deserialize, Serialize};

#[cfg(feature = "validation")]
use validator::Validate;

use crate::models::{Profile, Role};

/// Email + password sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct LoginRequest {
    #[cfg_attr(
        feature = "validation",
        validate(email(message = "Escribe un correo válido"))
    )]
    pub email: String,
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 1, message = "Escribe tu contraseña"))
    )]
    pub password: String,
}

/// Result of a successful login. Tokens travel as cookies, never in the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LoginResponse {
    pub user_id: String,
    pub email: Option<String>,
    pub role: Role,
    pub home_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct PasswordResetRequest {
    #[cfg_attr(
        feature = "validation",
        validate(email(message = "Escribe tu correo para enviarte el enlace de recuperación."))
    )]
    pub email: String,
}

/// Self-service company registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct CompanySignupRequest {
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 2, message = "El nombre de la empresa debe tener al menos 2 caracteres"))
    )]
    pub name: String,
    #[cfg_attr(
        feature = "validation",
        validate(email(message = "Escribe un correo válido"))
    )]
    pub email: String,
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 6, message = "La contraseña debe tener al menos 6 caracteres"))
    )]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CompanySignupResponse {
    pub user_id: String,
    pub company_id: Option<String>,
    /// False when the backend requires email confirmation before sign-in.
    pub session_started: bool,
}

/// The signed-in user as seen by the portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MeResponse {
    pub user_id: String,
    pub email: Option<String>,
    pub role: Role,
    pub home_path: String,
    pub profile: Option<Profile>,
}
