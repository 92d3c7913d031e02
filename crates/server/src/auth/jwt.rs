use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Audience the backend stamps on user access tokens.
pub const AUDIENCE: &str = "authenticated";

/// Claims of a backend-issued access token. Only the fields we read are typed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Database role, `authenticated` for signed-in users.
    #[serde(default)]
    pub role: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub aud: Option<String>,
}

/// Why a token was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    Expired,
    Invalid,
}

/// Validate an HS256 access token against the project's JWT secret.
pub fn validate_access_token(token: &str, secret: &str) -> Result<BackendClaims, TokenRejection> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[AUDIENCE]);

    decode::<BackendClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenRejection::Expired,
            _ => TokenRejection::Invalid,
        })
}
