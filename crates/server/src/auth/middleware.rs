use axum::extract::{Request, State};
use axum::http::header::SET_COOKIE;
use axum::middleware::Next;
use axum::response::Response;

use super::cookies::{self, CookieSettings};
use super::jwt::{self, TokenRejection};
use super::Session;
use crate::backend::{AccessToken, AuthSession};
use crate::state::AppState;

/// Outcome of checking the presented access token.
enum Verified {
    Valid(Session),
    /// Missing, expired or rejected: worth trying the refresh cookie.
    NeedsRefresh,
    /// The backend could not be asked. Treated as anonymous without refreshing.
    Unknown,
}

/// Permissive auth middleware.
///
/// On each request:
/// 1. Validates the access token from cookies (or Bearer header fallback),
///    locally when the JWT secret is configured, otherwise with the backend
/// 2. If missing or expired, attempts a transparent refresh with the refresh cookie
/// 3. Inserts the resulting [`Session`] into request extensions
/// 4. Writes refreshed (or cleared) cookies onto the response
///
/// Does NOT reject unauthenticated requests. The route guard and the
/// extractors decide what a missing session means.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let access_token = cookies::extract_access_token(req.headers());
    let refresh_token = cookies::extract_refresh_token(req.headers());
    let settings = CookieSettings::from(state.config.as_ref());

    let verified = match access_token {
        Some(token) => verify(&state, token).await,
        None => Verified::NeedsRefresh,
    };

    let mut refreshed: Option<AuthSession> = None;
    let mut clear = false;

    match verified {
        Verified::Valid(session) => {
            req.extensions_mut().insert(session);
        }
        Verified::NeedsRefresh => {
            if let Some(refresh_token) = refresh_token {
                match state.backend.refresh(&refresh_token).await {
                    Ok(new_session) => {
                        req.extensions_mut().insert(Session {
                            user_id: new_session.user.id.clone(),
                            email: new_session.user.email.clone(),
                            token: AccessToken::new(new_session.access_token.clone()),
                        });
                        refreshed = Some(new_session);
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "Session refresh failed");
                        clear = e.status == 400 || e.status == 401;
                    }
                }
            }
        }
        Verified::Unknown => {}
    }

    let mut response = next.run(req).await;

    // Handlers that write auth cookies themselves (login, logout) win.
    if handler_set_cookies(&response) {
        return response;
    }

    if let Some(session) = refreshed {
        cookies::set_auth_cookies(response.headers_mut(), &session, &settings);
    } else if clear {
        cookies::clear_auth_cookies(response.headers_mut(), &settings);
    }

    response
}

fn handler_set_cookies(response: &Response) -> bool {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(cookies::ACCESS_COOKIE))
}

async fn verify(state: &AppState, token: String) -> Verified {
    if let Some(secret) = state.config.jwt_secret.as_deref() {
        return match jwt::validate_access_token(&token, secret) {
            Ok(claims) => Verified::Valid(Session {
                user_id: claims.sub,
                email: claims.email,
                token: AccessToken::new(token),
            }),
            Err(TokenRejection::Expired) | Err(TokenRejection::Invalid) => Verified::NeedsRefresh,
        };
    }

    let token = AccessToken::new(token);
    match state.backend.get_user(&token).await {
        Ok(Some(user)) => Verified::Valid(Session {
            user_id: user.id,
            email: user.email,
            token,
        }),
        Ok(None) => Verified::NeedsRefresh,
        Err(e) => {
            tracing::warn!(error = %e, "Could not verify session with backend");
            Verified::Unknown
        }
    }
}
