use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::json;
use validator::Validate;

use shared_types::{
    AppError, CompanySignupRequest, CompanySignupResponse, LoginRequest, LoginResponse,
    MeResponse, MessageResponse, PasswordResetRequest, Role,
};

use crate::auth::cookies::{self, CookieSettings};
use crate::auth::extractors::{Caller, MaybeSession, SessionRequired};
use crate::backend::{AccessToken, Conn};
use crate::repo::{companies, profiles};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// POST /api/auth/login
// ---------------------------------------------------------------------------

/// Sign in with email and password. Tokens are returned as cookies.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 400, description = "Invalid credentials", body = AppError),
        (status = 422, description = "Validation error", body = AppError)
    ),
    tag = "auth"
)]
#[tracing::instrument(skip(state, body), fields(email = %body.email))]
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<(HeaderMap, Json<LoginResponse>), AppError> {
    body.validate()?;
    let email = body.email.trim();

    let session = state.backend.sign_in(email, &body.password).await?;
    let token = AccessToken::new(session.access_token.clone());
    let conn = Conn::new(state.backend.as_ref(), &token);

    let role = match profiles::role_of(conn, &session.user.id).await {
        Ok(Some(role)) => role,
        Ok(None) => Role::from_email_domain(
            email,
            &state.config.professor_email_domain,
            &state.config.student_email_domain,
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Profile role unavailable at login, using email domain");
            Role::from_email_domain(
                email,
                &state.config.professor_email_domain,
                &state.config.student_email_domain,
            )
        }
    };

    let mut headers = HeaderMap::new();
    cookies::set_auth_cookies(
        &mut headers,
        &session,
        &CookieSettings::from(state.config.as_ref()),
    );

    tracing::info!(user_id = %session.user.id, role = %role, "Signed in");
    Ok((
        headers,
        Json(LoginResponse {
            user_id: session.user.id.clone(),
            email: session.user.email.clone(),
            role,
            home_path: role.home_path().to_string(),
        }),
    ))
}

// ---------------------------------------------------------------------------
// POST /api/auth/logout
// ---------------------------------------------------------------------------

/// Sign out (best effort) and clear the auth cookies.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Signed out", body = MessageResponse)
    ),
    tag = "auth"
)]
#[tracing::instrument(skip(state, session))]
pub async fn logout(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
) -> (HeaderMap, Json<MessageResponse>) {
    if let Some(session) = session {
        if let Err(e) = state.backend.sign_out(&session.token).await {
            tracing::warn!(user_id = %session.user_id, error = %e, "Sign-out failed, clearing cookies anyway");
        }
    }

    let mut headers = HeaderMap::new();
    cookies::clear_auth_cookies(&mut headers, &CookieSettings::from(state.config.as_ref()));
    (headers, Json(MessageResponse::new("Sesión cerrada")))
}

// ---------------------------------------------------------------------------
// POST /api/auth/password-reset
// ---------------------------------------------------------------------------

/// Email a password reset link that lands on the login page.
#[utoipa::path(
    post,
    path = "/api/auth/password-reset",
    request_body = PasswordResetRequest,
    responses(
        (status = 200, description = "Reset email sent", body = MessageResponse),
        (status = 422, description = "Validation error", body = AppError)
    ),
    tag = "auth"
)]
#[tracing::instrument(skip(state, body))]
pub async fn password_reset(
    State(state): State<AppState>,
    Json(body): Json<PasswordResetRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    body.validate()?;
    let redirect_to = format!("{}{}", state.config.app_base_url, shared_types::routes::LOGIN);
    state
        .backend
        .reset_password_email(body.email.trim(), &redirect_to)
        .await?;
    Ok(Json(MessageResponse::new(
        "Te enviamos un correo para restablecer tu contraseña.",
    )))
}

// ---------------------------------------------------------------------------
// POST /api/auth/company-signup
// ---------------------------------------------------------------------------

/// Register a company account and its company row.
///
/// Sign-up, profile update and company insert run in sequence without a
/// transaction. A failure after sign-up is reported as-is.
#[utoipa::path(
    post,
    path = "/api/auth/company-signup",
    request_body = CompanySignupRequest,
    responses(
        (status = 201, description = "Company registered", body = CompanySignupResponse),
        (status = 422, description = "Validation error", body = AppError)
    ),
    tag = "auth"
)]
#[tracing::instrument(skip(state, body), fields(email = %body.email))]
pub async fn company_signup(
    State(state): State<AppState>,
    Json(body): Json<CompanySignupRequest>,
) -> Result<(StatusCode, HeaderMap, Json<CompanySignupResponse>), AppError> {
    body.validate()?;
    let name = body.name.trim();
    let email = body.email.trim();

    let institutional = Role::from_email_domain(
        email,
        &state.config.professor_email_domain,
        &state.config.student_email_domain,
    );
    if institutional != Role::Company {
        return Err(AppError::invalid_field(
            "email",
            "Usa un correo corporativo, no institucional de UACJ.",
        ));
    }

    let signup = state
        .backend
        .sign_up(
            email,
            &body.password,
            json!({ "role": Role::Company.as_str(), "full_name": name }),
        )
        .await?;
    let user_id = signup.user.id.clone();

    // Without a session (email confirmation pending) the follow-up writes
    // need the service credential.
    let token = match (&signup.session, state.config.service_key.as_deref()) {
        (Some(session), _) => Some(AccessToken::new(session.access_token.clone())),
        (None, Some(service)) => Some(AccessToken::new(service)),
        (None, None) => None,
    };

    let mut company_id = None;
    match &token {
        Some(token) => {
            let conn = Conn::new(state.backend.as_ref(), token);
            if let Err(e) = profiles::set_role(conn, &user_id, Role::Company, Some(name)).await {
                tracing::error!(%user_id, error = %e, "Company signup: profile update failed");
                return Err(e);
            }
            match companies::create(conn, name, email, &user_id).await {
                Ok(company) => company_id = company.map(|c| c.id),
                Err(e) => {
                    tracing::error!(%user_id, error = %e, "Company signup: company insert failed");
                    return Err(e);
                }
            }
        }
        None => {
            tracing::warn!(%user_id, "Company signup awaiting confirmation, company row not created");
        }
    }

    let mut headers = HeaderMap::new();
    if let Some(session) = &signup.session {
        cookies::set_auth_cookies(
            &mut headers,
            session,
            &CookieSettings::from(state.config.as_ref()),
        );
    }

    tracing::info!(%user_id, ?company_id, "Company registered");
    Ok((
        StatusCode::CREATED,
        headers,
        Json(CompanySignupResponse {
            user_id,
            company_id,
            session_started: signup.session.is_some(),
        }),
    ))
}

// ---------------------------------------------------------------------------
// GET /api/auth/me
// ---------------------------------------------------------------------------

/// The signed-in user, role and profile.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = MeResponse),
        (status = 401, description = "No session", body = AppError)
    ),
    tag = "auth"
)]
#[tracing::instrument(skip(state, session))]
pub async fn me(
    State(state): State<AppState>,
    SessionRequired(session): SessionRequired,
) -> Result<Json<MeResponse>, AppError> {
    let caller = Caller::load(&state, session).await?;
    Ok(Json(MeResponse {
        user_id: caller.session.user_id.clone(),
        email: caller.session.email.clone(),
        role: caller.role,
        home_path: caller.role.home_path().to_string(),
        profile: caller.profile,
    }))
}
