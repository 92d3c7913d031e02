use axum::http::{header, HeaderMap, HeaderValue};
use cookie::Cookie;

use crate::backend::AuthSession;
use crate::config::PortalConfig;

pub const ACCESS_COOKIE: &str = "portal_access";
pub const REFRESH_COOKIE: &str = "portal_refresh";

/// The backend keeps refresh tokens alive until used; the cookie lifetime is ours.
const REFRESH_MAX_AGE_DAYS: i64 = 30;

/// Cookie attributes that depend on the deployment.
#[derive(Debug, Clone, Default)]
pub struct CookieSettings {
    pub secure: bool,
    pub domain: Option<String>,
}

impl From<&PortalConfig> for CookieSettings {
    fn from(config: &PortalConfig) -> Self {
        Self {
            secure: config.cookie_secure,
            domain: config.cookie_domain.clone(),
        }
    }
}

fn build_cookie(
    name: &'static str,
    value: &str,
    max_age_seconds: i64,
    settings: &CookieSettings,
) -> Option<HeaderValue> {
    let mut cookie = Cookie::build((name, value.to_string()))
        .http_only(true)
        .same_site(cookie::SameSite::Lax)
        .path("/")
        .max_age(cookie::time::Duration::seconds(max_age_seconds))
        .secure(settings.secure);

    if let Some(domain) = settings.domain.clone() {
        cookie = cookie.domain(domain);
    }

    match HeaderValue::from_str(&cookie.build().to_string()) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!(cookie = name, error = %e, "Cookie value is not a valid header");
            None
        }
    }
}

/// Set-Cookie header value for the access token.
pub fn build_access_cookie(
    token: &str,
    max_age_seconds: i64,
    settings: &CookieSettings,
) -> Option<HeaderValue> {
    build_cookie(ACCESS_COOKIE, token, max_age_seconds, settings)
}

/// Set-Cookie header value for the refresh token.
pub fn build_refresh_cookie(token: &str, settings: &CookieSettings) -> Option<HeaderValue> {
    build_cookie(
        REFRESH_COOKIE,
        token,
        REFRESH_MAX_AGE_DAYS * 86400,
        settings,
    )
}

/// Set both auth cookies from a fresh backend session.
pub fn set_auth_cookies(headers: &mut HeaderMap, session: &AuthSession, settings: &CookieSettings) {
    let cookies = [
        build_access_cookie(&session.access_token, session.expires_in, settings),
        build_refresh_cookie(&session.refresh_token, settings),
    ];
    for value in cookies.into_iter().flatten() {
        headers.append(header::SET_COOKIE, value);
    }
}

/// Clear both auth cookies on the response.
pub fn clear_auth_cookies(headers: &mut HeaderMap, settings: &CookieSettings) {
    for name in [ACCESS_COOKIE, REFRESH_COOKIE] {
        if let Some(value) = build_cookie(name, "", 0, settings) {
            headers.append(header::SET_COOKIE, value);
        }
    }
}

/// Extract the access token from cookies (preferred) or Bearer header (fallback).
pub fn extract_access_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_cookie(headers, ACCESS_COOKIE) {
        return Some(token);
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

pub fn extract_refresh_token(headers: &HeaderMap) -> Option<String> {
    extract_cookie(headers, REFRESH_COOKIE)
}

/// Parse a specific cookie value from the Cookie header.
fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for header_value in headers.get_all(header::COOKIE) {
        if let Ok(cookie_str) = header_value.to_str() {
            for piece in cookie_str.split(';') {
                if let Ok(c) = Cookie::parse(piece.trim().to_string()) {
                    if c.name() == name && !c.value().is_empty() {
                        return Some(c.value().to_string());
                    }
                }
            }
        }
    }
    None
}
