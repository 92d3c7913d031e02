use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::{get, post_json, raw, test_app, COMPANY, PROFESSOR, STUDENT};

fn location(response: &axum::http::Response<Body>) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

async fn page(app: &axum::Router, path: &str, token: Option<&str>) -> axum::http::Response<Body> {
    let mut builder = Request::builder().method("GET").uri(path);
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("portal_access={token}"));
    }
    raw(app, builder.body(Body::empty()).unwrap()).await
}

// ─── Route guard ────────────────────────────────────────────────────────────

#[tokio::test]
async fn anonymous_private_page_redirects_to_login() {
    let (app, _backend) = test_app();

    let response = page(&app, "/alumno/buscar", None).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), Some("/login"));
}

#[tokio::test]
async fn signed_in_login_page_goes_to_role_home() {
    let (app, _backend) = test_app();

    let professor = page(&app, "/login", Some(PROFESSOR)).await;
    assert_eq!(professor.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&professor), Some("/docente/grupos"));

    let company = page(&app, "/empresa/signup", Some(COMPANY)).await;
    assert_eq!(location(&company), Some("/empresa/vacantes"));
}

#[tokio::test]
async fn legacy_students_path_redirects() {
    let (app, _backend) = test_app();

    for token in [None, Some(STUDENT)] {
        let response = page(&app, "/estudiantes", token).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&response), Some("/alumno/buscar"));
    }
}

#[tokio::test]
async fn unknown_token_counts_as_anonymous() {
    let (app, _backend) = test_app();

    let response = page(&app, "/docente/grupos", Some("token-expired")).await;

    assert_eq!(location(&response), Some("/login"));
}

// ─── API access ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn api_without_session_is_unauthorized() {
    let (app, _backend) = test_app();

    let (status, body) = get(&app, "/api/student/vacancies", None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "Unauthorized");
}

#[tokio::test]
async fn api_with_wrong_role_is_forbidden() {
    let (app, _backend) = test_app();

    let (status, _) = get(&app, "/api/student/vacancies", Some(PROFESSOR)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = get(&app, "/api/company/vacancies", Some(STUDENT)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = get(&app, "/api/professor/groups", Some(COMPANY)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn bearer_header_is_accepted() {
    let (app, _backend) = test_app();
    let req = Request::builder()
        .method("GET")
        .uri("/api/auth/me")
        .header(header::AUTHORIZATION, format!("Bearer {STUDENT}"))
        .body(Body::empty())
        .unwrap();

    let response = raw(&app, req).await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn public_endpoints_need_no_session() {
    let (app, _backend) = test_app();

    let (status, body) = get(&app, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["backend"], "connected");

    let (status, body) = get(&app, "/api/programs", None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Diseño Gráfico", "Ingeniería en Sistemas Computacionales"]);
}

// ─── Login and session ──────────────────────────────────────────────────────

#[tokio::test]
async fn login_sets_cookies_and_reports_home() {
    let (app, _backend) = test_app();
    let req = Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "email": "carla@uacj.mx", "password": "secreto123" }).to_string(),
        ))
        .unwrap();

    let response = raw(&app, req).await;

    assert_eq!(response.status(), StatusCode::OK);
    let cookies: Vec<&str> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    assert!(cookies.iter().any(|c| c.starts_with("portal_access=token-p1")), "{cookies:?}");
    assert!(cookies.iter().any(|c| c.starts_with("portal_refresh=")), "{cookies:?}");

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["role"], "professor");
    assert_eq!(body["home_path"], "/docente/grupos");
}

#[tokio::test]
async fn login_with_bad_password_passes_backend_message() {
    let (app, _backend) = test_app();

    let (status, body) = post_json(
        &app,
        "/api/auth/login",
        r#"{"email": "ana@alumnos.uacj.mx", "password": "incorrecta"}"#,
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid login credentials");
}

#[tokio::test]
async fn expired_access_cookie_is_refreshed() {
    let (app, _backend) = test_app();
    let req = Request::builder()
        .method("GET")
        .uri("/api/auth/me")
        .header(
            header::COOKIE,
            format!("portal_access=stale; portal_refresh=refresh-{STUDENT}"),
        )
        .body(Body::empty())
        .unwrap();

    let response = raw(&app, req).await;

    assert_eq!(response.status(), StatusCode::OK);
    let refreshed = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|c| c.starts_with(&format!("portal_access={STUDENT}")));
    assert!(refreshed);
}

#[tokio::test]
async fn me_returns_profile_and_role() {
    let (app, _backend) = test_app();

    let (status, body) = get(&app, "/api/auth/me", Some(STUDENT)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], "s1");
    assert_eq!(body["role"], "student");
    assert_eq!(body["home_path"], "/alumno/buscar");
    assert_eq!(body["profile"]["full_name"], "Ana López");
}

// ─── Company sign-up ────────────────────────────────────────────────────────

#[tokio::test]
async fn company_signup_rejects_institutional_email() {
    let (app, backend) = test_app();

    let (status, body) = post_json(
        &app,
        "/api/auth/company-signup",
        r#"{"name": "Acme", "email": "rh@alumnos.uacj.mx", "password": "secreto123"}"#,
        None,
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
    assert!(body["field_errors"]["email"].is_string());
    assert_eq!(backend.rows("companies").len(), 2);
}

#[tokio::test]
async fn company_signup_creates_company_row() {
    let (app, backend) = test_app();

    let (status, body) = post_json(
        &app,
        "/api/auth/company-signup",
        r#"{"name": "  Nueva Empresa ", "email": "contacto@nueva.mx", "password": "secreto123"}"#,
        None,
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["session_started"], true);
    assert!(body["company_id"].is_string());

    let companies = backend.rows("companies");
    let created = companies
        .iter()
        .find(|c| c["email"] == "contacto@nueva.mx")
        .expect("company row");
    assert_eq!(created["name"], "Nueva Empresa");
    assert_eq!(created["owner_id"], body["user_id"]);

    let profile = backend
        .rows("profiles")
        .into_iter()
        .find(|p| p["id"] == body["user_id"])
        .expect("profile row");
    assert_eq!(profile["role"], "company");
}
