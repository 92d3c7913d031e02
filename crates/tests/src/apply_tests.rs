use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::{get, post_empty, post_json, test_app, STUDENT};

fn applications_for(backend: &crate::memory::MemoryBackend, student: &str) -> usize {
    backend
        .rows("applications")
        .iter()
        .filter(|r| r["student_id"] == json!(student))
        .count()
}

#[tokio::test]
async fn apply_creates_one_application() {
    let (app, backend) = test_app();

    let (status, body) = post_empty(&app, "/api/student/vacancies/1/apply", Some(STUDENT)).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["outcome"], "applied");
    assert_eq!(body["message"], "¡Listo! Tu postulación fue enviada.");
    assert_eq!(body["action"]["state"], "already_applied");
    assert_eq!(body["action"]["enabled"], false);
    assert_eq!(applications_for(&backend, "s1"), 1);

    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "apply_and_notify_v2");
    assert_eq!(calls[0].1, json!({ "p_vacancy_id": 1 }));
}

#[tokio::test]
async fn applying_twice_reports_already_applied() {
    let (app, backend) = test_app();

    let (first, _) = post_empty(&app, "/api/student/vacancies/1/apply", Some(STUDENT)).await;
    assert_eq!(first, StatusCode::OK);

    let (status, body) = post_empty(&app, "/api/student/vacancies/1/apply", Some(STUDENT)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["outcome"], "already_applied");
    assert_eq!(body["message"], "Ya te habías postulado a esta vacante.");
    assert_eq!(applications_for(&backend, "s1"), 1);
}

#[tokio::test]
async fn duplicate_from_backend_is_an_outcome_not_an_error() {
    let (app, backend) = test_app();
    // Row exists but under a status the eligibility check does not count as open.
    backend.seed(
        "applications",
        json!({ "id": 70, "student_id": "s1", "vacancy_id": 3, "status": "retirada" }),
    );

    let (status, body) = post_empty(&app, "/api/student/vacancies/3/apply", Some(STUDENT)).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["outcome"], "already_applied");
    assert_eq!(applications_for(&backend, "s1"), 1);
}

#[tokio::test]
async fn full_vacancy_is_refused_without_calling_the_backend() {
    let (app, backend) = test_app();

    let (status, body) = post_empty(&app, "/api/student/vacancies/2/apply", Some(STUDENT)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "not_allowed");
    assert_eq!(body["message"], "Esta vacante ya no tiene cupos disponibles.");
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn active_practice_blocks_other_vacancies() {
    let (app, backend) = test_app();
    backend.seed(
        "practices",
        json!({ "id": 80, "student_id": "s1", "vacancy_id": 3, "status": "active" }),
    );

    let (status, body) = post_empty(&app, "/api/student/vacancies/1/apply", Some(STUDENT)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "not_allowed");
    assert_eq!(body["action"]["state"], "blocked_by_active_practice");
    assert_eq!(applications_for(&backend, "s1"), 0);
}

#[tokio::test]
async fn reapply_after_completed_application_needs_confirmation() {
    let (app, backend) = test_app();
    backend.seed(
        "applications",
        json!({ "id": 71, "student_id": "s1", "vacancy_id": 1, "status": "completada" }),
    );

    let (status, body) = post_empty(&app, "/api/student/vacancies/1/apply", Some(STUDENT)).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert_eq!(body["kind"], "Conflict");
    assert_eq!(applications_for(&backend, "s1"), 1);

    let (status, body) = post_json(
        &app,
        "/api/student/vacancies/1/apply",
        r#"{"confirm_reapply": true}"#,
        Some(STUDENT),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["outcome"], "applied");
    assert_eq!(applications_for(&backend, "s1"), 2);
}

#[tokio::test]
async fn unknown_vacancy_is_not_found() {
    let (app, _backend) = test_app();

    let (status, body) = post_empty(&app, "/api/student/vacancies/999/apply", Some(STUDENT)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No se encontró la vacante.");
}

#[tokio::test]
async fn detail_reflects_the_new_application() {
    let (app, _backend) = test_app();
    post_empty(&app, "/api/student/vacancies/1/apply", Some(STUDENT)).await;

    let (status, body) = get(&app, "/api/student/vacancies/1", Some(STUDENT)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["application_status"], "postulada");
    assert_eq!(body["action"]["state"], "already_applied");
    assert_eq!(body["vacancy"]["company"]["name"], "Acme Software");
}
