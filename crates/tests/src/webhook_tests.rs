use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use pretty_assertions::assert_eq;
use serde_json::json;
use server::realtime::{self, ChangeKind, SIGNATURE_HEADER};

use crate::common::{get, raw, test_app_with_state, STUDENT, WEBHOOK_SECRET};

fn hook(body: &str, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/hooks/db-change")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn practice_insert() -> String {
    json!({
        "type": "INSERT",
        "table": "practices",
        "schema": "public",
        "record": { "student_id": "s1", "vacancy_id": 3, "status": "active" },
        "old_record": null
    })
    .to_string()
}

#[tokio::test]
async fn signed_event_is_accepted_and_fanned_out() {
    let (app, _backend, state) = test_app_with_state();
    let mut rx = state.feed.subscribe();
    let body = practice_insert();
    let signature = realtime::sign(WEBHOOK_SECRET, body.as_bytes());

    let response = raw(&app, hook(&body, Some(signature))).await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let event = rx.try_recv().expect("event published");
    assert_eq!(event.kind, ChangeKind::Insert);
    assert_eq!(event.table, "practices");
    assert!(event.concerns_student("s1"));
}

#[tokio::test]
async fn prefixed_signature_is_accepted() {
    let (app, _backend, _state) = test_app_with_state();
    let body = practice_insert();
    let signature = format!("sha256={}", realtime::sign(WEBHOOK_SECRET, body.as_bytes()));

    let response = raw(&app, hook(&body, Some(signature))).await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn bad_or_missing_signature_is_rejected() {
    let (app, _backend, state) = test_app_with_state();
    let mut rx = state.feed.subscribe();
    let body = practice_insert();

    let wrong = realtime::sign("not-the-secret", body.as_bytes());
    let response = raw(&app, hook(&body, Some(wrong))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = raw(&app, hook(&body, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert!(rx.try_recv().is_err(), "nothing should be published");
}

#[tokio::test]
async fn malformed_event_is_bad_request() {
    let (app, _backend, _state) = test_app_with_state();
    let body = r#"{"table": "practices"}"#;
    let signature = realtime::sign(WEBHOOK_SECRET, body.as_bytes());

    let response = raw(&app, hook(body, Some(signature))).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn practice_event_invalidates_cached_state() {
    let (app, backend, state) = test_app_with_state();
    let _listener = state.practices.spawn_listener(&state.feed);

    let (_, before) = get(&app, "/api/student/practice-status", Some(STUDENT)).await;
    assert_eq!(before["has_active_practice"], false);

    backend.seed(
        "practices",
        json!({ "id": 90, "student_id": "s1", "vacancy_id": 3, "status": "active" }),
    );
    let body = practice_insert();
    let signature = realtime::sign(WEBHOOK_SECRET, body.as_bytes());
    let response = raw(&app, hook(&body, Some(signature))).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    // The listener runs on its own task; give it a moment to mark the entry stale.
    let mut after = serde_json::Value::Null;
    for _ in 0..50 {
        let (_, state) = get(&app, "/api/student/practice-status", Some(STUDENT)).await;
        if state["has_active_practice"] == true {
            after = state;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(after["has_active_practice"], true);
    assert_eq!(after["vacancy_id"], "3");
}
