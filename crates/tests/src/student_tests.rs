use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::{
    delete, get, post_empty, post_json, put_empty, test_app, CLASSMATE, STUDENT,
};

fn ids(page: &Value) -> Vec<String> {
    page["data"]
        .as_array()
        .expect("page data")
        .iter()
        .map(|v| match &v["id"] {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect()
}

// ─── Search ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn search_lists_open_vacancies_of_the_program() {
    let (app, _backend) = test_app();

    let (status, page) = get(&app, "/api/student/vacancies", Some(STUDENT)).await;

    assert_eq!(status, StatusCode::OK, "{page}");
    // Full (2) and inactive (4) vacancies are left out; newest first.
    assert_eq!(ids(&page), vec!["3", "1"]);
    assert_eq!(page["page"], 0);
    assert_eq!(page["has_more"], false);
    assert!(page.get("stale").is_none());
    assert_eq!(page["data"][1]["company"]["name"], "Acme Software");
    assert_eq!(page["data"][1]["action"]["state"], "eligible_fresh");
}

#[tokio::test]
async fn superseded_search_comes_back_stale() {
    let (app, backend) = test_app();
    let gate = backend.hold_next_select("vacancies");

    let older = tokio::spawn({
        let app = app.clone();
        async move { get(&app, "/api/student/vacancies", Some(STUDENT)).await }
    });
    gate.entered.notified().await;

    let (status, newer) = get(&app, "/api/student/vacancies?q=rust", Some(STUDENT)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(newer.get("stale").is_none());

    gate.release.notify_one();
    let (status, older) = older.await.unwrap();
    assert_eq!(status, StatusCode::OK, "{older}");
    assert_eq!(older["stale"], true);
}

#[tokio::test]
async fn search_text_matches_title_and_company_name() {
    let (app, _backend) = test_app();

    let (_, by_title) = get(&app, "/api/student/vacancies?q=rust", Some(STUDENT)).await;
    assert_eq!(ids(&by_title), vec!["1"]);

    let (_, by_company) = get(&app, "/api/student/vacancies?q=maquila", Some(STUDENT)).await;
    assert_eq!(ids(&by_company), vec!["3"]);
}

#[tokio::test]
async fn search_filters_by_modality() {
    let (app, _backend) = test_app();

    let (_, page) = get(&app, "/api/student/vacancies?modality=Remota", Some(STUDENT)).await;

    assert_eq!(ids(&page), vec!["3"]);
}

#[tokio::test]
async fn pages_past_the_end_are_empty() {
    let (app, _backend) = test_app();

    let (status, page) = get(&app, "/api/student/vacancies?page=3", Some(STUDENT)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["page"], 3);
    assert!(ids(&page).is_empty());
}

// ─── Favorites and hidden ───────────────────────────────────────────────────

#[tokio::test]
async fn favorites_show_on_cards_and_overview() {
    let (app, backend) = test_app();

    let (status, _) = put_empty(&app, "/api/student/favorites/1", Some(STUDENT)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    // Saving twice is fine.
    let (status, _) = put_empty(&app, "/api/student/favorites/1", Some(STUDENT)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(backend.rows("vacancy_favorites").len(), 1);

    let (_, page) = get(&app, "/api/student/vacancies", Some(STUDENT)).await;
    let card = page["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["id"] == "1")
        .unwrap();
    assert_eq!(card["favorite"], true);

    let (_, overview) = get(&app, "/api/student/practices", Some(STUDENT)).await;
    assert_eq!(overview["favorites"][0]["title"], "Backend Rust");

    let (status, _) = delete(&app, "/api/student/favorites/1", Some(STUDENT)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(backend.rows("vacancy_favorites").is_empty());
}

#[tokio::test]
async fn hidden_vacancies_leave_search_and_favorites() {
    let (app, backend) = test_app();
    put_empty(&app, "/api/student/favorites/3", Some(STUDENT)).await;

    let (status, _) = put_empty(&app, "/api/student/hidden/3", Some(STUDENT)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, page) = get(&app, "/api/student/vacancies", Some(STUDENT)).await;
    assert_eq!(ids(&page), vec!["1"]);
    assert!(backend.rows("vacancy_favorites").is_empty());

    let (_, detail) = get(&app, "/api/student/vacancies/3", Some(STUDENT)).await;
    assert_eq!(detail["hidden"], true);

    delete(&app, "/api/student/hidden/3", Some(STUDENT)).await;
    let (_, page) = get(&app, "/api/student/vacancies", Some(STUDENT)).await;
    assert_eq!(ids(&page), vec!["3", "1"]);
}

#[tokio::test]
async fn hidden_list_is_per_student() {
    let (app, _backend) = test_app();
    put_empty(&app, "/api/student/hidden/3", Some(STUDENT)).await;

    let (_, page) = get(&app, "/api/student/vacancies", Some(CLASSMATE)).await;

    assert_eq!(ids(&page), vec!["3", "1"]);
}

// ─── Offers ─────────────────────────────────────────────────────────────────

fn seed_offer(backend: &crate::memory::MemoryBackend, id: i64, student: &str, vacancy: i64) {
    backend.seed(
        "applications",
        json!({
            "id": id, "student_id": student, "vacancy_id": vacancy, "status": "oferta",
            "applied_at": "2026-09-05T10:00:00Z"
        }),
    );
}

#[tokio::test]
async fn offers_are_listed_with_vacancy_and_company() {
    let (app, backend) = test_app();
    seed_offer(&backend, 60, "s1", 1);
    seed_offer(&backend, 61, "s2", 3);

    let (status, offers) = get(&app, "/api/student/offers", Some(STUDENT)).await;

    assert_eq!(status, StatusCode::OK);
    let offers = offers.as_array().unwrap();
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0]["id"], "60");
    assert_eq!(offers[0]["vacancy"]["company"]["name"], "Acme Software");
}

#[tokio::test]
async fn accepting_an_offer_starts_the_practice() {
    let (app, backend) = test_app();
    seed_offer(&backend, 60, "s1", 1);

    let (status, body) = post_empty(&app, "/api/student/offers/60/accept", Some(STUDENT)).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "¡Felicidades! Tu práctica comenzó.");
    let practices = backend.rows("practices");
    assert_eq!(practices.len(), 1);
    assert_eq!(practices[0]["student_id"], "s1");
    assert_eq!(practices[0]["status"], "active");

    let (_, overview) = get(&app, "/api/student/practices", Some(STUDENT)).await;
    assert_eq!(overview["active_practice"]["vacancy_id"], "1");
    assert_eq!(overview["active_practice"]["vacancy"]["title"], "Backend Rust");
}

#[tokio::test]
async fn someone_elses_offer_is_not_found() {
    let (app, backend) = test_app();
    seed_offer(&backend, 61, "s2", 3);

    let (status, _) = post_empty(&app, "/api/student/offers/61/accept", Some(STUDENT)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post_empty(&app, "/api/student/offers/61/decline", Some(STUDENT)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn a_plain_application_cannot_be_accepted() {
    let (app, backend) = test_app();
    backend.seed(
        "applications",
        json!({ "id": 62, "student_id": "s1", "vacancy_id": 1, "status": "postulada" }),
    );

    let (status, body) = post_empty(&app, "/api/student/offers/62/accept", Some(STUDENT)).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Esta oferta ya no está disponible.");
}

#[tokio::test]
async fn active_practice_blocks_accepting_another_offer() {
    let (app, backend) = test_app();
    backend.seed(
        "practices",
        json!({ "id": 80, "student_id": "s1", "vacancy_id": 3, "status": "active" }),
    );
    seed_offer(&backend, 60, "s1", 1);

    let (status, _) = post_empty(&app, "/api/student/offers/60/accept", Some(STUDENT)).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn declining_records_the_decision() {
    let (app, backend) = test_app();
    seed_offer(&backend, 60, "s1", 1);

    let (status, body) = post_empty(&app, "/api/student/offers/60/decline", Some(STUDENT)).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "rechazada");
    assert_eq!(body["decision"], "declined");
    let row = backend.rows("applications").remove(0);
    assert_eq!(row["status"], "rechazada");
}

// ─── Practices ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn overview_splits_open_completed_and_rejected() {
    let (app, backend) = test_app();
    backend.seed(
        "applications",
        json!([
            { "id": 63, "student_id": "s1", "vacancy_id": 1, "status": "postulada", "applied_at": "2026-09-06T10:00:00Z" },
            { "id": 64, "student_id": "s1", "vacancy_id": 3, "status": "completada", "applied_at": "2026-08-06T10:00:00Z" },
            { "id": 65, "student_id": "s1", "vacancy_id": 2, "status": "rechazada", "applied_at": "2026-09-01T10:00:00Z" },
        ]),
    );

    let (status, overview) = get(&app, "/api/student/practices", Some(STUDENT)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(overview["applied"].as_array().unwrap().len(), 1);
    assert_eq!(overview["applied"][0]["id"], "63");
    assert_eq!(overview["completed"][0]["id"], "64");
    assert!(overview["active_practice"].is_null());
    assert_eq!(overview["profile"]["full_name"], "Ana López");
}

#[tokio::test]
async fn completing_needs_a_rating_between_one_and_five() {
    let (app, backend) = test_app();
    backend.seed(
        "practices",
        json!({ "id": 80, "student_id": "s1", "vacancy_id": 3, "status": "active" }),
    );

    let (status, _) = post_json(&app, "/api/student/practices/complete", r#"{"rating": 9}"#, Some(STUDENT)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(backend.rows("practices")[0]["status"], "active");

    let (status, body) = post_json(&app, "/api/student/practices/complete", r#"{"rating": 4}"#, Some(STUDENT)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let practice = backend.rows("practices").remove(0);
    assert_eq!(practice["status"], "completed");
    assert_eq!(practice["rating"], 4);
}

#[tokio::test]
async fn practice_status_reports_the_active_vacancy() {
    let (app, backend) = test_app();
    backend.seed(
        "practices",
        json!({ "id": 80, "student_id": "s1", "vacancy_id": 3, "status": "active" }),
    );

    let (status, state) = get(&app, "/api/student/practice-status", Some(STUDENT)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["has_active_practice"], true);
    assert_eq!(state["vacancy_id"], "3");
    assert_eq!(state["loading"], false);
}

// ─── Notifications ──────────────────────────────────────────────────────────

#[tokio::test]
async fn notification_feed_counts_unread() {
    let (app, _backend) = test_app();

    let (status, feed) = get(&app, "/api/notifications", Some(STUDENT)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(feed["unread_count"], 1);
    let titles: Vec<&str> = feed["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Nueva oferta", "Te recomendaron una vacante"]);
}

#[tokio::test]
async fn marking_read_clears_only_own_notifications() {
    let (app, backend) = test_app();

    let (status, _) = post_empty(&app, "/api/notifications/read", Some(STUDENT)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, feed) = get(&app, "/api/notifications", Some(STUDENT)).await;
    assert_eq!(feed["unread_count"], 0);

    let others_unread = backend
        .rows("notifications")
        .iter()
        .filter(|n| n["student_id"] == "s2" && n["read_at"].is_null())
        .count();
    assert_eq!(others_unread, 1);
}
