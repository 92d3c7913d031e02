use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::{delete, get, patch_json, post_json, test_app, PROFESSOR};

fn names(body: &Value, key: &str) -> Vec<String> {
    body.as_array()
        .expect("array body")
        .iter()
        .map(|row| row[key].as_str().unwrap_or_default().to_string())
        .collect()
}

// ─── Groups ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn groups_are_listed_by_name_for_their_owner() {
    let (app, _backend) = test_app();
    post_json(&app, "/api/professor/groups", r#"{"name": "Estancias 2027-1"}"#, Some(PROFESSOR)).await;

    let (status, body) = get(&app, "/api/professor/groups", Some(PROFESSOR)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&body, "name"), vec!["Estancias 2027-1", "Prácticas 2026-2"]);
}

#[tokio::test]
async fn create_group_fills_default_color() {
    let (app, backend) = test_app();

    let (status, body) = post_json(
        &app,
        "/api/professor/groups",
        r#"{"name": " Matutino ", "term": "2026-2"}"#,
        Some(PROFESSOR),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["name"], "Matutino");
    assert_eq!(body["color"], "#1F3354");
    assert_eq!(body["professor_id"], "p1");
    assert_eq!(backend.rows("groups").len(), 3);
}

#[tokio::test]
async fn create_group_requires_a_name() {
    let (app, _backend) = test_app();

    let (status, body) = post_json(&app, "/api/professor/groups", r#"{"name": ""}"#, Some(PROFESSOR)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["field_errors"]["name"].is_string(), "{body}");
}

#[tokio::test]
async fn update_and_hide_a_group() {
    let (app, _backend) = test_app();

    let (status, body) = patch_json(
        &app,
        "/api/professor/groups/20",
        r##"{"color": "#000000", "hidden": true}"##,
        Some(PROFESSOR),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["color"], "#000000");
    assert_eq!(body["hidden"], true);
    assert_eq!(body["name"], "Prácticas 2026-2");
}

#[tokio::test]
async fn groups_of_other_professors_are_not_found() {
    let (app, backend) = test_app();

    let (status, _) = patch_json(&app, "/api/professor/groups/21", r#"{"name": "Mío"}"#, Some(PROFESSOR)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&app, "/api/professor/groups/21/members", Some(PROFESSOR)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = delete(&app, "/api/professor/groups/21", Some(PROFESSOR)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(backend.rows("groups").len(), 2);
}

#[tokio::test]
async fn delete_group() {
    let (app, backend) = test_app();

    let (status, _) = delete(&app, "/api/professor/groups/20", Some(PROFESSOR)).await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(backend.rows("groups").iter().all(|g| g["id"] != 20));
}

// ─── Members ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_member_is_idempotent() {
    let (app, backend) = test_app();

    let (status, body) = post_json(
        &app,
        "/api/professor/groups/20/members",
        r#"{"student_id": "s1"}"#,
        Some(PROFESSOR),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["already_member"], false);

    let (status, body) = post_json(
        &app,
        "/api/professor/groups/20/members",
        r#"{"student_id": "s1"}"#,
        Some(PROFESSOR),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["already_member"], true);

    let memberships = backend
        .rows("group_members")
        .iter()
        .filter(|m| m["student_id"] == "s1")
        .count();
    assert_eq!(memberships, 1);
}

#[tokio::test]
async fn student_in_another_group_is_a_conflict() {
    let (app, backend) = test_app();

    let (status, body) = post_json(
        &app,
        "/api/professor/groups/20/members",
        r#"{"student_id": "s3"}"#,
        Some(PROFESSOR),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "El alumno ya pertenece al grupo \"Grupo Vespertino\".");
    assert_eq!(backend.rows("group_members").len(), 1);
}

#[tokio::test]
async fn blank_student_id_is_invalid() {
    let (app, _backend) = test_app();

    let (status, body) = post_json(
        &app,
        "/api/professor/groups/20/members",
        r#"{"student_id": "  "}"#,
        Some(PROFESSOR),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field_errors"]["student_id"], "Selecciona un alumno.");
}

#[tokio::test]
async fn member_overview_tracks_practice_and_offers() {
    let (app, backend) = test_app();
    backend.seed(
        "group_members",
        json!([{ "group_id": 20, "student_id": "s1" }, { "group_id": 20, "student_id": "s2" }]),
    );
    backend.seed(
        "applications",
        json!([
            { "id": 90, "student_id": "s2", "vacancy_id": 1, "status": "oferta", "applied_at": "2026-09-05T10:00:00Z" },
            { "id": 91, "student_id": "s1", "vacancy_id": 1, "status": "postulada", "applied_at": "2026-09-04T10:00:00Z" },
        ]),
    );
    backend.seed(
        "practices",
        json!({ "id": 80, "student_id": "s1", "vacancy_id": 3, "status": "active" }),
    );

    let (status, body) = get(&app, "/api/professor/groups/20/members", Some(PROFESSOR)).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["group"]["name"], "Prácticas 2026-2");
    let members = body["members"].as_array().unwrap();
    assert_eq!(members.len(), 2);

    let ana = members.iter().find(|m| m["student"]["id"] == "s1").unwrap();
    assert_eq!(ana["has_active_practice"], true);
    assert_eq!(ana["active_vacancy_id"], "3");
    assert_eq!(ana["pending_offers"], 0);

    let bruno = members.iter().find(|m| m["student"]["id"] == "s2").unwrap();
    assert_eq!(bruno["has_active_practice"], false);
    assert_eq!(bruno["pending_offers"], 1);
}

#[tokio::test]
async fn accepted_offers_leave_the_pending_count() {
    let (app, backend) = test_app();
    backend.seed("group_members", json!({ "group_id": 20, "student_id": "s2" }));
    backend.seed(
        "applications",
        json!([
            {
                "id": 92, "student_id": "s2", "vacancy_id": 1, "status": "oferta",
                "decision": "accepted", "applied_at": "2026-09-05T10:00:00Z"
            },
            { "id": 93, "student_id": "s2", "vacancy_id": 3, "status": "aceptada", "applied_at": "2026-09-06T10:00:00Z" },
        ]),
    );

    let (status, body) = get(&app, "/api/professor/groups/20/members", Some(PROFESSOR)).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    let bruno = &body["members"][0];
    assert_eq!(bruno["pending_offers"], 0);
    assert_eq!(bruno["accepted_vacancy_ids"], json!(["3"]));
}

#[tokio::test]
async fn remove_member() {
    let (app, backend) = test_app();
    backend.seed("group_members", json!({ "group_id": 20, "student_id": "s1" }));

    let (status, _) = delete(&app, "/api/professor/groups/20/members/s1", Some(PROFESSOR)).await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(backend.rows("group_members").iter().all(|m| m["student_id"] != "s1"));
}

// ─── Students and vacancies ─────────────────────────────────────────────────

#[tokio::test]
async fn student_search_stays_in_the_program() {
    let (app, _backend) = test_app();

    let (status, body) = get(&app, "/api/professor/students?q=bru", Some(PROFESSOR)).await;

    assert_eq!(status, StatusCode::OK);
    // Bruna Soto is in another program.
    assert_eq!(names(&body, "full_name"), vec!["Bruno Díaz"]);
}

#[tokio::test]
async fn short_student_query_returns_nothing() {
    let (app, _backend) = test_app();

    let (status, body) = get(&app, "/api/professor/students?q=a", Some(PROFESSOR)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn vacancy_search_uses_the_professor_program() {
    let (app, _backend) = test_app();

    let (status, body) = get(&app, "/api/professor/vacancies", Some(PROFESSOR)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&body["data"], "title"), vec!["Diseño UX", "Backend Rust"]);
}

#[tokio::test]
async fn vacancy_search_needs_a_program_on_the_profile() {
    let (app, backend) = test_app();
    backend.add_user("p2", "sinprograma@uacj.mx", "token-p2", "secreto123");
    backend.seed("profiles", json!({ "id": "p2", "full_name": "Sin Programa", "role": "professor" }));

    let (status, body) = get(&app, "/api/professor/vacancies", Some("token-p2")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Configura tu programa en el perfil para ver vacantes.");
}

#[tokio::test]
async fn vacancy_detail_shows_what_a_student_would_see() {
    let (app, backend) = test_app();
    backend.seed(
        "applications",
        json!({ "id": 94, "student_id": "s1", "vacancy_id": 1, "status": "postulada", "applied_at": "2026-09-05T10:00:00Z" }),
    );

    let (status, body) = get(&app, "/api/professor/vacancies/1?student_id=s1", Some(PROFESSOR)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["title"], "Backend Rust");
    assert_eq!(body["student_action"]["state"], "already_applied");

    let (_, body) = get(&app, "/api/professor/vacancies/1?student_id=s2", Some(PROFESSOR)).await;
    assert_eq!(body["student_action"]["state"], "eligible_fresh");

    let (_, body) = get(&app, "/api/professor/vacancies/1", Some(PROFESSOR)).await;
    assert!(body.get("student_action").is_none());
}

#[tokio::test]
async fn recommend_notifies_the_student() {
    let (app, backend) = test_app();

    let (status, _) = post_json(
        &app,
        "/api/professor/vacancies/1/recommend",
        r#"{"student_id": "s2"}"#,
        Some(PROFESSOR),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let calls = backend.calls();
    assert_eq!(calls[0].0, "professor_recommend_vacancy");
    assert_eq!(calls[0].1, json!({ "p_vacancy_id": 1, "p_student_id": "s2" }));
    let for_bruno = backend
        .rows("notifications")
        .iter()
        .filter(|n| n["student_id"] == "s2")
        .count();
    assert_eq!(for_bruno, 2);
}
