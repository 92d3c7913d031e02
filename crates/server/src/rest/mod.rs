pub mod auth;
pub mod company;
pub mod notifications;
pub mod professor;
pub mod profile;
pub mod programs;
pub mod student;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post, put},
    Router,
};

use crate::state::AppState;

/// Uploads go up to 5 MB; leave room for the multipart framing.
const UPLOAD_BODY_LIMIT: usize = 6 * 1024 * 1024;

/// Build the combined REST API router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        // Auth
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/password-reset", post(auth::password_reset))
        .route("/api/auth/company-signup", post(auth::company_signup))
        .route("/api/auth/me", get(auth::me))
        // Programs
        .route("/api/programs", get(programs::list_programs))
        // Student
        .route("/api/student/vacancies", get(student::search_vacancies))
        .route("/api/student/vacancies/{id}", get(student::get_vacancy))
        .route("/api/student/vacancies/{id}/apply", post(student::apply))
        .route("/api/student/offers", get(student::list_offers))
        .route("/api/student/offers/{id}/accept", post(student::accept_offer))
        .route("/api/student/offers/{id}/decline", post(student::decline_offer))
        .route("/api/student/practices", get(student::practice_overview))
        .route("/api/student/practices/complete", post(student::complete_practice))
        .route("/api/student/practice-status", get(student::practice_status))
        .route("/api/student/practice-status/stream", get(student::practice_status_stream))
        .route(
            "/api/student/favorites/{vacancy_id}",
            put(student::add_favorite).delete(student::remove_favorite),
        )
        .route(
            "/api/student/hidden/{vacancy_id}",
            put(student::hide_vacancy).delete(student::unhide_vacancy),
        )
        // Profile
        .route("/api/profile", patch(profile::update_profile))
        .route(
            "/api/profile/cv",
            put(profile::upload_cv)
                .delete(profile::delete_cv)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/api/profile/avatar",
            put(profile::upload_avatar)
                .delete(profile::delete_avatar)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        // Notifications
        .route("/api/notifications", get(notifications::list_notifications))
        .route("/api/notifications/read", post(notifications::mark_all_read))
        .route("/api/notifications/stream", get(notifications::notification_stream))
        // Company
        .route(
            "/api/company/vacancies",
            get(company::list_vacancies).post(company::create_vacancy),
        )
        .route(
            "/api/company/vacancies/{id}",
            get(company::get_vacancy)
                .patch(company::update_vacancy)
                .delete(company::delete_vacancy),
        )
        .route("/api/company/vacancies/{id}/toggle", post(company::toggle_vacancy))
        .route("/api/company/applications", get(company::list_applications))
        .route("/api/company/applications/{id}/offer", post(company::send_offer))
        .route("/api/company/applications/{id}/reject", post(company::reject_application))
        .route("/api/company/applications/{id}/status", post(company::set_application_status))
        // Professor
        .route(
            "/api/professor/groups",
            get(professor::list_groups).post(professor::create_group),
        )
        .route(
            "/api/professor/groups/{id}",
            patch(professor::update_group).delete(professor::delete_group),
        )
        .route(
            "/api/professor/groups/{id}/members",
            get(professor::list_members).post(professor::add_member),
        )
        .route(
            "/api/professor/groups/{id}/members/{student_id}",
            delete(professor::remove_member),
        )
        .route("/api/professor/students", get(professor::search_students))
        .route("/api/professor/vacancies", get(professor::search_vacancies))
        .route("/api/professor/vacancies/{id}", get(professor::get_vacancy))
        .route(
            "/api/professor/vacancies/{id}/recommend",
            post(professor::recommend_vacancy),
        )
}
