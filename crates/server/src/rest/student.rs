use std::convert::Infallible;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::Stream;
use serde_json::json;
use validator::Validate;

use shared_types::{
    page_range, ActionState, AppError, Application, ApplyOutcome, ApplyOutcomeKind, ApplyRequest,
    CompletePracticeRequest, MessageResponse, Page, PracticeOverview, PracticeState,
    StudentStanding, Vacancy, VacancyCard, VacancyDetail, VacancySearchParams, PAGE_SIZE,
};

use crate::auth::extractors::{Caller, RoleRequired, StudentCaller};
use crate::backend::{rpc, Conn};
use crate::realtime::{ChangeEvent, ChangeKind};
use crate::repo::{
    applications, practices, preferences,
    vacancies::{self, VacancySearch},
};
use crate::state::AppState;

const APPLIED_MESSAGE: &str = "¡Listo! Tu postulación fue enviada.";
const REAPPLY_CONFIRMATION: &str =
    "Ya completaste una práctica en esta vacante. Confirma para postularte nuevamente.";

/// Fold the student's applications, practices and preferences into one standing.
pub async fn load_standing(conn: Conn<'_>, student_id: &str) -> Result<StudentStanding, AppError> {
    let (marks, practice_marks, favorites, hidden) = tokio::try_join!(
        applications::marks(conn, student_id),
        practices::marks(conn, student_id),
        preferences::ids(conn, preferences::FAVORITES, student_id),
        preferences::ids(conn, preferences::HIDDEN, student_id),
    )?;
    Ok(StudentStanding::from_rows(&marks, &practice_marks).with_preferences(favorites, hidden))
}

fn card(standing: &StudentStanding, vacancy: Vacancy) -> VacancyCard {
    VacancyCard {
        action: standing.action_for(&vacancy).button(),
        favorite: standing.is_favorite(&vacancy.id),
        application_caption: standing.status_for(&vacancy.id).map(|s| s.student_caption()),
        vacancy,
    }
}

async fn find_vacancy(conn: Conn<'_>, id: &str) -> Result<Vacancy, AppError> {
    vacancies::find(conn, id)
        .await?
        .ok_or_else(|| AppError::not_found("No se encontró la vacante."))
}

// ---------------------------------------------------------------------------
// GET /api/student/vacancies
// ---------------------------------------------------------------------------

/// Search open vacancies, scoped to the student's program when set.
#[utoipa::path(
    get,
    path = "/api/student/vacancies",
    params(VacancySearchParams),
    responses(
        (status = 200, description = "One page of vacancies", body = Page<VacancyCard>),
        (status = 401, description = "No session", body = AppError),
        (status = 403, description = "Not a student", body = AppError)
    ),
    tag = "student"
)]
#[tracing::instrument(skip(state, caller), fields(student_id = %caller.id()))]
pub async fn search_vacancies(
    State(state): State<AppState>,
    RoleRequired(caller): StudentCaller,
    Query(params): Query<VacancySearchParams>,
) -> Result<Json<Page<VacancyCard>>, AppError> {
    let ticket = state.searches.begin(&format!("student:{}", caller.id()));
    let conn = caller.conn(&state);

    let standing = load_standing(conn, caller.id()).await?;
    let (page, from, to) = page_range(params.page, PAGE_SIZE);
    let criteria = VacancySearch::from_params(&params)
        .in_program(caller.program_id())
        .excluding(standing.hidden_ids().cloned());

    let rows = vacancies::search(conn, &criteria, from, to).await?;
    let cards = rows.into_iter().map(|v| card(&standing, v)).collect();
    let page = Page::new(cards, page, PAGE_SIZE);

    if ticket.is_current() {
        Ok(Json(page))
    } else {
        tracing::debug!("Search superseded by a newer one");
        Ok(Json(page.mark_stale()))
    }
}

// ---------------------------------------------------------------------------
// GET /api/student/vacancies/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/student/vacancies/{id}",
    params(("id" = String, Path, description = "Vacancy id")),
    responses(
        (status = 200, description = "Vacancy detail", body = VacancyDetail),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "student"
)]
#[tracing::instrument(skip(state, caller), fields(student_id = %caller.id()))]
pub async fn get_vacancy(
    State(state): State<AppState>,
    RoleRequired(caller): StudentCaller,
    Path(id): Path<String>,
) -> Result<Json<VacancyDetail>, AppError> {
    let conn = caller.conn(&state);
    let vacancy = find_vacancy(conn, &id).await?;
    let standing = load_standing(conn, caller.id()).await?;
    let status = standing.status_for(&vacancy.id);

    Ok(Json(VacancyDetail {
        action: standing.action_for(&vacancy).button(),
        favorite: standing.is_favorite(&vacancy.id),
        hidden: standing.is_hidden(&vacancy.id),
        application_status: status.map(|s| s.as_str().to_string()),
        application_caption: status.map(|s| s.student_caption()),
        vacancy,
    }))
}

// ---------------------------------------------------------------------------
// POST /api/student/vacancies/{id}/apply
// ---------------------------------------------------------------------------

/// Apply to a vacancy.
///
/// Refusals and duplicates come back as a 200 outcome. Reapplying after a
/// completed practice needs `confirm_reapply`.
#[utoipa::path(
    post,
    path = "/api/student/vacancies/{id}/apply",
    params(("id" = String, Path, description = "Vacancy id")),
    request_body(content = ApplyRequest, description = "Optional body"),
    responses(
        (status = 200, description = "Outcome of the attempt", body = ApplyOutcome),
        (status = 404, description = "Not found", body = AppError),
        (status = 409, description = "Reapply needs confirmation", body = AppError)
    ),
    tag = "student"
)]
#[tracing::instrument(skip(state, caller, body), fields(student_id = %caller.id()))]
pub async fn apply(
    State(state): State<AppState>,
    RoleRequired(caller): StudentCaller,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<ApplyOutcome>, AppError> {
    let req: ApplyRequest = if body.is_empty() {
        ApplyRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::bad_request(format!("Cuerpo inválido: {e}")))?
    };

    let conn = caller.conn(&state);
    let vacancy = find_vacancy(conn, &id).await?;
    let practice = state
        .practices
        .current(caller.id(), &caller.session.token)
        .await;
    let mut standing = load_standing(conn, caller.id())
        .await?
        .with_active_practice(practice.has_active_practice);
    let action = standing.action_for(&vacancy);

    if action == ActionState::EligibleToReapply && !req.confirm_reapply {
        return Err(AppError::conflict(REAPPLY_CONFIRMATION));
    }

    if let Some(refusal) = action.refusal_message() {
        let outcome = if action == ActionState::AlreadyApplied {
            ApplyOutcomeKind::AlreadyApplied
        } else {
            ApplyOutcomeKind::NotAllowed
        };
        return Ok(Json(ApplyOutcome {
            outcome,
            message: refusal.to_string(),
            action: action.button(),
        }));
    }

    match rpc::apply(conn, state.config.apply_procedure, &vacancy.id).await {
        Ok(_) => {
            standing.record_applied(&vacancy.id);
            state.feed.publish(ChangeEvent::local(
                applications::TABLE,
                ChangeKind::Insert,
                json!({ "student_id": caller.id(), "vacancy_id": vacancy.id }),
            ));
            tracing::info!(vacancy_id = %vacancy.id, "Application submitted");
            Ok(Json(ApplyOutcome {
                outcome: ApplyOutcomeKind::Applied,
                message: APPLIED_MESSAGE.to_string(),
                action: standing.action_for(&vacancy).button(),
            }))
        }
        Err(e) if e.is_conflict() => {
            standing.record_duplicate(&vacancy.id);
            tracing::info!(vacancy_id = %vacancy.id, "Duplicate application ignored");
            Ok(Json(ApplyOutcome {
                outcome: ApplyOutcomeKind::AlreadyApplied,
                message: ActionState::AlreadyApplied
                    .refusal_message()
                    .unwrap_or_default()
                    .to_string(),
                action: standing.action_for(&vacancy).button(),
            }))
        }
        Err(e) => {
            tracing::error!(vacancy_id = %vacancy.id, error = %e, "Apply failed");
            Err(e)
        }
    }
}

// ---------------------------------------------------------------------------
// Offers
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/student/offers",
    responses(
        (status = 200, description = "Pending offers", body = Vec<Application>)
    ),
    tag = "student"
)]
#[tracing::instrument(skip(state, caller), fields(student_id = %caller.id()))]
pub async fn list_offers(
    State(state): State<AppState>,
    RoleRequired(caller): StudentCaller,
) -> Result<Json<Vec<Application>>, AppError> {
    let offers = applications::offers(caller.conn(&state), caller.id()).await?;
    Ok(Json(offers))
}

async fn own_offer(conn: Conn<'_>, caller: &Caller, id: &str) -> Result<Application, AppError> {
    let application = applications::find(conn, id)
        .await?
        .filter(|a| a.student_id == caller.id())
        .ok_or_else(|| AppError::not_found("No se encontró la oferta."))?;
    if !application.status.is_offer() {
        return Err(AppError::conflict("Esta oferta ya no está disponible."));
    }
    Ok(application)
}

/// Accept an offer. Refused while another practice is active.
#[utoipa::path(
    post,
    path = "/api/student/offers/{id}/accept",
    params(("id" = String, Path, description = "Application id")),
    responses(
        (status = 200, description = "Offer accepted", body = MessageResponse),
        (status = 404, description = "Not found", body = AppError),
        (status = 409, description = "Active practice or offer gone", body = AppError)
    ),
    tag = "student"
)]
#[tracing::instrument(skip(state, caller), fields(student_id = %caller.id()))]
pub async fn accept_offer(
    State(state): State<AppState>,
    RoleRequired(caller): StudentCaller,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let conn = caller.conn(&state);
    let practice = state
        .practices
        .current(caller.id(), &caller.session.token)
        .await;
    if practice.has_active_practice {
        return Err(AppError::conflict(
            "Ya tienes un proyecto activo. No puedes aceptar otra oferta.",
        ));
    }

    let offer = own_offer(conn, &caller, &id).await?;
    rpc::student_accept_offer(conn, &offer.id).await?;

    state.feed.publish(ChangeEvent::local(
        practices::TABLE,
        ChangeKind::Insert,
        json!({ "student_id": caller.id(), "vacancy_id": offer.vacancy_id }),
    ));
    tracing::info!(application_id = %offer.id, "Offer accepted");
    Ok(Json(MessageResponse::new("¡Felicidades! Tu práctica comenzó.")))
}

#[utoipa::path(
    post,
    path = "/api/student/offers/{id}/decline",
    params(("id" = String, Path, description = "Application id")),
    responses(
        (status = 200, description = "Offer declined", body = Application),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "student"
)]
#[tracing::instrument(skip(state, caller), fields(student_id = %caller.id()))]
pub async fn decline_offer(
    State(state): State<AppState>,
    RoleRequired(caller): StudentCaller,
    Path(id): Path<String>,
) -> Result<Json<Application>, AppError> {
    let conn = caller.conn(&state);
    let offer = own_offer(conn, &caller, &id).await?;
    let declined = applications::decline(conn, &offer.id, caller.id())
        .await?
        .ok_or_else(|| AppError::not_found("No se encontró la oferta."))?;
    Ok(Json(declined))
}

// ---------------------------------------------------------------------------
// Practices
// ---------------------------------------------------------------------------

/// Active practice, applications, completed placements and favorites.
#[utoipa::path(
    get,
    path = "/api/student/practices",
    responses(
        (status = 200, description = "Practice overview", body = PracticeOverview)
    ),
    tag = "student"
)]
#[tracing::instrument(skip(state, caller), fields(student_id = %caller.id()))]
pub async fn practice_overview(
    State(state): State<AppState>,
    RoleRequired(caller): StudentCaller,
) -> Result<Json<PracticeOverview>, AppError> {
    let conn = caller.conn(&state);
    let (active_practice, all, favorite_ids) = tokio::try_join!(
        practices::active_for_student(conn, caller.id()),
        applications::list_for_student(conn, caller.id()),
        preferences::ids(conn, preferences::FAVORITES, caller.id()),
    )?;
    let favorites = vacancies::find_many(conn, &favorite_ids).await?;

    let (completed, rest): (Vec<Application>, Vec<Application>) =
        all.into_iter().partition(|a| a.status.is_completed());
    let applied = rest
        .into_iter()
        .filter(|a| !a.status.is_rejected())
        .collect();

    Ok(Json(PracticeOverview {
        profile: caller.profile.clone(),
        active_practice,
        applied,
        completed,
        favorites,
    }))
}

/// Close the active practice with a 1 to 5 rating.
#[utoipa::path(
    post,
    path = "/api/student/practices/complete",
    request_body = CompletePracticeRequest,
    responses(
        (status = 200, description = "Practice completed", body = MessageResponse),
        (status = 422, description = "Rating out of range", body = AppError)
    ),
    tag = "student"
)]
#[tracing::instrument(skip(state, caller, body), fields(student_id = %caller.id()))]
pub async fn complete_practice(
    State(state): State<AppState>,
    RoleRequired(caller): StudentCaller,
    Json(body): Json<CompletePracticeRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    body.validate()?;
    rpc::complete_practice_with_rating(caller.conn(&state), caller.id(), body.rating).await?;

    state.feed.publish(ChangeEvent::local(
        practices::TABLE,
        ChangeKind::Update,
        json!({ "student_id": caller.id(), "status": shared_types::PRACTICE_COMPLETED }),
    ));
    Ok(Json(MessageResponse::new("¡Gracias por calificar tu práctica!")))
}

#[utoipa::path(
    get,
    path = "/api/student/practice-status",
    responses(
        (status = 200, description = "Active practice state", body = PracticeState)
    ),
    tag = "student"
)]
#[tracing::instrument(skip(state, caller), fields(student_id = %caller.id()))]
pub async fn practice_status(
    State(state): State<AppState>,
    RoleRequired(caller): StudentCaller,
) -> Json<PracticeState> {
    Json(
        state
            .practices
            .current(caller.id(), &caller.session.token)
            .await,
    )
}

/// Server-sent `practice-status` events: the current state, then every change.
#[utoipa::path(
    get,
    path = "/api/student/practice-status/stream",
    responses(
        (status = 200, description = "text/event-stream of PracticeState")
    ),
    tag = "student"
)]
#[tracing::instrument(skip(state, caller), fields(student_id = %caller.id()))]
pub async fn practice_status_stream(
    State(state): State<AppState>,
    RoleRequired(caller): StudentCaller,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state
        .practices
        .subscribe(caller.id(), &caller.session.token)
        .await;

    let stream = futures::stream::unfold((rx, true), |(mut rx, first)| async move {
        if !first && rx.changed().await.is_err() {
            return None;
        }
        let current = rx.borrow_and_update().clone();
        let event = Event::default()
            .event("practice-status")
            .json_data(&current)
            .unwrap_or_else(|_| Event::default().comment("unencodable state"));
        Some((Ok(event), (rx, false)))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

// ---------------------------------------------------------------------------
// Favorites and hidden vacancies
// ---------------------------------------------------------------------------

#[utoipa::path(
    put,
    path = "/api/student/favorites/{vacancy_id}",
    params(("vacancy_id" = String, Path, description = "Vacancy id")),
    responses((status = 204, description = "Saved")),
    tag = "student"
)]
#[tracing::instrument(skip(state, caller), fields(student_id = %caller.id()))]
pub async fn add_favorite(
    State(state): State<AppState>,
    RoleRequired(caller): StudentCaller,
    Path(vacancy_id): Path<String>,
) -> Result<StatusCode, AppError> {
    preferences::add(caller.conn(&state), preferences::FAVORITES, caller.id(), &vacancy_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/api/student/favorites/{vacancy_id}",
    params(("vacancy_id" = String, Path, description = "Vacancy id")),
    responses((status = 204, description = "Removed")),
    tag = "student"
)]
#[tracing::instrument(skip(state, caller), fields(student_id = %caller.id()))]
pub async fn remove_favorite(
    State(state): State<AppState>,
    RoleRequired(caller): StudentCaller,
    Path(vacancy_id): Path<String>,
) -> Result<StatusCode, AppError> {
    preferences::remove(caller.conn(&state), preferences::FAVORITES, caller.id(), &vacancy_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Hide a vacancy from searches. Hiding also drops it from favorites.
#[utoipa::path(
    put,
    path = "/api/student/hidden/{vacancy_id}",
    params(("vacancy_id" = String, Path, description = "Vacancy id")),
    responses((status = 204, description = "Hidden")),
    tag = "student"
)]
#[tracing::instrument(skip(state, caller), fields(student_id = %caller.id()))]
pub async fn hide_vacancy(
    State(state): State<AppState>,
    RoleRequired(caller): StudentCaller,
    Path(vacancy_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let conn = caller.conn(&state);
    preferences::add(conn, preferences::HIDDEN, caller.id(), &vacancy_id).await?;
    preferences::remove(conn, preferences::FAVORITES, caller.id(), &vacancy_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/api/student/hidden/{vacancy_id}",
    params(("vacancy_id" = String, Path, description = "Vacancy id")),
    responses((status = 204, description = "Visible again")),
    tag = "student"
)]
#[tracing::instrument(skip(state, caller), fields(student_id = %caller.id()))]
pub async fn unhide_vacancy(
    State(state): State<AppState>,
    RoleRequired(caller): StudentCaller,
    Path(vacancy_id): Path<String>,
) -> Result<StatusCode, AppError> {
    preferences::remove(caller.conn(&state), preferences::HIDDEN, caller.id(), &vacancy_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
