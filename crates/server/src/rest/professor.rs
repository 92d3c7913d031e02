use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use shared_types::{
    page_range, standing_of, AddMemberRequest, AddMemberResponse, AppError, CreateGroupRequest, Group,
    GroupDetail, MemberOverview, MessageResponse, Page, ProfessorVacancyParams,
    ProfessorVacancyView, Profile, RecommendRequest, StudentSearchParams, UpdateGroupRequest,
    Vacancy, VacancySearchParams, PAGE_SIZE,
};

use crate::auth::extractors::{Caller, ProfessorCaller, RoleRequired};
use crate::backend::{rpc, Conn};
use crate::repo::{
    applications, groups, practices, profiles,
    vacancies::{self, VacancySearch},
};
use crate::state::AppState;

/// Minimum characters before a student lookup hits the backend.
const STUDENT_QUERY_MIN: usize = 2;
const STUDENT_SEARCH_LIMIT: i64 = 8;

async fn own_group(conn: Conn<'_>, caller: &Caller, id: &str) -> Result<Group, AppError> {
    groups::find_owned(conn, id, caller.id())
        .await?
        .ok_or_else(|| AppError::not_found("No se encontró el grupo."))
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/professor/groups",
    responses(
        (status = 200, description = "Own groups by name", body = Vec<Group>)
    ),
    tag = "professor"
)]
#[tracing::instrument(skip(state, caller), fields(professor_id = %caller.id()))]
pub async fn list_groups(
    State(state): State<AppState>,
    RoleRequired(caller): ProfessorCaller,
) -> Result<Json<Vec<Group>>, AppError> {
    let rows = groups::list_by_professor(caller.conn(&state), caller.id()).await?;
    Ok(Json(rows))
}

#[utoipa::path(
    post,
    path = "/api/professor/groups",
    request_body = CreateGroupRequest,
    responses(
        (status = 201, description = "Group created", body = Group),
        (status = 422, description = "Validation error", body = AppError)
    ),
    tag = "professor"
)]
#[tracing::instrument(skip(state, caller, body), fields(professor_id = %caller.id()))]
pub async fn create_group(
    State(state): State<AppState>,
    RoleRequired(caller): ProfessorCaller,
    Json(body): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<Group>), AppError> {
    body.validate()?;
    if body.name.trim().is_empty() {
        return Err(AppError::invalid_field("name", "Escribe un nombre para el grupo."));
    }
    let group = groups::create(caller.conn(&state), caller.id(), &body).await?;
    tracing::info!(group_id = %group.id, "Group created");
    Ok((StatusCode::CREATED, Json(group)))
}

#[utoipa::path(
    patch,
    path = "/api/professor/groups/{id}",
    params(("id" = String, Path, description = "Group id")),
    request_body = UpdateGroupRequest,
    responses(
        (status = 200, description = "Group updated", body = Group),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "professor"
)]
#[tracing::instrument(skip(state, caller, body), fields(professor_id = %caller.id()))]
pub async fn update_group(
    State(state): State<AppState>,
    RoleRequired(caller): ProfessorCaller,
    Path(id): Path<String>,
    Json(body): Json<UpdateGroupRequest>,
) -> Result<Json<Group>, AppError> {
    body.validate()?;
    groups::update(caller.conn(&state), &id, caller.id(), &body)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("No se encontró el grupo."))
}

#[utoipa::path(
    delete,
    path = "/api/professor/groups/{id}",
    params(("id" = String, Path, description = "Group id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "professor"
)]
#[tracing::instrument(skip(state, caller), fields(professor_id = %caller.id()))]
pub async fn delete_group(
    State(state): State<AppState>,
    RoleRequired(caller): ProfessorCaller,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let conn = caller.conn(&state);
    let group = own_group(conn, &caller, &id).await?;
    groups::delete(conn, &group.id, caller.id()).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

/// Members with their applications, practices and offer counts.
#[utoipa::path(
    get,
    path = "/api/professor/groups/{id}/members",
    params(("id" = String, Path, description = "Group id")),
    responses(
        (status = 200, description = "Group with member overviews", body = GroupDetail),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "professor"
)]
#[tracing::instrument(skip(state, caller), fields(professor_id = %caller.id()))]
pub async fn list_members(
    State(state): State<AppState>,
    RoleRequired(caller): ProfessorCaller,
    Path(id): Path<String>,
) -> Result<Json<GroupDetail>, AppError> {
    let conn = caller.conn(&state);
    let group = own_group(conn, &caller, &id).await?;
    let ids = groups::member_ids(conn, &group.id).await?;

    let (students, all_applications, all_practices) = tokio::try_join!(
        profiles::find_many(conn, &ids),
        applications::list_for_students(conn, &ids),
        practices::list_for_students(conn, &ids),
    )?;

    let mut applications_by: HashMap<String, Vec<_>> = HashMap::new();
    for application in all_applications {
        applications_by
            .entry(application.student_id.clone())
            .or_default()
            .push(application);
    }
    let mut practices_by: HashMap<String, Vec<_>> = HashMap::new();
    for practice in all_practices {
        practices_by
            .entry(practice.student_id.clone())
            .or_default()
            .push(practice);
    }

    let members = students
        .into_iter()
        .map(|student| {
            let applications = applications_by.remove(&student.id).unwrap_or_default();
            let practices = practices_by.remove(&student.id).unwrap_or_default();
            MemberOverview::new(student, applications, practices)
        })
        .collect();
    Ok(Json(GroupDetail { group, members }))
}

/// Add a student. A student sits in at most one group.
#[utoipa::path(
    post,
    path = "/api/professor/groups/{id}/members",
    params(("id" = String, Path, description = "Group id")),
    request_body = AddMemberRequest,
    responses(
        (status = 200, description = "Member added or already present", body = AddMemberResponse),
        (status = 404, description = "Group not found", body = AppError),
        (status = 409, description = "Student is in another group", body = AppError)
    ),
    tag = "professor"
)]
#[tracing::instrument(skip(state, caller, body), fields(professor_id = %caller.id(), student_id = %body.student_id))]
pub async fn add_member(
    State(state): State<AppState>,
    RoleRequired(caller): ProfessorCaller,
    Path(id): Path<String>,
    Json(body): Json<AddMemberRequest>,
) -> Result<Json<AddMemberResponse>, AppError> {
    let student_id = body.student_id.trim();
    if student_id.is_empty() {
        return Err(AppError::invalid_field("student_id", "Selecciona un alumno."));
    }

    let conn = caller.conn(&state);
    let group = own_group(conn, &caller, &id).await?;

    let other_ids = groups::other_group_ids(conn, student_id, &group.id).await?;
    if !other_ids.is_empty() {
        let others = groups::find_many(conn, &other_ids).await?;
        let name = others
            .first()
            .map(|g| g.name.as_str())
            .unwrap_or("otro grupo");
        return Err(AppError::conflict(format!(
            "El alumno ya pertenece al grupo \"{name}\"."
        )));
    }

    let already_member = groups::is_member(conn, &group.id, student_id).await?;
    if !already_member {
        groups::add_member(conn, &group.id, student_id).await?;
        tracing::info!(group_id = %group.id, "Member added");
    }

    Ok(Json(AddMemberResponse {
        group_id: group.id,
        student_id: student_id.to_string(),
        already_member,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/professor/groups/{id}/members/{student_id}",
    params(
        ("id" = String, Path, description = "Group id"),
        ("student_id" = String, Path, description = "Student id")
    ),
    responses(
        (status = 204, description = "Removed"),
        (status = 404, description = "Group not found", body = AppError)
    ),
    tag = "professor"
)]
#[tracing::instrument(skip(state, caller), fields(professor_id = %caller.id()))]
pub async fn remove_member(
    State(state): State<AppState>,
    RoleRequired(caller): ProfessorCaller,
    Path((id, student_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let conn = caller.conn(&state);
    let group = own_group(conn, &caller, &id).await?;
    groups::remove_member(conn, &group.id, &student_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Students and vacancies
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/professor/students",
    params(StudentSearchParams),
    responses(
        (status = 200, description = "Up to 8 matching students", body = Vec<Profile>)
    ),
    tag = "professor"
)]
#[tracing::instrument(skip(state, caller), fields(professor_id = %caller.id()))]
pub async fn search_students(
    State(state): State<AppState>,
    RoleRequired(caller): ProfessorCaller,
    Query(params): Query<StudentSearchParams>,
) -> Result<Json<Vec<Profile>>, AppError> {
    let term = shared_types::sanitize_search_term(params.q.as_deref().unwrap_or_default());
    if term.chars().count() < STUDENT_QUERY_MIN {
        return Ok(Json(Vec::new()));
    }
    let rows = profiles::search_students(
        caller.conn(&state),
        &term,
        caller.program_id(),
        STUDENT_SEARCH_LIMIT,
    )
    .await?;
    Ok(Json(rows))
}

/// Open vacancies linked to the professor's program.
#[utoipa::path(
    get,
    path = "/api/professor/vacancies",
    params(VacancySearchParams),
    responses(
        (status = 200, description = "One page of vacancies", body = Page<Vacancy>),
        (status = 400, description = "No program on the profile", body = AppError)
    ),
    tag = "professor"
)]
#[tracing::instrument(skip(state, caller), fields(professor_id = %caller.id()))]
pub async fn search_vacancies(
    State(state): State<AppState>,
    RoleRequired(caller): ProfessorCaller,
    Query(params): Query<VacancySearchParams>,
) -> Result<Json<Page<Vacancy>>, AppError> {
    let Some(program_id) = caller.program_id() else {
        return Err(AppError::bad_request(
            "Configura tu programa en el perfil para ver vacantes.",
        ));
    };
    let ticket = state.searches.begin(&format!("professor:{}", caller.id()));

    let (page, from, to) = page_range(params.page, PAGE_SIZE);
    let criteria = VacancySearch::from_params(&params).in_program(Some(program_id));
    let rows = vacancies::search(caller.conn(&state), &criteria, from, to).await?;

    let page = Page::new(rows, page, PAGE_SIZE);
    Ok(Json(if ticket.is_current() {
        page
    } else {
        page.mark_stale()
    }))
}

#[utoipa::path(
    get,
    path = "/api/professor/vacancies/{id}",
    params(("id" = String, Path, description = "Vacancy id"), ProfessorVacancyParams),
    responses(
        (status = 200, description = "Vacancy with company", body = ProfessorVacancyView),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "professor"
)]
#[tracing::instrument(skip(state, caller, params), fields(professor_id = %caller.id()))]
pub async fn get_vacancy(
    State(state): State<AppState>,
    RoleRequired(caller): ProfessorCaller,
    Path(id): Path<String>,
    Query(params): Query<ProfessorVacancyParams>,
) -> Result<Json<ProfessorVacancyView>, AppError> {
    let conn = caller.conn(&state);
    let vacancy = vacancies::find(conn, &id)
        .await?
        .ok_or_else(|| AppError::not_found("No se encontró la vacante."))?;

    let student_action = match params.student_id.as_deref().map(str::trim) {
        Some(student_id) if !student_id.is_empty() => {
            let ids = [student_id.to_string()];
            let (student_applications, student_practices) = tokio::try_join!(
                applications::list_for_students(conn, &ids),
                practices::list_for_students(conn, &ids),
            )?;
            let standing = standing_of(&student_applications, &student_practices);
            Some(standing.action_for(&vacancy).button())
        }
        _ => None,
    };
    Ok(Json(ProfessorVacancyView {
        vacancy,
        student_action,
    }))
}

#[utoipa::path(
    post,
    path = "/api/professor/vacancies/{id}/recommend",
    params(("id" = String, Path, description = "Vacancy id")),
    request_body = RecommendRequest,
    responses(
        (status = 200, description = "Recommendation sent", body = MessageResponse)
    ),
    tag = "professor"
)]
#[tracing::instrument(skip(state, caller, body), fields(professor_id = %caller.id()))]
pub async fn recommend_vacancy(
    State(state): State<AppState>,
    RoleRequired(caller): ProfessorCaller,
    Path(id): Path<String>,
    Json(body): Json<RecommendRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    rpc::professor_recommend_vacancy(caller.conn(&state), &id, body.student_id.trim()).await?;
    Ok(Json(MessageResponse::new("Recomendación enviada")))
}
