use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use validator::Validate;

use shared_types::{
    can_send_offer, toggled_status, AppError, ApplicantFilter, ApplicantView, ApplicationStatus,
    Company, CompanyVacancy, CreateVacancyRequest, MessageResponse, OfferNotice, SendOfferRequest,
    SetApplicationStatusRequest, ToggleVacancyResponse, UpdateVacancyRequest, Vacancy,
};

use crate::auth::extractors::{Caller, CompanyCaller, RoleRequired};
use crate::backend::{rpc, Conn};
use crate::repo::{applications, companies, vacancies};
use crate::state::AppState;

/// Notification type sent with an offer.
const OFFER_NOTIFICATION: &str = "offer";

/// Vacancy page on the company side.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CompanyVacancyDetail {
    #[serde(flatten)]
    pub vacancy: CompanyVacancy,
    pub applicants: Vec<ApplicantView>,
}

async fn own_company(conn: Conn<'_>, caller: &Caller) -> Result<Company, AppError> {
    companies::find_by_owner(conn, caller.id())
        .await?
        .ok_or_else(|| AppError::not_found("Crea tu ficha de empresa primero."))
}

async fn own_vacancy(conn: Conn<'_>, company: &Company, id: &str) -> Result<Vacancy, AppError> {
    vacancies::find_owned(conn, id, &company.id)
        .await?
        .ok_or_else(|| AppError::not_found("No se encontró la vacante."))
}

/// An application on one of the company's vacancies, plus that vacancy.
async fn own_application(
    conn: Conn<'_>,
    company: &Company,
    id: &str,
) -> Result<(shared_types::Application, Vacancy), AppError> {
    let application = applications::find(conn, id)
        .await?
        .ok_or_else(|| AppError::not_found("No se encontró la postulación."))?;
    let vacancy = own_vacancy(conn, company, &application.vacancy_id).await?;
    Ok((application, vacancy))
}

// ---------------------------------------------------------------------------
// Vacancies
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/company/vacancies",
    responses(
        (status = 200, description = "The company's vacancies", body = Vec<CompanyVacancy>),
        (status = 404, description = "No company row yet", body = AppError)
    ),
    tag = "company"
)]
#[tracing::instrument(skip(state, caller), fields(user_id = %caller.id()))]
pub async fn list_vacancies(
    State(state): State<AppState>,
    RoleRequired(caller): CompanyCaller,
) -> Result<Json<Vec<CompanyVacancy>>, AppError> {
    let conn = caller.conn(&state);
    let company = own_company(conn, &caller).await?;
    let rows = vacancies::list_by_company(conn, &company.id).await?;

    let ids: Vec<String> = rows.iter().map(|v| v.id.clone()).collect();
    let mut programs = vacancies::program_ids(conn, &ids).await?;

    let listed = rows
        .into_iter()
        .map(|vacancy| CompanyVacancy {
            program_ids: programs.remove(&vacancy.id).unwrap_or_default(),
            vacancy,
        })
        .collect();
    Ok(Json(listed))
}

/// Post a vacancy. Program links that fail to save are logged and skipped.
#[utoipa::path(
    post,
    path = "/api/company/vacancies",
    request_body = CreateVacancyRequest,
    responses(
        (status = 201, description = "Vacancy created", body = CompanyVacancy),
        (status = 422, description = "Validation error", body = AppError)
    ),
    tag = "company"
)]
#[tracing::instrument(skip(state, caller, body), fields(user_id = %caller.id()))]
pub async fn create_vacancy(
    State(state): State<AppState>,
    RoleRequired(caller): CompanyCaller,
    Json(body): Json<CreateVacancyRequest>,
) -> Result<(StatusCode, Json<CompanyVacancy>), AppError> {
    body.validate()?;
    if body.title.trim().is_empty() {
        return Err(AppError::invalid_field("title", "Escribe un título para la vacante."));
    }

    let conn = caller.conn(&state);
    let company = own_company(conn, &caller).await?;
    let vacancy = vacancies::insert(conn, &company.id, &body).await?;

    let program_ids = match vacancies::insert_programs(conn, &vacancy.id, &body.program_ids).await {
        Ok(()) => body.program_ids,
        Err(e) => {
            tracing::error!(vacancy_id = %vacancy.id, error = %e, "Vacancy programs not saved");
            Vec::new()
        }
    };

    tracing::info!(vacancy_id = %vacancy.id, "Vacancy created");
    Ok((
        StatusCode::CREATED,
        Json(CompanyVacancy {
            vacancy,
            program_ids,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/company/vacancies/{id}",
    params(("id" = String, Path, description = "Vacancy id")),
    responses(
        (status = 200, description = "Vacancy with applicants", body = CompanyVacancyDetail),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "company"
)]
#[tracing::instrument(skip(state, caller), fields(user_id = %caller.id()))]
pub async fn get_vacancy(
    State(state): State<AppState>,
    RoleRequired(caller): CompanyCaller,
    Path(id): Path<String>,
) -> Result<Json<CompanyVacancyDetail>, AppError> {
    let conn = caller.conn(&state);
    let company = own_company(conn, &caller).await?;
    let vacancy = own_vacancy(conn, &company, &id).await?;

    let ids = vec![vacancy.id.clone()];
    let filter = ApplicantFilter {
        include_completed: true,
        ..Default::default()
    };
    let (mut programs, applicants) = tokio::try_join!(
        vacancies::program_ids(conn, &ids),
        applications::list_for_vacancies(conn, &ids, &filter),
    )?;

    let applicants = applicants
        .into_iter()
        .map(|a| ApplicantView::new(a, Some(&vacancy)))
        .collect();
    Ok(Json(CompanyVacancyDetail {
        vacancy: CompanyVacancy {
            program_ids: programs.remove(&vacancy.id).unwrap_or_default(),
            vacancy,
        },
        applicants,
    }))
}

/// Replace a vacancy's fields and program links.
#[utoipa::path(
    patch,
    path = "/api/company/vacancies/{id}",
    params(("id" = String, Path, description = "Vacancy id")),
    request_body = UpdateVacancyRequest,
    responses(
        (status = 200, description = "Vacancy updated", body = CompanyVacancy),
        (status = 404, description = "Not found", body = AppError),
        (status = 422, description = "Validation error", body = AppError)
    ),
    tag = "company"
)]
#[tracing::instrument(skip(state, caller, body), fields(user_id = %caller.id()))]
pub async fn update_vacancy(
    State(state): State<AppState>,
    RoleRequired(caller): CompanyCaller,
    Path(id): Path<String>,
    Json(body): Json<UpdateVacancyRequest>,
) -> Result<Json<CompanyVacancy>, AppError> {
    body.validate()?;
    if body.title.trim().is_empty() {
        return Err(AppError::invalid_field("title", "Escribe un título para la vacante."));
    }

    let conn = caller.conn(&state);
    let company = own_company(conn, &caller).await?;
    let vacancy = vacancies::update(conn, &id, &company.id, &body)
        .await?
        .ok_or_else(|| AppError::not_found("No se encontró la vacante."))?;

    if let Err(e) = vacancies::replace_programs(conn, &vacancy.id, &body.program_ids).await {
        tracing::error!(vacancy_id = %vacancy.id, error = %e, "Vacancy programs not replaced");
        return Err(e);
    }

    Ok(Json(CompanyVacancy {
        vacancy,
        program_ids: body.program_ids,
    }))
}

/// Flip a vacancy between activa and inactiva.
#[utoipa::path(
    post,
    path = "/api/company/vacancies/{id}/toggle",
    params(("id" = String, Path, description = "Vacancy id")),
    responses(
        (status = 200, description = "New status", body = ToggleVacancyResponse),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "company"
)]
#[tracing::instrument(skip(state, caller), fields(user_id = %caller.id()))]
pub async fn toggle_vacancy(
    State(state): State<AppState>,
    RoleRequired(caller): CompanyCaller,
    Path(id): Path<String>,
) -> Result<Json<ToggleVacancyResponse>, AppError> {
    let conn = caller.conn(&state);
    let company = own_company(conn, &caller).await?;
    let vacancy = own_vacancy(conn, &company, &id).await?;

    let next = toggled_status(vacancy.status.as_deref());
    vacancies::set_status(conn, &vacancy.id, &company.id, next).await?;
    Ok(Json(ToggleVacancyResponse {
        id: vacancy.id,
        status: next.to_string(),
    }))
}

/// Delete a vacancy after its applications and program links.
#[utoipa::path(
    delete,
    path = "/api/company/vacancies/{id}",
    params(("id" = String, Path, description = "Vacancy id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "company"
)]
#[tracing::instrument(skip(state, caller), fields(user_id = %caller.id()))]
pub async fn delete_vacancy(
    State(state): State<AppState>,
    RoleRequired(caller): CompanyCaller,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let conn = caller.conn(&state);
    let company = own_company(conn, &caller).await?;
    let vacancy = own_vacancy(conn, &company, &id).await?;

    if let Err(e) = applications::delete_for_vacancy(conn, &vacancy.id).await {
        tracing::warn!(vacancy_id = %vacancy.id, error = %e, "Applications not deleted");
    }
    if let Err(e) = vacancies::delete_programs(conn, &vacancy.id).await {
        tracing::warn!(vacancy_id = %vacancy.id, error = %e, "Vacancy programs not deleted");
    }
    vacancies::delete(conn, &vacancy.id, &company.id).await?;

    tracing::info!(vacancy_id = %vacancy.id, "Vacancy deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Applications
// ---------------------------------------------------------------------------

/// Applicants across the company's vacancies.
#[utoipa::path(
    get,
    path = "/api/company/applications",
    params(ApplicantFilter),
    responses(
        (status = 200, description = "Applicants", body = Vec<ApplicantView>)
    ),
    tag = "company"
)]
#[tracing::instrument(skip(state, caller), fields(user_id = %caller.id()))]
pub async fn list_applications(
    State(state): State<AppState>,
    RoleRequired(caller): CompanyCaller,
    Query(filter): Query<ApplicantFilter>,
) -> Result<Json<Vec<ApplicantView>>, AppError> {
    let conn = caller.conn(&state);
    let company = own_company(conn, &caller).await?;
    let owned = vacancies::list_by_company(conn, &company.id).await?;

    let by_id: HashMap<&str, &Vacancy> = owned.iter().map(|v| (v.id.as_str(), v)).collect();
    let ids: Vec<String> = match filter.vacancy_id.as_deref().filter(|v| !v.is_empty()) {
        Some(only) if by_id.contains_key(only) => vec![only.to_string()],
        Some(_) => Vec::new(),
        None => owned.iter().map(|v| v.id.clone()).collect(),
    };

    let rows = applications::list_for_vacancies(conn, &ids, &filter).await?;
    let views = rows
        .into_iter()
        .map(|a| {
            let vacancy = by_id.get(a.vacancy_id.as_str()).copied();
            ApplicantView::new(a, vacancy)
        })
        .collect();
    Ok(Json(views))
}

/// Send an offer to a fresh applicant.
#[utoipa::path(
    post,
    path = "/api/company/applications/{id}/offer",
    params(("id" = String, Path, description = "Application id")),
    request_body = SendOfferRequest,
    responses(
        (status = 200, description = "Offer sent", body = MessageResponse),
        (status = 409, description = "Offer not allowed", body = AppError)
    ),
    tag = "company"
)]
#[tracing::instrument(skip(state, caller, body), fields(user_id = %caller.id()))]
pub async fn send_offer(
    State(state): State<AppState>,
    RoleRequired(caller): CompanyCaller,
    Path(id): Path<String>,
    Json(body): Json<SendOfferRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let conn = caller.conn(&state);
    let company = own_company(conn, &caller).await?;
    let (application, vacancy) = own_application(conn, &company, &id).await?;

    if !can_send_offer(&application.status, &vacancy) {
        return Err(AppError::conflict(
            "Solo puedes ofertar a postulaciones nuevas de vacantes activas con cupo.",
        ));
    }

    rpc::company_accept_application(
        conn,
        &application.id,
        body.offer_note.as_deref(),
        body.days_to_expire,
    )
    .await?;
    tracing::info!(application_id = %application.id, "Offer sent");
    Ok(Json(MessageResponse::new("Oferta enviada")))
}

#[utoipa::path(
    post,
    path = "/api/company/applications/{id}/reject",
    params(("id" = String, Path, description = "Application id")),
    responses(
        (status = 200, description = "Application rejected", body = MessageResponse),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "company"
)]
#[tracing::instrument(skip(state, caller), fields(user_id = %caller.id()))]
pub async fn reject_application(
    State(state): State<AppState>,
    RoleRequired(caller): CompanyCaller,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let conn = caller.conn(&state);
    let company = own_company(conn, &caller).await?;
    let (application, _) = own_application(conn, &company, &id).await?;

    rpc::company_set_application_status(
        conn,
        &application.id,
        ApplicationStatus::Rejected.as_str(),
        rpc::DEFAULT_OFFER_DAYS,
    )
    .await?;
    Ok(Json(MessageResponse::new("Postulación rechazada")))
}

/// Write a status directly. Moving to oferta also notifies the student.
#[utoipa::path(
    post,
    path = "/api/company/applications/{id}/status",
    params(("id" = String, Path, description = "Application id")),
    request_body = SetApplicationStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = shared_types::Application),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "company"
)]
#[tracing::instrument(skip(state, caller, body), fields(user_id = %caller.id(), status = %body.status))]
pub async fn set_application_status(
    State(state): State<AppState>,
    RoleRequired(caller): CompanyCaller,
    Path(id): Path<String>,
    Json(body): Json<SetApplicationStatusRequest>,
) -> Result<Json<shared_types::Application>, AppError> {
    let status = ApplicationStatus::parse(&body.status);
    if matches!(status, ApplicationStatus::Other(_)) {
        return Err(AppError::invalid_field("status", "Estado no reconocido."));
    }

    let conn = caller.conn(&state);
    let company = own_company(conn, &caller).await?;
    let (application, vacancy) = own_application(conn, &company, &id).await?;

    let updated = applications::set_status(conn, &application.id, status.as_str())
        .await?
        .unwrap_or(application);

    if status.is_offer() {
        let notice = OfferNotice::new(&company.name, &vacancy.title);
        if let Err(e) = rpc::create_company_notification(
            conn,
            &updated.student_id,
            &updated.id,
            OFFER_NOTIFICATION,
            &notice,
        )
        .await
        {
            tracing::error!(application_id = %updated.id, error = %e, "Offer notification not sent");
        }
    }
    Ok(Json(updated))
}
