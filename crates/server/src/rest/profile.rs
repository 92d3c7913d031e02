use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use shared_types::{AppError, Profile, UpdateProfileRequest, UploadResponse};

use crate::auth::extractors::{Caller, SessionRequired};
use crate::repo::profiles;
use crate::state::AppState;
use crate::storage::{self, FileKind, Upload};

/// Upload form field carrying the file.
const FILE_FIELD: &str = "file";

/// Pull the `file` part out of a multipart form.
async fn read_upload(mut multipart: Multipart) -> Result<Upload, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(e.to_string()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(e.to_string()))?;
        return Ok(Upload {
            content_type,
            bytes: bytes.to_vec(),
        });
    }
    Err(AppError::invalid_field(FILE_FIELD, "Selecciona un archivo."))
}

// ---------------------------------------------------------------------------
// PATCH /api/profile
// ---------------------------------------------------------------------------

/// Update the caller's own profile fields.
#[utoipa::path(
    patch,
    path = "/api/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = Profile),
        (status = 400, description = "Nothing to update", body = AppError),
        (status = 422, description = "Validation error", body = AppError)
    ),
    tag = "profile"
)]
#[tracing::instrument(skip(state, session, body), fields(user_id = %session.user_id))]
pub async fn update_profile(
    State(state): State<AppState>,
    SessionRequired(session): SessionRequired,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<Profile>, AppError> {
    body.validate()?;
    if body.is_empty() {
        return Err(AppError::bad_request("No hay cambios que guardar."));
    }

    let updated = profiles::update(session.conn(&state), &session.user_id, &body).await?;
    match updated {
        Some(profile) => Ok(Json(profile)),
        // Row-level rules may hide the returned row; read it back.
        None => Caller::load(&state, session)
            .await?
            .profile
            .map(Json)
            .ok_or_else(|| AppError::not_found("No se encontró tu perfil.")),
    }
}

// ---------------------------------------------------------------------------
// CV and avatar
// ---------------------------------------------------------------------------

async fn replace_file(
    state: &AppState,
    session: &crate::auth::Session,
    kind: &FileKind,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let upload = read_upload(multipart).await?;
    let url = storage::replace(session.conn(state), kind, &session.user_id, upload).await?;
    Ok(Json(UploadResponse { url }))
}

/// Replace the CV (PDF, PNG or JPG up to 5 MB).
#[utoipa::path(
    put,
    path = "/api/profile/cv",
    request_body(content_type = "multipart/form-data", description = "`file` part"),
    responses(
        (status = 200, description = "Public URL of the new CV", body = UploadResponse),
        (status = 422, description = "Wrong type or too large", body = AppError)
    ),
    tag = "profile"
)]
#[tracing::instrument(skip(state, session, multipart), fields(user_id = %session.user_id))]
pub async fn upload_cv(
    State(state): State<AppState>,
    SessionRequired(session): SessionRequired,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    replace_file(&state, &session, &storage::CV, multipart).await
}

#[utoipa::path(
    delete,
    path = "/api/profile/cv",
    responses((status = 204, description = "CV removed")),
    tag = "profile"
)]
#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
pub async fn delete_cv(
    State(state): State<AppState>,
    SessionRequired(session): SessionRequired,
) -> Result<StatusCode, AppError> {
    storage::remove(session.conn(&state), &storage::CV, &session.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Replace the avatar (PNG, JPG or WEBP up to 2 MB). Older avatars with
/// another extension are removed first.
#[utoipa::path(
    put,
    path = "/api/profile/avatar",
    request_body(content_type = "multipart/form-data", description = "`file` part"),
    responses(
        (status = 200, description = "Public URL of the new avatar", body = UploadResponse),
        (status = 422, description = "Wrong type or too large", body = AppError)
    ),
    tag = "profile"
)]
#[tracing::instrument(skip(state, session, multipart), fields(user_id = %session.user_id))]
pub async fn upload_avatar(
    State(state): State<AppState>,
    SessionRequired(session): SessionRequired,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    replace_file(&state, &session, &storage::AVATAR, multipart).await
}

#[utoipa::path(
    delete,
    path = "/api/profile/avatar",
    responses((status = 204, description = "Avatar removed")),
    tag = "profile"
)]
#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
pub async fn delete_avatar(
    State(state): State<AppState>,
    SessionRequired(session): SessionRequired,
) -> Result<StatusCode, AppError> {
    storage::remove(session.conn(&state), &storage::AVATAR, &session.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
