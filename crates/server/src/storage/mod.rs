use shared_types::AppError;

use crate::backend::Conn;
use crate::repo::profiles;

// ── File kinds ──────────────────────────────────────────────────────

/// A profile file slot: one object per user under `{bucket}/{user_id}/{stem}.{ext}`.
#[derive(Debug, Clone, Copy)]
pub struct FileKind {
    pub bucket: &'static str,
    pub stem: &'static str,
    /// `profiles` column holding the public URL.
    pub column: &'static str,
    /// Accepted `(mime, extension)` pairs.
    pub accepted: &'static [(&'static str, &'static str)],
    pub max_bytes: usize,
    /// Remove objects with another extension before uploading.
    pub clear_previous: bool,
    pub type_message: &'static str,
    pub size_message: &'static str,
}

pub const CV: FileKind = FileKind {
    bucket: "cvs",
    stem: "cv",
    column: "cv_url",
    accepted: &[
        ("application/pdf", "pdf"),
        ("image/png", "png"),
        ("image/jpeg", "jpg"),
    ],
    max_bytes: 5 * 1024 * 1024,
    clear_previous: false,
    type_message: "Sube un PDF o imagen (PNG/JPG).",
    size_message: "El CV no puede pesar más de 5 MB.",
};

pub const AVATAR: FileKind = FileKind {
    bucket: "avatars",
    stem: "avatar",
    column: "avatar_url",
    accepted: &[
        ("image/png", "png"),
        ("image/jpeg", "jpg"),
        ("image/webp", "webp"),
    ],
    max_bytes: 2 * 1024 * 1024,
    clear_previous: true,
    type_message: "Sube una imagen PNG/JPG/WEBP.",
    size_message: "La imagen no puede pesar más de 2 MB.",
};

/// A file received from a multipart form.
#[derive(Debug, Clone)]
pub struct Upload {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl FileKind {
    /// Extension for an accepted content type.
    pub fn extension_for(&self, content_type: &str) -> Option<&'static str> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        self.accepted
            .iter()
            .find(|(accepted, _)| *accepted == mime)
            .map(|(_, ext)| *ext)
    }

    pub fn validate(&self, upload: &Upload) -> Result<&'static str, AppError> {
        let ext = self
            .extension_for(&upload.content_type)
            .ok_or_else(|| AppError::invalid_field("file", self.type_message))?;
        if upload.bytes.is_empty() {
            return Err(AppError::invalid_field("file", "El archivo está vacío."));
        }
        if upload.bytes.len() > self.max_bytes {
            return Err(AppError::invalid_field("file", self.size_message));
        }
        Ok(ext)
    }

    pub fn object_path(&self, user_id: &str, ext: &str) -> String {
        format!("{user_id}/{}.{ext}", self.stem)
    }

    fn owns(&self, name: &str) -> bool {
        name.strip_prefix(self.stem)
            .is_some_and(|rest| rest.starts_with('.'))
    }
}

/// Append a `t=` query so browsers fetch the replaced file.
pub fn cache_bust(url: &str) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}t={}", chrono::Utc::now().timestamp_millis())
}

// ── Flows ───────────────────────────────────────────────────────────

/// Paths of this user's objects for `kind`, optionally keeping one name.
async fn existing_paths(
    conn: Conn<'_>,
    kind: &FileKind,
    user_id: &str,
    keep: Option<&str>,
) -> Result<Vec<String>, AppError> {
    let search = format!("{}.", kind.stem);
    let objects = conn
        .backend
        .list(conn.token, kind.bucket, user_id, Some(&search))
        .await?;
    Ok(objects
        .into_iter()
        .filter(|o| kind.owns(&o.name) && Some(o.name.as_str()) != keep)
        .map(|o| format!("{user_id}/{}", o.name))
        .collect())
}

/// Upload, publish the URL on the profile and return it cache-busted.
///
/// The steps run in order and are not rolled back if a later one fails.
pub async fn replace(
    conn: Conn<'_>,
    kind: &FileKind,
    user_id: &str,
    upload: Upload,
) -> Result<String, AppError> {
    let ext = kind.validate(&upload)?;
    let path = kind.object_path(user_id, ext);

    if kind.clear_previous {
        let keep = format!("{}.{ext}", kind.stem);
        let stale = existing_paths(conn, kind, user_id, Some(&keep)).await?;
        if !stale.is_empty() {
            conn.backend.remove(conn.token, kind.bucket, &stale).await?;
        }
    }

    conn.backend
        .upload(conn.token, kind.bucket, &path, &upload.content_type, upload.bytes, true)
        .await?;

    let url = conn.backend.public_url(kind.bucket, &path);
    profiles::set_file_url(conn, user_id, kind.column, Some(&url)).await?;

    tracing::info!(bucket = kind.bucket, %path, "Profile file replaced");
    Ok(cache_bust(&url))
}

/// Delete every object of this kind and clear the profile column.
pub async fn remove(conn: Conn<'_>, kind: &FileKind, user_id: &str) -> Result<(), AppError> {
    let paths = existing_paths(conn, kind, user_id, None).await?;
    if !paths.is_empty() {
        conn.backend.remove(conn.token, kind.bucket, &paths).await?;
    }
    profiles::set_file_url(conn, user_id, kind.column, None).await?;
    tracing::info!(bucket = kind.bucket, removed = paths.len(), "Profile file removed");
    Ok(())
}
