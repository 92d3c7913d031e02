//! In-process fan-out of database change events.
//!
//! The hosted database posts row changes to `/hooks/db-change`; once the
//! signature checks out the event is broadcast to every subscriber (the
//! active-practice store and the SSE streams).

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use shared_types::AppError;
use tokio::sync::broadcast;

use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

const FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row change, in the shape the database webhook posts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub table: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub record: Option<Value>,
    #[serde(default)]
    pub old_record: Option<Value>,
}

impl ChangeEvent {
    /// An event for a write this process made itself.
    pub fn local(table: &str, kind: ChangeKind, record: Value) -> Self {
        Self {
            kind,
            table: table.to_string(),
            schema: Some("public".to_string()),
            record: Some(record),
            old_record: None,
        }
    }

    fn field<'a>(row: Option<&'a Value>, key: &str) -> Option<&'a str> {
        row.and_then(|r| r.get(key)).and_then(Value::as_str)
    }

    /// Distinct `student_id` values on the new and old row.
    pub fn student_ids(&self) -> Vec<&str> {
        let mut ids = Vec::with_capacity(2);
        for id in [
            Self::field(self.record.as_ref(), "student_id"),
            Self::field(self.old_record.as_ref(), "student_id"),
        ]
        .into_iter()
        .flatten()
        {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    pub fn concerns_student(&self, student_id: &str) -> bool {
        self.student_ids().contains(&student_id)
    }
}

/// Process-wide broadcast of [`ChangeEvent`]s.
#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self { tx }
    }

    /// Returns how many subscribers saw the event.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        tracing::debug!(table = %event.table, kind = ?event.kind, "Change event");
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Constant-time check of a hex HMAC-SHA256 over the raw body. A leading
/// `sha256=` is accepted.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let signature = signature.trim();
    let hex_sig = signature.strip_prefix("sha256=").unwrap_or(signature);
    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Hex signature for `body`, as a webhook sender would compute it.
pub fn sign(secret: &str, body: &[u8]) -> String {
    match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
        Ok(mut mac) => {
            mac.update(body);
            hex::encode(mac.finalize().into_bytes())
        }
        Err(_) => String::new(),
    }
}

// ---------------------------------------------------------------------------
// POST /hooks/db-change
// ---------------------------------------------------------------------------

/// Receive a signed database change event.
#[utoipa::path(
    post,
    path = "/hooks/db-change",
    request_body(content = String, content_type = "application/json"),
    params(
        ("x-webhook-signature" = String, Header, description = "Hex HMAC-SHA256 of the body")
    ),
    responses(
        (status = 202, description = "Event accepted"),
        (status = 400, description = "Malformed event", body = AppError),
        (status = 401, description = "Bad signature", body = AppError),
        (status = 503, description = "Webhook secret not configured", body = AppError)
    ),
    tag = "hooks"
)]
#[tracing::instrument(skip(state, headers, body), fields(size = body.len()))]
pub async fn db_change(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let Some(secret) = state.config.webhook_secret.as_deref() else {
        return Err(AppError::unavailable("Webhook no configurado"));
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !verify_signature(secret, &body, signature) {
        tracing::warn!("Rejected change event with bad signature");
        return Err(AppError::unauthorized("Firma inválida"));
    }

    let event: ChangeEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::bad_request(format!("Evento inválido: {e}")))?;
    let receivers = state.feed.publish(event);
    tracing::debug!(receivers, "Change event fanned out");
    Ok(StatusCode::ACCEPTED)
}
