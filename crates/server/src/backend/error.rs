use serde_json::Value;
use shared_types::AppError;

/// SQLSTATE for a unique constraint violation.
pub const UNIQUE_VIOLATION: &str = "23505";
/// SQLSTATE raised when a row-level policy rejects the statement.
pub const INSUFFICIENT_PRIVILEGE: &str = "42501";
/// PostgREST code for "no rows" on a single-object request.
pub const NO_ROWS: &str = "PGRST116";

/// A failed call to the hosted backend.
///
/// `status` is 0 when the request never got a response.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendError {
    pub status: u16,
    pub code: Option<String>,
    pub message: String,
    pub details: Option<String>,
}

impl BackendError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            code: None,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(0, message)
    }

    /// Parse an error body from PostgREST (`code`, `message`, `details`),
    /// GoTrue (`error_description`, `msg`) or storage (`error`, `message`).
    pub fn from_body(status: u16, body: &str) -> Self {
        let json: Value = serde_json::from_str(body).unwrap_or(Value::Null);
        let text = |key: &str| json.get(key).and_then(Value::as_str).map(str::to_string);
        let code = text("code")
            .or_else(|| json.get("code").and_then(Value::as_i64).map(|c| c.to_string()))
            .or_else(|| text("error_code"));
        let message = text("message")
            .or_else(|| text("msg"))
            .or_else(|| text("error_description"))
            .or_else(|| text("error"))
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    format!("El servidor respondió con estado {status}")
                } else {
                    body.trim().to_string()
                }
            });
        Self {
            status,
            code,
            message,
            details: text("details").or_else(|| text("hint")),
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        if self.code.as_deref() == Some(UNIQUE_VIOLATION) {
            return true;
        }
        let lower = self.message.to_lowercase();
        lower.contains("duplicate key") || lower.contains("already exists")
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "backend {} ({code}): {}", self.status, self.message),
            None => write!(f, "backend {}: {}", self.status, self.message),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16()).unwrap_or(0);
        Self::new(status, err.to_string())
    }
}

/// The backend's own message is passed through; only the kind is mapped.
impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        let code = err.code.as_deref();
        let message = err.message.clone();
        if err.is_unique_violation() {
            AppError::conflict(message)
        } else if err.status == 401 {
            AppError::unauthorized(message)
        } else if err.status == 403 || code == Some(INSUFFICIENT_PRIVILEGE) {
            AppError::forbidden(message)
        } else if err.status == 404 || code == Some(NO_ROWS) {
            AppError::not_found(message)
        } else if err.status == 400 || err.status == 422 {
            AppError::bad_request(message)
        } else {
            tracing::error!(error = %err, "Backend call failed");
            AppError::upstream(message)
        }
    }
}
