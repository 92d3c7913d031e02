use serde::{Deserialize, Deserializer, Serialize};

/// Rows per page for every vacancy listing.
pub const PAGE_SIZE: i64 = 20;

/// One page of results fetched with an offset range.
///
/// The backend is queried without an exact count, so `has_more` is the
/// "page came back full" heuristic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: i64,
    pub page_size: i64,
    pub has_more: bool,
    /// Set when a newer search from the same session superseded this one.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stale: bool,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, page: i64, page_size: i64) -> Self {
        let has_more = data.len() as i64 == page_size;
        Self {
            data,
            page,
            page_size,
            has_more,
            stale: false,
        }
    }

    pub fn mark_stale(mut self) -> Self {
        self.stale = true;
        self
    }
}

/// Inclusive row range `(from, to)` for a zero-based page.
pub fn page_range(page: Option<i64>, page_size: i64) -> (i64, i64, i64) {
    let page = page.unwrap_or(0).max(0);
    let from = page * page_size;
    (page, from, from + page_size - 1)
}

/// Plain `{ "message": ... }` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Lowercase, strip Spanish diacritics and collapse whitespace.
pub fn fold_text(input: &str) -> String {
    let folded: String = input
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Replace characters that carry meaning inside PostgREST filter syntax.
pub fn sanitize_search_term(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '*' | '(' | ')' | '"' | ',' | '%' => ' ',
            other => other,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Row identifiers arrive as uuid strings or bigint numbers depending on the table.
pub fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

pub fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}
