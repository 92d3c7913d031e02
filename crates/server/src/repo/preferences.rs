//! Per-student vacancy favorites and hidden lists.

use serde::Deserialize;
use serde_json::json;
use shared_types::AppError;

use crate::backend::{Conn, Filter, TableQuery};

pub const FAVORITES: &str = "vacancy_favorites";
pub const HIDDEN: &str = "vacancy_hidden";

#[derive(Deserialize)]
struct VacancyRef {
    #[serde(deserialize_with = "shared_types::de_id")]
    vacancy_id: String,
}

/// Vacancy ids stored in `table` for this student.
pub async fn ids(conn: Conn<'_>, table: &str, student_id: &str) -> Result<Vec<String>, AppError> {
    let rows: Vec<VacancyRef> = conn
        .fetch(
            &TableQuery::new(table)
                .select("vacancy_id")
                .eq("student_id", student_id),
        )
        .await?;
    Ok(rows.into_iter().map(|r| r.vacancy_id).collect())
}

/// Add a vacancy to the list. Adding twice is not an error.
pub async fn add(
    conn: Conn<'_>,
    table: &str,
    student_id: &str,
    vacancy_id: &str,
) -> Result<(), AppError> {
    let row = json!({ "student_id": student_id, "vacancy_id": vacancy_id });
    match conn.insert::<serde_json::Value>(table, row).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind == shared_types::AppErrorKind::Conflict => Ok(()),
        Err(e) => Err(e),
    }
}

pub async fn remove(
    conn: Conn<'_>,
    table: &str,
    student_id: &str,
    vacancy_id: &str,
) -> Result<(), AppError> {
    conn.delete(
        table,
        &[
            Filter::eq("student_id", student_id),
            Filter::eq("vacancy_id", vacancy_id),
        ],
    )
    .await
}
