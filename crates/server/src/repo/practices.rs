use shared_types::{AppError, Practice, PracticeMark, PRACTICE_ACTIVE};

use crate::backend::{Conn, TableQuery};

pub const TABLE: &str = "practices";

const WITH_VACANCY: &str =
    "*,vacancy:vacancies(*,company:companies(id,name,industry,logo_url))";

pub async fn marks(conn: Conn<'_>, student_id: &str) -> Result<Vec<PracticeMark>, AppError> {
    conn.fetch(
        &TableQuery::new(TABLE)
            .select("vacancy_id,status")
            .eq("student_id", student_id),
    )
    .await
}

/// The student's active practice with its vacancy and company.
pub async fn active_for_student(
    conn: Conn<'_>,
    student_id: &str,
) -> Result<Option<Practice>, AppError> {
    conn.fetch_optional(
        &TableQuery::new(TABLE)
            .select(WITH_VACANCY)
            .eq("student_id", student_id)
            .eq("status", PRACTICE_ACTIVE),
    )
    .await
}

pub async fn list_for_students(
    conn: Conn<'_>,
    student_ids: &[String],
) -> Result<Vec<Practice>, AppError> {
    if student_ids.is_empty() {
        return Ok(Vec::new());
    }
    conn.fetch(
        &TableQuery::new(TABLE)
            .select(WITH_VACANCY)
            .in_list("student_id", student_ids),
    )
    .await
}
