use serde_json::json;
use shared_types::{
    AppError, ApplicantFilter, Application, ApplicationMark, ApplicationStatus, DECISION_DECLINED,
};

use super::now_rfc3339;
use crate::backend::{Conn, Filter, TableQuery};

pub const TABLE: &str = "applications";

const WITH_VACANCY: &str =
    "*,vacancy:vacancies(*,company:companies(id,name,industry,logo_url))";
const WITH_STUDENT: &str =
    "*,student:profiles(id,full_name,email,avatar_url,cv_url,program_id)";

/// Statuses hidden from the company applicant list unless asked for.
const COMPLETED: &[&str] = &["completada", "terminada", "finalizada"];

/// `(vacancy_id, status)` of every application the student holds.
pub async fn marks(conn: Conn<'_>, student_id: &str) -> Result<Vec<ApplicationMark>, AppError> {
    conn.fetch(
        &TableQuery::new(TABLE)
            .select("vacancy_id,status")
            .eq("student_id", student_id),
    )
    .await
}

/// The student's applications with vacancy and company, newest first.
pub async fn list_for_student(
    conn: Conn<'_>,
    student_id: &str,
) -> Result<Vec<Application>, AppError> {
    conn.fetch(
        &TableQuery::new(TABLE)
            .select(WITH_VACANCY)
            .eq("student_id", student_id)
            .order("applied_at", false),
    )
    .await
}

/// Offers waiting on the student.
pub async fn offers(conn: Conn<'_>, student_id: &str) -> Result<Vec<Application>, AppError> {
    conn.fetch(
        &TableQuery::new(TABLE)
            .select(WITH_VACANCY)
            .eq("student_id", student_id)
            .eq("status", ApplicationStatus::Offer.as_str())
            .order("applied_at", false),
    )
    .await
}

pub async fn find(conn: Conn<'_>, id: &str) -> Result<Option<Application>, AppError> {
    conn.fetch_optional(&TableQuery::new(TABLE).select(WITH_VACANCY).eq("id", id))
        .await
}

/// Turn an offer down on the student's behalf.
pub async fn decline(
    conn: Conn<'_>,
    id: &str,
    student_id: &str,
) -> Result<Option<Application>, AppError> {
    let rows: Vec<Application> = conn
        .update(
            TABLE,
            &[Filter::eq("id", id), Filter::eq("student_id", student_id)],
            json!({
                "status": ApplicationStatus::Rejected.as_str(),
                "decision": DECISION_DECLINED,
                "decision_at": now_rfc3339(),
            }),
        )
        .await?;
    Ok(rows.into_iter().next())
}

/// Applicants across `vacancy_ids`, with the student profile, newest first.
pub async fn list_for_vacancies(
    conn: Conn<'_>,
    vacancy_ids: &[String],
    filter: &ApplicantFilter,
) -> Result<Vec<Application>, AppError> {
    if vacancy_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut query = TableQuery::new(TABLE)
        .select(WITH_STUDENT)
        .in_list("vacancy_id", vacancy_ids);
    if let Some(status) = filter.status.as_deref().filter(|s| !s.is_empty()) {
        query = query.eq("status", status);
    }
    if !filter.include_completed {
        query = query.not_in("status", COMPLETED.iter());
    }
    conn.fetch(&query.order("applied_at", false)).await
}

pub async fn list_for_students(
    conn: Conn<'_>,
    student_ids: &[String],
) -> Result<Vec<Application>, AppError> {
    if student_ids.is_empty() {
        return Ok(Vec::new());
    }
    conn.fetch(
        &TableQuery::new(TABLE)
            .select(WITH_VACANCY)
            .in_list("student_id", student_ids)
            .order("applied_at", false),
    )
    .await
}

/// Direct status write, stamping `updated_at`.
pub async fn set_status(
    conn: Conn<'_>,
    id: &str,
    status: &str,
) -> Result<Option<Application>, AppError> {
    let rows: Vec<Application> = conn
        .update(
            TABLE,
            &[Filter::eq("id", id)],
            json!({ "status": status, "updated_at": now_rfc3339() }),
        )
        .await?;
    Ok(rows.into_iter().next())
}

pub async fn delete_for_vacancy(conn: Conn<'_>, vacancy_id: &str) -> Result<(), AppError> {
    conn.delete(TABLE, &[Filter::eq("vacancy_id", vacancy_id)])
        .await
}
