//! Typed wrappers over the remote procedures. Argument names must match the
//! database function signatures exactly.

use serde_json::{json, Value};
use shared_types::{AppError, OfferNotice};

use super::Conn;
use crate::config::ApplyProcedure;

/// Days an offer stays open when the company does not say otherwise.
pub const DEFAULT_OFFER_DAYS: i64 = 5;

/// Numeric ids go over the wire as numbers, everything else as strings.
fn id_value(id: &str) -> Value {
    id.parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(id.to_string()))
}

async fn call(conn: Conn<'_>, name: &str, args: Value) -> Result<Value, AppError> {
    conn.backend
        .rpc(conn.token, name, args)
        .await
        .map_err(AppError::from)
}

/// Create the application and notify the company in one step.
pub async fn apply(
    conn: Conn<'_>,
    procedure: ApplyProcedure,
    vacancy_id: &str,
) -> Result<Value, AppError> {
    call(conn, procedure.name(), json!({ "p_vacancy_id": id_value(vacancy_id) })).await
}

pub async fn mark_notifications_as_read(conn: Conn<'_>) -> Result<(), AppError> {
    call(conn, "mark_notifications_as_read", json!({})).await?;
    Ok(())
}

pub async fn complete_practice_with_rating(
    conn: Conn<'_>,
    student_id: &str,
    rating: i32,
) -> Result<(), AppError> {
    call(
        conn,
        "complete_practice_with_rating",
        json!({ "p_student_id": student_id, "p_rating": rating }),
    )
    .await?;
    Ok(())
}

pub async fn student_accept_offer(conn: Conn<'_>, application_id: &str) -> Result<(), AppError> {
    call(
        conn,
        "student_accept_offer",
        json!({ "p_app_id": id_value(application_id) }),
    )
    .await?;
    Ok(())
}

pub async fn company_accept_application(
    conn: Conn<'_>,
    application_id: &str,
    offer_note: Option<&str>,
    days_to_expire: Option<i64>,
) -> Result<(), AppError> {
    call(
        conn,
        "company_accept_application",
        json!({
            "p_application_id": id_value(application_id),
            "p_offer_note": offer_note,
            "p_days_to_expire": days_to_expire.unwrap_or(DEFAULT_OFFER_DAYS),
        }),
    )
    .await?;
    Ok(())
}

pub async fn company_set_application_status(
    conn: Conn<'_>,
    application_id: &str,
    status: &str,
    offer_days: i64,
) -> Result<(), AppError> {
    call(
        conn,
        "company_set_application_status",
        json!({
            "p_app_id": id_value(application_id),
            "p_status": status,
            "p_offer_days": offer_days,
        }),
    )
    .await?;
    Ok(())
}

pub async fn professor_recommend_vacancy(
    conn: Conn<'_>,
    vacancy_id: &str,
    student_id: &str,
) -> Result<(), AppError> {
    call(
        conn,
        "professor_recommend_vacancy",
        json!({ "p_vacancy_id": id_value(vacancy_id), "p_student_id": student_id }),
    )
    .await?;
    Ok(())
}

pub async fn create_company_notification(
    conn: Conn<'_>,
    student_id: &str,
    application_id: &str,
    kind: &str,
    notice: &OfferNotice,
) -> Result<(), AppError> {
    call(
        conn,
        "create_company_notification",
        json!({
            "p_student_id": student_id,
            "p_application_id": id_value(application_id),
            "p_type": kind,
            "p_title": notice.title,
            "p_body": notice.body,
            "p_action_url": notice.action_url,
        }),
    )
    .await?;
    Ok(())
}
