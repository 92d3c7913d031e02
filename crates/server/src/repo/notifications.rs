use shared_types::{AppError, Notification, NOTIFICATION_FEED_LIMIT};

use crate::backend::{Conn, TableQuery};

pub const TABLE: &str = "notifications";

/// The latest notifications addressed to this user.
pub async fn latest(conn: Conn<'_>, user_id: &str) -> Result<Vec<Notification>, AppError> {
    conn.fetch(
        &TableQuery::new(TABLE)
            .eq("student_id", user_id)
            .order("created_at", false)
            .limit(NOTIFICATION_FEED_LIMIT),
    )
    .await
}
