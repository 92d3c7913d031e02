use shared_types::{AppError, Program};

use crate::backend::{Conn, TableQuery};

pub const TABLE: &str = "programs";

/// All academic programs, alphabetical.
pub async fn list(conn: Conn<'_>) -> Result<Vec<Program>, AppError> {
    conn.fetch(
        &TableQuery::new(TABLE)
            .select("id,key,name,faculty")
            .order("name", true),
    )
    .await
}
