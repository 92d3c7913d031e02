use serde::Deserialize;
use serde_json::json;
use shared_types::{AppError, Company};

use crate::backend::{Conn, Filter, TableQuery};

pub const TABLE: &str = "companies";

/// How many company ids a name search may contribute to a vacancy search.
pub const NAME_MATCH_LIMIT: i64 = 50;

/// The company owned by this user, if one was registered.
pub async fn find_by_owner(conn: Conn<'_>, owner_id: &str) -> Result<Option<Company>, AppError> {
    conn.fetch_optional(&TableQuery::new(TABLE).eq("owner_id", owner_id))
        .await
}

pub async fn create(
    conn: Conn<'_>,
    name: &str,
    email: &str,
    owner_id: &str,
) -> Result<Option<Company>, AppError> {
    let rows: Vec<Company> = conn
        .insert(
            TABLE,
            json!({ "name": name.trim(), "email": email.trim(), "owner_id": owner_id }),
        )
        .await?;
    Ok(rows.into_iter().next())
}

/// Ids of companies whose name contains `term`.
pub async fn ids_matching_name(conn: Conn<'_>, term: &str) -> Result<Vec<String>, AppError> {
    #[derive(Deserialize)]
    struct IdRow {
        #[serde(deserialize_with = "shared_types::de_id")]
        id: String,
    }

    let rows: Vec<IdRow> = conn
        .fetch(
            &TableQuery::new(TABLE)
                .select("id")
                .filter(Filter::contains("name", term))
                .limit(NAME_MATCH_LIMIT),
        )
        .await?;
    Ok(rows.into_iter().map(|r| r.id).collect())
}
