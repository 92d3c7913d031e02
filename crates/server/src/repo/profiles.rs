use serde::Deserialize;
use serde_json::{Map, Value};
use shared_types::{AppError, Profile, Role, UpdateProfileRequest};

use crate::backend::{Conn, Filter, TableQuery};

pub const TABLE: &str = "profiles";

/// Columns a professor sees when looking students up.
const STUDENT_COLUMNS: &str = "id,full_name,email,avatar_url,cv_url,program_id,role";

/// Find a profile by user id.
pub async fn find(conn: Conn<'_>, user_id: &str) -> Result<Option<Profile>, AppError> {
    conn.fetch_optional(&TableQuery::new(TABLE).eq("id", user_id))
        .await
}

/// Only the role column. `None` when the row or the value is missing.
pub async fn role_of(conn: Conn<'_>, user_id: &str) -> Result<Option<Role>, AppError> {
    #[derive(Deserialize)]
    struct RoleRow {
        #[serde(default)]
        role: Option<String>,
    }

    let row: Option<RoleRow> = conn
        .fetch_optional(&TableQuery::new(TABLE).select("role").eq("id", user_id))
        .await?;

    Ok(row
        .and_then(|r| r.role)
        .map(|r| Role::from_str_or_default(&r)))
}

/// Write the fields present in `req`. Empty ids clear the column.
pub async fn update(
    conn: Conn<'_>,
    user_id: &str,
    req: &UpdateProfileRequest,
) -> Result<Option<Profile>, AppError> {
    let mut patch = Map::new();
    if let Some(name) = &req.full_name {
        patch.insert("full_name".into(), Value::String(name.trim().to_string()));
    }
    for (column, value) in [("program_id", &req.program_id), ("institute_id", &req.institute_id)] {
        if let Some(id) = value {
            let id = id.trim();
            let value = if id.is_empty() {
                Value::Null
            } else {
                Value::String(id.to_string())
            };
            patch.insert(column.into(), value);
        }
    }
    for (column, value) in [("office", &req.office), ("office_hours", &req.office_hours)] {
        if let Some(text) = value {
            patch.insert(column.into(), Value::String(text.trim().to_string()));
        }
    }

    let rows: Vec<Profile> = conn
        .update(TABLE, &[Filter::eq("id", user_id)], Value::Object(patch))
        .await?;
    Ok(rows.into_iter().next())
}

/// Stamp the role (and optionally the display name) on a profile.
pub async fn set_role(
    conn: Conn<'_>,
    user_id: &str,
    role: Role,
    full_name: Option<&str>,
) -> Result<(), AppError> {
    let mut patch = Map::new();
    patch.insert("role".into(), Value::String(role.as_str().to_string()));
    if let Some(name) = full_name {
        patch.insert("full_name".into(), Value::String(name.trim().to_string()));
    }
    conn.update::<Value>(TABLE, &[Filter::eq("id", user_id)], Value::Object(patch))
        .await?;
    Ok(())
}

/// Set or clear a file URL column (`cv_url`, `avatar_url`).
pub async fn set_file_url(
    conn: Conn<'_>,
    user_id: &str,
    column: &str,
    url: Option<&str>,
) -> Result<(), AppError> {
    let mut patch = Map::new();
    patch.insert(
        column.to_string(),
        url.map(|u| Value::String(u.to_string())).unwrap_or(Value::Null),
    );
    conn.update::<Value>(TABLE, &[Filter::eq("id", user_id)], Value::Object(patch))
        .await?;
    Ok(())
}

pub async fn find_many(conn: Conn<'_>, ids: &[String]) -> Result<Vec<Profile>, AppError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    conn.fetch(
        &TableQuery::new(TABLE)
            .select(STUDENT_COLUMNS)
            .in_list("id", ids)
            .order("full_name", true),
    )
    .await
}

/// Students whose name or email contains `term`, optionally limited to one program.
pub async fn search_students(
    conn: Conn<'_>,
    term: &str,
    program_id: Option<&str>,
    limit: i64,
) -> Result<Vec<Profile>, AppError> {
    let mut query = TableQuery::new(TABLE)
        .select(STUDENT_COLUMNS)
        .eq("role", Role::Student.as_str())
        .or(vec![
            Filter::contains("full_name", term),
            Filter::contains("email", term),
        ]);
    if let Some(program) = program_id {
        query = query.eq("program_id", program);
    }
    conn.fetch(&query.order("full_name", true).limit(limit)).await
}
