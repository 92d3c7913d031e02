use serde::Deserialize;
use serde_json::{json, Map, Value};
use shared_types::{
    AppError, AppErrorKind, CreateGroupRequest, Group, UpdateGroupRequest, DEFAULT_GROUP_COLOR,
};

use crate::backend::{Conn, Filter, TableQuery};

pub const TABLE: &str = "groups";
pub const MEMBERS_TABLE: &str = "group_members";

#[derive(Debug, Deserialize)]
struct Membership {
    #[serde(deserialize_with = "shared_types::de_id")]
    group_id: String,
    student_id: String,
}

/// The professor's groups, alphabetical.
pub async fn list_by_professor(conn: Conn<'_>, professor_id: &str) -> Result<Vec<Group>, AppError> {
    conn.fetch(
        &TableQuery::new(TABLE)
            .eq("professor_id", professor_id)
            .order("name", true),
    )
    .await
}

/// A group, only when owned by `professor_id`.
pub async fn find_owned(
    conn: Conn<'_>,
    id: &str,
    professor_id: &str,
) -> Result<Option<Group>, AppError> {
    conn.fetch_optional(
        &TableQuery::new(TABLE)
            .eq("id", id)
            .eq("professor_id", professor_id),
    )
    .await
}

pub async fn find_many(conn: Conn<'_>, ids: &[String]) -> Result<Vec<Group>, AppError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    conn.fetch(&TableQuery::new(TABLE).in_list("id", ids)).await
}

pub async fn create(
    conn: Conn<'_>,
    professor_id: &str,
    req: &CreateGroupRequest,
) -> Result<Group, AppError> {
    let color = req
        .color
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_GROUP_COLOR);
    let term = req.term.as_deref().map(str::trim).filter(|t| !t.is_empty());

    let rows: Vec<Group> = conn
        .insert(
            TABLE,
            json!({
                "professor_id": professor_id,
                "name": req.name.trim(),
                "color": color,
                "term": term,
                "hidden": false,
            }),
        )
        .await?;
    rows.into_iter()
        .next()
        .ok_or_else(|| AppError::upstream("El grupo no se devolvió tras crearlo"))
}

pub async fn update(
    conn: Conn<'_>,
    id: &str,
    professor_id: &str,
    req: &UpdateGroupRequest,
) -> Result<Option<Group>, AppError> {
    let mut patch = Map::new();
    if let Some(name) = &req.name {
        patch.insert("name".into(), Value::String(name.trim().to_string()));
    }
    if let Some(color) = &req.color {
        patch.insert("color".into(), Value::String(color.trim().to_string()));
    }
    if let Some(term) = &req.term {
        patch.insert("term".into(), Value::String(term.trim().to_string()));
    }
    if let Some(hidden) = req.hidden {
        patch.insert("hidden".into(), Value::Bool(hidden));
    }
    if patch.is_empty() {
        return find_owned(conn, id, professor_id).await;
    }

    let rows: Vec<Group> = conn
        .update(
            TABLE,
            &[Filter::eq("id", id), Filter::eq("professor_id", professor_id)],
            Value::Object(patch),
        )
        .await?;
    Ok(rows.into_iter().next())
}

pub async fn delete(conn: Conn<'_>, id: &str, professor_id: &str) -> Result<(), AppError> {
    conn.delete(
        TABLE,
        &[Filter::eq("id", id), Filter::eq("professor_id", professor_id)],
    )
    .await
}

// ---------------------------------------------------------------------------
// group_members
// ---------------------------------------------------------------------------

pub async fn member_ids(conn: Conn<'_>, group_id: &str) -> Result<Vec<String>, AppError> {
    let rows: Vec<Membership> = conn
        .fetch(
            &TableQuery::new(MEMBERS_TABLE)
                .select("group_id,student_id")
                .eq("group_id", group_id),
        )
        .await?;
    Ok(rows.into_iter().map(|m| m.student_id).collect())
}

pub async fn is_member(conn: Conn<'_>, group_id: &str, student_id: &str) -> Result<bool, AppError> {
    let row: Option<Membership> = conn
        .fetch_optional(
            &TableQuery::new(MEMBERS_TABLE)
                .select("group_id,student_id")
                .eq("group_id", group_id)
                .eq("student_id", student_id),
        )
        .await?;
    Ok(row.is_some())
}

/// Ids of the groups other than `group_id` that already hold this student.
pub async fn other_group_ids(
    conn: Conn<'_>,
    student_id: &str,
    group_id: &str,
) -> Result<Vec<String>, AppError> {
    let rows: Vec<Membership> = conn
        .fetch(
            &TableQuery::new(MEMBERS_TABLE)
                .select("group_id,student_id")
                .eq("student_id", student_id)
                .neq("group_id", group_id),
        )
        .await?;
    Ok(rows.into_iter().map(|m| m.group_id).collect())
}

/// Insert a membership. A duplicate row counts as success.
pub async fn add_member(conn: Conn<'_>, group_id: &str, student_id: &str) -> Result<(), AppError> {
    let row = json!({ "group_id": group_id, "student_id": student_id });
    match conn.insert::<Value>(MEMBERS_TABLE, row).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind == AppErrorKind::Conflict => Ok(()),
        Err(e) => Err(e),
    }
}

pub async fn remove_member(
    conn: Conn<'_>,
    group_id: &str,
    student_id: &str,
) -> Result<(), AppError> {
    conn.delete(
        MEMBERS_TABLE,
        &[
            Filter::eq("group_id", group_id),
            Filter::eq("student_id", student_id),
        ],
    )
    .await
}
