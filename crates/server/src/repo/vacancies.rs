use std::collections::HashMap;

use serde_json::{json, Value};
use shared_types::{
    sanitize_search_term, AppError, CompensationFilter, CreateVacancyRequest, Modality,
    UpdateVacancyRequest, Vacancy, VacancyProgram, VacancySearchParams, OPEN_VACANCY_STATUSES,
};

use super::now_rfc3339;
use crate::backend::{Conn, Filter, TableQuery};

pub const TABLE: &str = "vacancies";
pub const PROGRAMS_TABLE: &str = "vacancy_programs";

const WITH_COMPANY: &str = "*,company:companies(id,name,industry,logo_url)";
const WITH_COMPANY_IN_PROGRAM: &str =
    "*,company:companies(id,name,industry,logo_url),vacancy_programs!inner(program_id)";

/// Normalised search criteria built from the query string.
#[derive(Debug, Clone, Default)]
pub struct VacancySearch {
    pub text: Option<String>,
    pub location: Option<String>,
    pub modality: Option<Modality>,
    pub compensation: Option<CompensationFilter>,
    pub language: Option<String>,
    /// Only vacancies linked to this program through `vacancy_programs`.
    pub program_id: Option<String>,
    /// Vacancy ids to leave out (the student's hidden list).
    pub exclude: Vec<String>,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl VacancySearch {
    pub fn from_params(params: &VacancySearchParams) -> Self {
        Self {
            text: non_empty(params.q.as_deref())
                .map(|q| sanitize_search_term(&q))
                .filter(|q| !q.is_empty()),
            location: non_empty(params.loc.as_deref())
                .map(|l| sanitize_search_term(&l))
                .filter(|l| !l.is_empty()),
            modality: params.modality.as_deref().and_then(Modality::from_ui),
            compensation: params
                .compensation
                .as_deref()
                .and_then(CompensationFilter::from_ui),
            language: non_empty(params.language.as_deref()),
            program_id: None,
            exclude: Vec::new(),
        }
    }

    pub fn in_program(mut self, program_id: Option<&str>) -> Self {
        self.program_id = program_id.map(str::to_string);
        self
    }

    pub fn excluding<I: IntoIterator<Item = String>>(mut self, ids: I) -> Self {
        self.exclude = ids.into_iter().collect();
        self
    }

    /// Build the vacancy query. `company_ids` are companies whose name
    /// matched the free text.
    pub fn to_query(&self, company_ids: &[String], from: i64, to: i64) -> TableQuery {
        let projection = if self.program_id.is_some() {
            WITH_COMPANY_IN_PROGRAM
        } else {
            WITH_COMPANY
        };

        let mut query = TableQuery::new(TABLE)
            .select(projection)
            .in_list("status", OPEN_VACANCY_STATUSES.iter())
            .gt("spots_left", 0);

        if let Some(program) = &self.program_id {
            query = query.eq("vacancy_programs.program_id", program);
        }

        if let Some(text) = &self.text {
            let mut any = vec![
                Filter::contains("title", text),
                Filter::contains("location_text", text),
            ];
            if !company_ids.is_empty() {
                any.push(Filter::In("company_id".into(), company_ids.to_vec()));
            }
            query = query.or(any);
        }

        if let Some(location) = &self.location {
            query = query.filter(Filter::contains("location_text", location));
        }
        if let Some(modality) = self.modality {
            query = query.eq("modality", modality.as_db());
        }
        if let Some(compensation) = self.compensation {
            query = query.in_list("compensation", compensation.db_variants().iter());
        }
        if let Some(language) = &self.language {
            query = query.eq("language", language);
        }
        if !self.exclude.is_empty() {
            query = query.not_in("id", &self.exclude);
        }

        query.order("created_at", false).range(from, to)
    }
}

/// One page of open vacancies with seats.
///
/// Program-scoped searches also match on company name.
pub async fn search(
    conn: Conn<'_>,
    criteria: &VacancySearch,
    from: i64,
    to: i64,
) -> Result<Vec<Vacancy>, AppError> {
    let company_ids = match (&criteria.text, &criteria.program_id) {
        (Some(text), Some(_)) => super::companies::ids_matching_name(conn, text).await?,
        _ => Vec::new(),
    };
    conn.fetch(&criteria.to_query(&company_ids, from, to)).await
}

/// A vacancy with its company embedded.
pub async fn find(conn: Conn<'_>, id: &str) -> Result<Option<Vacancy>, AppError> {
    conn.fetch_optional(&TableQuery::new(TABLE).select(WITH_COMPANY).eq("id", id))
        .await
}

pub async fn find_many(conn: Conn<'_>, ids: &[String]) -> Result<Vec<Vacancy>, AppError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    conn.fetch(
        &TableQuery::new(TABLE)
            .select(WITH_COMPANY)
            .in_list("id", ids)
            .order("created_at", false),
    )
    .await
}

/// A company's vacancy, `None` when it does not exist or belongs to someone else.
pub async fn find_owned(
    conn: Conn<'_>,
    id: &str,
    company_id: &str,
) -> Result<Option<Vacancy>, AppError> {
    let vacancy = find(conn, id).await?;
    Ok(vacancy.filter(|v| v.company_id.as_deref() == Some(company_id)))
}

pub async fn list_by_company(conn: Conn<'_>, company_id: &str) -> Result<Vec<Vacancy>, AppError> {
    conn.fetch(
        &TableQuery::new(TABLE)
            .eq("company_id", company_id)
            .order("created_at", false),
    )
    .await
}

/// Columns a company edits, shared by create and update.
struct EditableFields<'a> {
    title: &'a str,
    modality: Modality,
    compensation: Option<&'a str>,
    language: Option<&'a str>,
    location_text: &'a str,
    requirements: &'a str,
    activities: &'a str,
    spots_total: i64,
    status: &'a str,
}

impl<'a> From<&'a CreateVacancyRequest> for EditableFields<'a> {
    fn from(req: &'a CreateVacancyRequest) -> Self {
        Self {
            title: &req.title,
            modality: req.modality,
            compensation: req.compensation.as_deref(),
            language: req.language.as_deref(),
            location_text: &req.location_text,
            requirements: &req.requirements,
            activities: &req.activities,
            spots_total: req.spots_total,
            status: &req.status,
        }
    }
}

impl<'a> From<&'a UpdateVacancyRequest> for EditableFields<'a> {
    fn from(req: &'a UpdateVacancyRequest) -> Self {
        Self {
            title: &req.title,
            modality: req.modality,
            compensation: req.compensation.as_deref(),
            language: req.language.as_deref(),
            location_text: &req.location_text,
            requirements: &req.requirements,
            activities: &req.activities,
            spots_total: req.spots_total,
            status: &req.status,
        }
    }
}

impl EditableFields<'_> {
    fn into_row(self) -> serde_json::Map<String, Value> {
        let mut row = serde_json::Map::new();
        row.insert("title".into(), json!(self.title.trim()));
        row.insert("modality".into(), json!(self.modality.as_db()));
        row.insert("compensation".into(), json!(self.compensation));
        row.insert("language".into(), json!(self.language));
        row.insert("location_text".into(), json!(self.location_text.trim()));
        row.insert("requirements".into(), json!(self.requirements.trim()));
        row.insert("activities".into(), json!(self.activities.trim()));
        row.insert("spots_total".into(), json!(self.spots_total));
        row.insert("status".into(), json!(self.status));
        row
    }
}

pub async fn insert(
    conn: Conn<'_>,
    company_id: &str,
    req: &CreateVacancyRequest,
) -> Result<Vacancy, AppError> {
    let mut row = EditableFields::from(req).into_row();
    row.insert("company_id".into(), Value::String(company_id.to_string()));

    let rows: Vec<Vacancy> = conn.insert(TABLE, Value::Object(row)).await?;
    rows.into_iter()
        .next()
        .ok_or_else(|| AppError::upstream("La vacante no se devolvió tras crearla"))
}

pub async fn update(
    conn: Conn<'_>,
    id: &str,
    company_id: &str,
    req: &UpdateVacancyRequest,
) -> Result<Option<Vacancy>, AppError> {
    let mut patch = EditableFields::from(req).into_row();
    patch.insert("updated_at".into(), Value::String(now_rfc3339()));

    let rows: Vec<Vacancy> = conn
        .update(
            TABLE,
            &[Filter::eq("id", id), Filter::eq("company_id", company_id)],
            Value::Object(patch),
        )
        .await?;
    Ok(rows.into_iter().next())
}

pub async fn set_status(
    conn: Conn<'_>,
    id: &str,
    company_id: &str,
    status: &str,
) -> Result<Option<Vacancy>, AppError> {
    let rows: Vec<Vacancy> = conn
        .update(
            TABLE,
            &[Filter::eq("id", id), Filter::eq("company_id", company_id)],
            json!({ "status": status }),
        )
        .await?;
    Ok(rows.into_iter().next())
}

pub async fn delete(conn: Conn<'_>, id: &str, company_id: &str) -> Result<(), AppError> {
    conn.delete(
        TABLE,
        &[Filter::eq("id", id), Filter::eq("company_id", company_id)],
    )
    .await
}

// ---------------------------------------------------------------------------
// vacancy_programs
// ---------------------------------------------------------------------------

/// Program ids per vacancy for the given vacancies.
pub async fn program_ids(
    conn: Conn<'_>,
    vacancy_ids: &[String],
) -> Result<HashMap<String, Vec<String>>, AppError> {
    let mut by_vacancy: HashMap<String, Vec<String>> = HashMap::new();
    if vacancy_ids.is_empty() {
        return Ok(by_vacancy);
    }
    let rows: Vec<VacancyProgram> = conn
        .fetch(
            &TableQuery::new(PROGRAMS_TABLE)
                .select("vacancy_id,program_id")
                .in_list("vacancy_id", vacancy_ids),
        )
        .await?;
    for row in rows {
        by_vacancy.entry(row.vacancy_id).or_default().push(row.program_id);
    }
    Ok(by_vacancy)
}

pub async fn insert_programs(
    conn: Conn<'_>,
    vacancy_id: &str,
    program_ids: &[String],
) -> Result<(), AppError> {
    if program_ids.is_empty() {
        return Ok(());
    }
    let rows: Vec<Value> = program_ids
        .iter()
        .map(|program| json!({ "vacancy_id": vacancy_id, "program_id": program }))
        .collect();
    conn.insert::<Value>(PROGRAMS_TABLE, Value::Array(rows)).await?;
    Ok(())
}

pub async fn delete_programs(conn: Conn<'_>, vacancy_id: &str) -> Result<(), AppError> {
    conn.delete(PROGRAMS_TABLE, &[Filter::eq("vacancy_id", vacancy_id)])
        .await
}

/// Replace the program links of a vacancy.
pub async fn replace_programs(
    conn: Conn<'_>,
    vacancy_id: &str,
    program_ids: &[String],
) -> Result<(), AppError> {
    delete_programs(conn, vacancy_id).await?;
    insert_programs(conn, vacancy_id, program_ids).await
}
