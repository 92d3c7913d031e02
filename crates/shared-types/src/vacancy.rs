use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "validation")]
use validator::Validate;

use crate::common::{de_opt_id, fold_text};
use crate::eligibility::ActionButton;

/// Vacancy statuses that count as published.
pub const OPEN_VACANCY_STATUSES: &[&str] = &["activa", "active"];
pub const VACANCY_ACTIVE: &str = "activa";
pub const VACANCY_INACTIVE: &str = "inactiva";

/// Work arrangement. The database stores the accented Spanish value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum Modality {
    #[serde(rename = "presencial")]
    OnSite,
    #[serde(rename = "híbrido")]
    Hybrid,
    #[serde(rename = "remoto")]
    Remote,
}

impl Modality {
    pub fn as_db(&self) -> &'static str {
        match self {
            Modality::OnSite => "presencial",
            Modality::Hybrid => "híbrido",
            Modality::Remote => "remoto",
        }
    }

    /// Parse loose UI text ("Híbrida", "remota", "PRESENCIAL").
    pub fn from_ui(value: &str) -> Option<Self> {
        match fold_text(value).as_str() {
            "presencial" => Some(Modality::OnSite),
            "hibrida" | "hibrido" => Some(Modality::Hybrid),
            "remota" | "remoto" => Some(Modality::Remote),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Modality::OnSite => "Presencial",
            Modality::Hybrid => "Híbrida",
            Modality::Remote => "Remota",
        }
    }
}

/// Compensation filter. Legacy rows spell the same value several ways,
/// so each option expands to every stored variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompensationFilter {
    Stipend,
    Unpaid,
}

const STIPEND_VARIANTS: &[&str] = &[
    "apoyo_economico",
    "apoyo economico",
    "Apoyo económico",
    "apoyo económico",
    "APOYO ECONOMICO",
];
const UNPAID_VARIANTS: &[&str] = &["sin_apoyo", "sin apoyo", "Sin apoyo", "SIN APOYO"];

impl CompensationFilter {
    pub fn from_ui(value: &str) -> Option<Self> {
        match fold_text(&value.replace('_', " ")).as_str() {
            "apoyo economico" => Some(CompensationFilter::Stipend),
            "sin apoyo" => Some(CompensationFilter::Unpaid),
            _ => None,
        }
    }

    pub fn db_variants(&self) -> &'static [&'static str] {
        match self {
            CompensationFilter::Stipend => STIPEND_VARIANTS,
            CompensationFilter::Unpaid => UNPAID_VARIANTS,
        }
    }
}

/// Display label for a stored compensation value.
pub fn compensation_label(value: &str) -> &str {
    match CompensationFilter::from_ui(value) {
        Some(CompensationFilter::Stipend) => "Apoyo económico",
        Some(CompensationFilter::Unpaid) => "Sin apoyo",
        None => value,
    }
}

/// Company fields embedded into vacancy reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CompanyRef {
    #[serde(deserialize_with = "crate::common::de_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
}

/// A row of `vacancies`, optionally with its company embedded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Vacancy {
    #[serde(deserialize_with = "crate::common::de_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub modality: Option<String>,
    #[serde(default)]
    pub compensation: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub requirements: Option<String>,
    #[serde(default)]
    pub activities: Option<String>,
    #[serde(default)]
    pub location_text: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub spots_total: Option<i64>,
    #[serde(default)]
    pub spots_taken: Option<i64>,
    #[serde(default)]
    pub spots_left: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub company_id: Option<String>,
    #[serde(default)]
    pub rating_avg: Option<f64>,
    #[serde(default)]
    pub rating_count: Option<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<CompanyRef>,
}

impl Vacancy {
    pub fn is_open(&self) -> bool {
        self.status
            .as_deref()
            .map(|s| OPEN_VACANCY_STATUSES.contains(&s))
            .unwrap_or(false)
    }

    pub fn has_spots(&self) -> bool {
        self.spots_left.map(|n| n > 0).unwrap_or(true)
    }

    pub fn company_name(&self) -> &str {
        self.company
            .as_ref()
            .and_then(|c| c.name.as_deref())
            .unwrap_or("la empresa")
    }
}

/// A row of `companies`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Company {
    #[serde(deserialize_with = "crate::common::de_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Query string for vacancy searches.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams, utoipa::ToSchema))]
pub struct VacancySearchParams {
    /// Free text over title, location and company name.
    pub q: Option<String>,
    /// Location substring.
    pub loc: Option<String>,
    /// "Presencial", "Híbrida" or "Remota".
    pub modality: Option<String>,
    /// "Apoyo económico" or "Sin apoyo".
    pub compensation: Option<String>,
    pub language: Option<String>,
    /// Zero-based page.
    pub page: Option<i64>,
}

/// A vacancy as shown in a student's result list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct VacancyCard {
    #[serde(flatten)]
    pub vacancy: Vacancy,
    pub action: ActionButton,
    pub favorite: bool,
    /// Caption of the student's current application, if any.
    pub application_caption: Option<String>,
}

/// Vacancy page for a student.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct VacancyDetail {
    pub vacancy: Vacancy,
    pub action: ActionButton,
    pub favorite: bool,
    pub hidden: bool,
    pub application_status: Option<String>,
    pub application_caption: Option<String>,
}

fn default_spots() -> i64 {
    1
}

fn default_vacancy_status() -> String {
    VACANCY_ACTIVE.to_string()
}

/// New vacancy posted by a company.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct CreateVacancyRequest {
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 1, message = "Escribe un título para la vacante."))
    )]
    pub title: String,
    pub modality: Modality,
    #[serde(default)]
    pub compensation: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub location_text: String,
    #[serde(default)]
    pub requirements: String,
    #[serde(default)]
    pub activities: String,
    #[serde(default = "default_spots")]
    #[cfg_attr(
        feature = "validation",
        validate(range(min = 1, message = "Debe haber al menos un cupo"))
    )]
    pub spots_total: i64,
    #[serde(default = "default_vacancy_status")]
    pub status: String,
    #[serde(default)]
    pub program_ids: Vec<String>,
}

/// Full replacement of an existing vacancy's editable fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct UpdateVacancyRequest {
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 1, message = "Escribe un título para la vacante."))
    )]
    pub title: String,
    pub modality: Modality,
    #[serde(default)]
    pub compensation: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub location_text: String,
    #[serde(default)]
    pub requirements: String,
    #[serde(default)]
    pub activities: String,
    #[cfg_attr(
        feature = "validation",
        validate(range(min = 1, message = "Debe haber al menos un cupo"))
    )]
    pub spots_total: i64,
    pub status: String,
    #[serde(default)]
    pub program_ids: Vec<String>,
}

/// A row of `vacancy_programs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VacancyProgram {
    #[serde(deserialize_with = "crate::common::de_id")]
    pub vacancy_id: String,
    #[serde(deserialize_with = "crate::common::de_id")]
    pub program_id: String,
}

/// Vacancy as listed on the company dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CompanyVacancy {
    #[serde(flatten)]
    pub vacancy: Vacancy,
    pub program_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ToggleVacancyResponse {
    pub id: String,
    pub status: String,
}

/// Next status when a company flips a vacancy on or off.
pub fn toggled_status(current: Option<&str>) -> &'static str {
    match current {
        Some(s) if OPEN_VACANCY_STATUSES.contains(&s) => VACANCY_INACTIVE,
        _ => VACANCY_ACTIVE,
    }
}

/// Optional program id carried on profile-scoped searches.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProgramScope {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub program_id: Option<String>,
}
