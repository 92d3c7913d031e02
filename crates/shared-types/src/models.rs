use serde::{Deserialize, Serialize};

use crate::common::{de_id, de_opt_id};

/// Portal role stored in `profiles.role`.
///
/// - `Student`: searches and applies to vacancies. Also the fallback for a
///   missing or unknown role.
/// - `Professor`: owns groups of students and recommends vacancies.
/// - `Company`: publishes vacancies and reviews applicants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Professor,
    Company,
}

impl Role {
    /// Parse a profile role. Unknown values default to `Student`.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "professor" => Role::Professor,
            "company" => Role::Company,
            _ => Role::Student,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Professor => "professor",
            Role::Company => "company",
        }
    }

    /// Landing page after login, and the redirect target when a signed-in
    /// user opens an auth page.
    pub fn home_path(&self) -> &'static str {
        match self {
            Role::Professor => crate::routes::PROFESSOR_HOME,
            Role::Company => crate::routes::COMPANY_HOME,
            Role::Student => crate::routes::STUDENT_HOME,
        }
    }

    /// Guess a role from the institutional email domain.
    ///
    /// Only used when a freshly signed-in user has no profile row yet.
    /// Anything outside both domains is treated as a company account.
    pub fn from_email_domain(email: &str, professor_domain: &str, student_domain: &str) -> Self {
        let email = email.trim().to_lowercase();
        // The student domain is a subdomain of the professor one, so test it first.
        if !student_domain.is_empty() && email.ends_with(&student_domain.to_lowercase()) {
            Role::Student
        } else if !professor_domain.is_empty() && email.ends_with(&professor_domain.to_lowercase()) {
            Role::Professor
        } else {
            Role::Company
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row of `profiles`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub cv_url: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub program_id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub institute_id: Option<String>,
    #[serde(default)]
    pub office: Option<String>,
    #[serde(default)]
    pub office_hours: Option<String>,
}

impl Profile {
    pub fn role(&self) -> Role {
        self.role
            .as_deref()
            .map(Role::from_str_or_default)
            .unwrap_or_default()
    }
}

/// A row of `programs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Program {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub key: Option<String>,
    pub name: String,
    #[serde(default)]
    pub faculty: Option<String>,
}

/// A row of `institutes`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Institute {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub code: Option<String>,
    pub name: String,
}

/// Editable profile fields. Only the fields present are written.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(validator::Validate))]
pub struct UpdateProfileRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "validation", validate(length(min = 2, max = 120, message = "El nombre debe tener entre 2 y 120 caracteres")))]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institute_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "validation", validate(length(max = 120, message = "Máximo 120 caracteres")))]
    pub office: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "validation", validate(length(max = 240, message = "Máximo 240 caracteres")))]
    pub office_hours: Option<String>,
}

impl UpdateProfileRequest {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.program_id.is_none()
            && self.institute_id.is_none()
            && self.office.is_none()
            && self.office_hours.is_none()
    }
}

/// URL of a freshly uploaded file, with a cache-busting query appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UploadResponse {
    pub url: String,
}
