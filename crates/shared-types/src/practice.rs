use serde::{Deserialize, Serialize};

#[cfg(feature = "validation")]
use validator::Validate;

use crate::application::Application;
use crate::models::Profile;
use crate::vacancy::Vacancy;

pub const PRACTICE_ACTIVE: &str = "active";
pub const PRACTICE_COMPLETED: &str = "completed";

/// A row of `practices`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Practice {
    #[serde(default, deserialize_with = "crate::common::de_opt_id")]
    pub id: Option<String>,
    pub student_id: String,
    #[serde(deserialize_with = "crate::common::de_id")]
    pub vacancy_id: String,
    pub status: String,
    #[serde(default)]
    pub rating: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vacancy: Option<Vacancy>,
}

impl Practice {
    pub fn is_active(&self) -> bool {
        self.status == PRACTICE_ACTIVE
    }
}

/// Whether a student currently holds an active practice.
///
/// `loading` is true while the first fetch for the student is in flight and
/// `error` carries the last fetch failure, if any.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PracticeState {
    pub has_active_practice: bool,
    pub vacancy_id: Option<String>,
    pub loading: bool,
    pub error: Option<String>,
}

impl PracticeState {
    pub fn loading() -> Self {
        Self {
            loading: true,
            ..Default::default()
        }
    }
}

/// Rating given when the student closes their practice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct CompletePracticeRequest {
    #[cfg_attr(
        feature = "validation",
        validate(range(min = 1, max = 5, message = "La calificación debe estar entre 1 y 5"))
    )]
    pub rating: i32,
}

/// Everything the "mis prácticas" view needs in one response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PracticeOverview {
    pub profile: Option<Profile>,
    pub active_practice: Option<Practice>,
    /// Open applications and offers.
    pub applied: Vec<Application>,
    pub completed: Vec<Application>,
    pub favorites: Vec<Vacancy>,
}
