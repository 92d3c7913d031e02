use serde::{Deserialize, Serialize};

#[cfg(feature = "validation")]
use validator::Validate;

use crate::application::Application;
use crate::eligibility::{ActionButton, ApplicationMark, PracticeMark, StudentStanding};
use crate::models::Profile;
use crate::practice::Practice;
use crate::vacancy::Vacancy;

pub const DEFAULT_GROUP_COLOR: &str = "#1F3354";

/// A professor-owned cohort of students.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Group {
    #[serde(deserialize_with = "crate::common::de_id")]
    pub id: String,
    #[serde(default)]
    pub professor_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub term: Option<String>,
    #[serde(default)]
    pub hidden: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct CreateGroupRequest {
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 1, message = "Ponle nombre al grupo."))
    )]
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub term: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct UpdateGroupRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 1, message = "Ponle nombre al grupo."))
    )]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AddMemberRequest {
    pub student_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AddMemberResponse {
    pub group_id: String,
    pub student_id: String,
    /// True when the student was already in this group.
    pub already_member: bool,
}

/// A student row inside a group, with the data the professor tracks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MemberOverview {
    pub student: Profile,
    pub has_active_practice: bool,
    pub active_vacancy_id: Option<String>,
    /// Vacancies where an application reached `aceptada`.
    pub accepted_vacancy_ids: Vec<String>,
    /// Offers still waiting on the student.
    pub pending_offers: usize,
    pub applications: Vec<Application>,
    pub practices: Vec<Practice>,
}

impl MemberOverview {
    pub fn new(student: Profile, applications: Vec<Application>, practices: Vec<Practice>) -> Self {
        let standing = standing_of(&applications, &practices);
        let active = practices.iter().find(|p| p.is_active());
        Self {
            has_active_practice: standing.has_active_practice(),
            active_vacancy_id: active.map(|p| p.vacancy_id.clone()),
            accepted_vacancy_ids: applications
                .iter()
                .filter(|a| a.is_accepted())
                .map(|a| a.vacancy_id.clone())
                .collect(),
            pending_offers: applications.iter().filter(|a| a.is_pending_offer()).count(),
            student,
            applications,
            practices,
        }
    }
}

/// Fold full rows into the same standing the student's own views use.
pub fn standing_of(applications: &[Application], practices: &[Practice]) -> StudentStanding {
    let marks: Vec<ApplicationMark> = applications.iter().map(ApplicationMark::from).collect();
    let practice_marks: Vec<PracticeMark> = practices.iter().map(PracticeMark::from).collect();
    StudentStanding::from_rows(&marks, &practice_marks)
}

/// A vacancy as a professor sees it, optionally through one student's eyes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ProfessorVacancyView {
    #[serde(flatten)]
    pub vacancy: Vacancy,
    /// What the student in `?student_id=` would see on the apply button.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_action: Option<ActionButton>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams, utoipa::ToSchema))]
pub struct ProfessorVacancyParams {
    pub student_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GroupDetail {
    pub group: Group,
    pub members: Vec<MemberOverview>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams, utoipa::ToSchema))]
pub struct StudentSearchParams {
    /// Name or email fragment, at least two characters.
    pub q: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RecommendRequest {
    pub student_id: String,
}
