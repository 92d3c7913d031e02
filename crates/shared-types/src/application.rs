use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Profile;
use crate::vacancy::Vacancy;

/// Where an application stands. Values are the strings the backend stores;
/// anything unrecognised is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ApplicationStatus {
    Applied,
    Pending,
    UnderReview,
    InProcess,
    Reviewed,
    Interview,
    Offer,
    Accepted,
    Rejected,
    Completed,
    Finished,
    Closed,
    Withdrawn,
    Cancelled,
    Other(String),
}

impl ApplicationStatus {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "postulada" => ApplicationStatus::Applied,
            "pendiente" => ApplicationStatus::Pending,
            "en_revision" => ApplicationStatus::UnderReview,
            "en_proceso" => ApplicationStatus::InProcess,
            "revisada" => ApplicationStatus::Reviewed,
            "entrevista" => ApplicationStatus::Interview,
            "oferta" => ApplicationStatus::Offer,
            "aceptada" => ApplicationStatus::Accepted,
            "rechazada" => ApplicationStatus::Rejected,
            "completada" => ApplicationStatus::Completed,
            "terminada" => ApplicationStatus::Finished,
            "finalizada" => ApplicationStatus::Closed,
            "retirada" => ApplicationStatus::Withdrawn,
            "cancelada" => ApplicationStatus::Cancelled,
            _ => ApplicationStatus::Other(value.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ApplicationStatus::Applied => "postulada",
            ApplicationStatus::Pending => "pendiente",
            ApplicationStatus::UnderReview => "en_revision",
            ApplicationStatus::InProcess => "en_proceso",
            ApplicationStatus::Reviewed => "revisada",
            ApplicationStatus::Interview => "entrevista",
            ApplicationStatus::Offer => "oferta",
            ApplicationStatus::Accepted => "aceptada",
            ApplicationStatus::Rejected => "rechazada",
            ApplicationStatus::Completed => "completada",
            ApplicationStatus::Finished => "terminada",
            ApplicationStatus::Closed => "finalizada",
            ApplicationStatus::Withdrawn => "retirada",
            ApplicationStatus::Cancelled => "cancelada",
            ApplicationStatus::Other(s) => s.as_str(),
        }
    }

    /// The placement behind this application has ended.
    pub fn is_completed(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Completed | ApplicationStatus::Finished | ApplicationStatus::Closed
        )
    }

    /// Still in front of the company, so the student cannot apply again.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Applied
                | ApplicationStatus::Pending
                | ApplicationStatus::UnderReview
                | ApplicationStatus::InProcess
                | ApplicationStatus::Reviewed
                | ApplicationStatus::Interview
                | ApplicationStatus::Accepted
        )
    }

    pub fn is_offer(&self) -> bool {
        matches!(self, ApplicationStatus::Offer)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Rejected | ApplicationStatus::Withdrawn | ApplicationStatus::Cancelled
        )
    }

    /// Caption shown to the student.
    pub fn student_caption(&self) -> String {
        match self {
            ApplicationStatus::Applied | ApplicationStatus::Pending => "Postulación enviada",
            ApplicationStatus::UnderReview | ApplicationStatus::Reviewed => {
                "En revisión por la empresa"
            }
            ApplicationStatus::InProcess => "En proceso de selección",
            ApplicationStatus::Interview => "En entrevista",
            ApplicationStatus::Offer => "Oferta recibida",
            ApplicationStatus::Accepted => "Práctica activa",
            ApplicationStatus::Rejected => "No seleccionada",
            ApplicationStatus::Completed | ApplicationStatus::Finished => "Práctica completada",
            ApplicationStatus::Closed => "Práctica finalizada",
            ApplicationStatus::Withdrawn => "Postulación retirada",
            ApplicationStatus::Cancelled => "Cancelada",
            ApplicationStatus::Other(s) => return s.clone(),
        }
        .to_string()
    }

    /// Caption shown on the company's applicant list.
    pub fn company_caption(&self) -> String {
        match self {
            ApplicationStatus::Applied | ApplicationStatus::Pending => "Pendiente",
            ApplicationStatus::UnderReview | ApplicationStatus::Reviewed => "Revisada",
            ApplicationStatus::InProcess => "En proceso",
            ApplicationStatus::Interview => "En entrevista",
            ApplicationStatus::Offer => "Oferta enviada",
            ApplicationStatus::Accepted => "Práctica activa",
            ApplicationStatus::Completed | ApplicationStatus::Finished => "Práctica completada",
            ApplicationStatus::Closed => "Práctica finalizada",
            ApplicationStatus::Cancelled => "Cancelada",
            ApplicationStatus::Rejected => "Rechazada",
            ApplicationStatus::Withdrawn => "Retirada",
            ApplicationStatus::Other(s) if s.is_empty() => "Pendiente",
            ApplicationStatus::Other(s) => return s.clone(),
        }
        .to_string()
    }

    pub fn badge_tone(&self) -> BadgeTone {
        match self {
            ApplicationStatus::Applied | ApplicationStatus::Pending => BadgeTone::Warning,
            ApplicationStatus::UnderReview
            | ApplicationStatus::Reviewed
            | ApplicationStatus::InProcess
            | ApplicationStatus::Interview
            | ApplicationStatus::Offer => BadgeTone::Info,
            ApplicationStatus::Accepted => BadgeTone::Success,
            ApplicationStatus::Rejected | ApplicationStatus::Cancelled => BadgeTone::Error,
            _ => BadgeTone::Muted,
        }
    }
}

impl Serialize for ApplicationStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ApplicationStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ApplicationStatus::parse(&raw))
    }
}

/// Visual tone of a status badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum BadgeTone {
    Warning,
    Info,
    Success,
    Muted,
    Error,
}

/// A row of `applications`, with optional embedded vacancy and student.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Application {
    #[serde(deserialize_with = "crate::common::de_id")]
    pub id: String,
    pub student_id: String,
    #[serde(deserialize_with = "crate::common::de_id")]
    pub vacancy_id: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub status: ApplicationStatus,
    #[serde(default)]
    pub applied_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub decision: Option<String>,
    #[serde(default)]
    pub decision_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub offer_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub auto_declined: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vacancy: Option<Vacancy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student: Option<Profile>,
}

impl Application {
    /// An offer the student has not accepted yet.
    pub fn is_pending_offer(&self) -> bool {
        self.status.is_offer() && self.decision.as_deref() != Some(DECISION_ACCEPTED)
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self.status, ApplicationStatus::Accepted)
    }
}

/// Applicant row on the company side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApplicantView {
    #[serde(flatten)]
    pub application: Application,
    pub caption: String,
    pub tone: BadgeTone,
    pub can_offer: bool,
}

impl ApplicantView {
    pub fn new(application: Application, vacancy: Option<&Vacancy>) -> Self {
        let can_offer = vacancy
            .map(|v| can_send_offer(&application.status, v))
            .unwrap_or(false);
        Self {
            caption: application.status.company_caption(),
            tone: application.status.badge_tone(),
            can_offer,
            application,
        }
    }
}

/// Companies may only offer to fresh applicants of an open vacancy with seats.
pub fn can_send_offer(status: &ApplicationStatus, vacancy: &Vacancy) -> bool {
    *status == ApplicationStatus::Applied
        && vacancy.is_open()
        && vacancy.spots_left.map(|n| n > 0).unwrap_or(false)
}

/// Filter for the company's applicant list.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams, utoipa::ToSchema))]
pub struct ApplicantFilter {
    pub vacancy_id: Option<String>,
    pub status: Option<String>,
    /// Include completed or finished placements.
    #[serde(default)]
    pub include_completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApplyRequest {
    /// Required when the student is reapplying after a completed practice.
    #[serde(default)]
    pub confirm_reapply: bool,
}

/// How an apply attempt ended. Duplicates are an outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcomeKind {
    Applied,
    AlreadyApplied,
    NotAllowed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApplyOutcome {
    pub outcome: ApplyOutcomeKind,
    pub message: String,
    pub action: crate::eligibility::ActionButton,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SendOfferRequest {
    #[serde(default)]
    pub offer_note: Option<String>,
    #[serde(default)]
    pub days_to_expire: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SetApplicationStatusRequest {
    pub status: String,
}

/// Decision recorded when a student turns down an offer.
pub const DECISION_DECLINED: &str = "declined";
/// Decision recorded on an offer the student took.
pub const DECISION_ACCEPTED: &str = "accepted";
