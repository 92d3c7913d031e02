//! What a student can do with a vacancy.
//!
//! One pure derivation, [`ActionState::derive`], is shared by every view that
//! shows an apply button. [`StudentStanding`] folds the student's application,
//! practice and preference rows into per-vacancy snapshots so callers never
//! rebuild the inputs by hand.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::application::{Application, ApplicationStatus};
use crate::practice::{Practice, PRACTICE_ACTIVE};
use crate::vacancy::Vacancy;

/// Inputs for one (student, vacancy) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EligibilitySnapshot {
    /// The student holds an active practice somewhere.
    pub has_active_practice: bool,
    /// That active practice is this vacancy.
    pub practicing_here: bool,
    /// An offer for this vacancy is waiting for the student.
    pub has_offer_here: bool,
    /// An application for this vacancy is still open.
    pub already_applied: bool,
    /// A previous placement at this vacancy was completed.
    pub completed_here: bool,
    pub spots_left: Option<i64>,
    pub vacancy_open: bool,
}

/// The button a student sees for a vacancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ActionState {
    PracticingHere,
    HasOfferHere,
    BlockedByActivePractice,
    AlreadyApplied,
    VacancyFull,
    EligibleToReapply,
    EligibleFresh,
}

/// What pressing the button does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum FollowUp {
    NavigateMyPractices,
    NavigateOffers,
    Apply,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ActionButton {
    pub state: ActionState,
    pub label: String,
    pub enabled: bool,
    pub follow_up: FollowUp,
    /// Navigation target for the `Navigate*` follow-ups.
    pub href: Option<String>,
    /// Ask the student to confirm before applying.
    pub requires_confirmation: bool,
}

impl ActionState {
    /// Precedence, highest first: practicing here, offer here, blocked by
    /// another active practice, already applied, full, reapply, fresh.
    pub fn derive(s: &EligibilitySnapshot) -> Self {
        if s.practicing_here {
            ActionState::PracticingHere
        } else if s.has_offer_here {
            ActionState::HasOfferHere
        } else if s.has_active_practice {
            ActionState::BlockedByActivePractice
        } else if s.already_applied {
            ActionState::AlreadyApplied
        } else if !s.vacancy_open || s.spots_left.is_some_and(|n| n <= 0) {
            ActionState::VacancyFull
        } else if s.completed_here {
            ActionState::EligibleToReapply
        } else {
            ActionState::EligibleFresh
        }
    }

    pub fn allows_apply(&self) -> bool {
        matches!(self, ActionState::EligibleFresh | ActionState::EligibleToReapply)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ActionState::PracticingHere => "Ya estás participando",
            ActionState::HasOfferHere => "¡Tienes una oferta!",
            ActionState::BlockedByActivePractice => "Ya tienes un proyecto activo",
            ActionState::AlreadyApplied => "Ya postulada",
            ActionState::VacancyFull => "Cupos agotados",
            ActionState::EligibleToReapply => "Postularse nuevamente",
            ActionState::EligibleFresh => "Postularse ahora",
        }
    }

    /// Explanation returned when an apply request is refused by this state.
    pub fn refusal_message(&self) -> Option<&'static str> {
        match self {
            ActionState::PracticingHere => Some("Ya estás participando en esta vacante."),
            ActionState::HasOfferHere => {
                Some("Ya tienes una oferta para esta vacante. Revísala en tus ofertas.")
            }
            ActionState::BlockedByActivePractice => {
                Some("Ya tienes un proyecto activo. No puedes postularte a otras vacantes.")
            }
            ActionState::AlreadyApplied => Some("Ya te habías postulado a esta vacante."),
            ActionState::VacancyFull => Some("Esta vacante ya no tiene cupos disponibles."),
            ActionState::EligibleToReapply | ActionState::EligibleFresh => None,
        }
    }

    pub fn button(&self) -> ActionButton {
        let (enabled, follow_up, href) = match self {
            ActionState::PracticingHere => (
                true,
                FollowUp::NavigateMyPractices,
                Some(crate::routes::STUDENT_PRACTICES),
            ),
            ActionState::HasOfferHere => {
                (true, FollowUp::NavigateOffers, Some(crate::routes::STUDENT_OFFERS))
            }
            ActionState::EligibleToReapply | ActionState::EligibleFresh => {
                (true, FollowUp::Apply, None)
            }
            _ => (false, FollowUp::None, None),
        };
        ActionButton {
            state: *self,
            label: self.label().to_string(),
            enabled,
            follow_up,
            href: href.map(str::to_string),
            requires_confirmation: *self == ActionState::EligibleToReapply,
        }
    }
}

/// Minimal application projection: `select("vacancy_id, status")`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationMark {
    #[serde(deserialize_with = "crate::common::de_id")]
    pub vacancy_id: String,
    pub status: ApplicationStatus,
}

/// Minimal practice projection: `select("vacancy_id, status")`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PracticeMark {
    #[serde(deserialize_with = "crate::common::de_id")]
    pub vacancy_id: String,
    pub status: String,
}

impl From<&Application> for ApplicationMark {
    fn from(application: &Application) -> Self {
        Self {
            vacancy_id: application.vacancy_id.clone(),
            status: application.status.clone(),
        }
    }
}

impl From<&Practice> for PracticeMark {
    fn from(practice: &Practice) -> Self {
        Self {
            vacancy_id: practice.vacancy_id.clone(),
            status: practice.status.clone(),
        }
    }
}

/// Everything known about one student that affects their buttons.
#[derive(Debug, Clone, Default)]
pub struct StudentStanding {
    statuses: HashMap<String, ApplicationStatus>,
    open: BTreeSet<String>,
    completed: BTreeSet<String>,
    offers: BTreeSet<String>,
    participating: BTreeSet<String>,
    active_elsewhere: bool,
    favorites: BTreeSet<String>,
    hidden: BTreeSet<String>,
}

impl StudentStanding {
    pub fn from_rows(applications: &[ApplicationMark], practices: &[PracticeMark]) -> Self {
        let mut standing = StudentStanding::default();
        for app in applications {
            let id = app.vacancy_id.clone();
            if app.status.is_completed() {
                standing.completed.insert(id.clone());
            }
            if app.status.is_offer() {
                standing.offers.insert(id.clone());
            }
            if app.status.is_open() {
                standing.open.insert(id.clone());
            }
            // Open and offer states win over history when a vacancy has several rows.
            let current = app.status.is_open() || app.status.is_offer();
            match standing.statuses.get(&id) {
                Some(prev) if !current && (prev.is_open() || prev.is_offer()) => {}
                _ => {
                    standing.statuses.insert(id, app.status.clone());
                }
            }
        }
        for practice in practices {
            if practice.status == PRACTICE_ACTIVE {
                standing.participating.insert(practice.vacancy_id.clone());
            }
        }
        standing
    }

    pub fn with_preferences(
        mut self,
        favorites: impl IntoIterator<Item = String>,
        hidden: impl IntoIterator<Item = String>,
    ) -> Self {
        self.favorites = favorites.into_iter().collect();
        self.hidden = hidden.into_iter().collect();
        self
    }

    /// Overlay the practice store's view, which may know about an active
    /// practice that the row snapshot predates.
    pub fn with_active_practice(mut self, active: bool) -> Self {
        self.active_elsewhere = active;
        self
    }

    pub fn has_active_practice(&self) -> bool {
        self.active_elsewhere || !self.participating.is_empty()
    }

    pub fn snapshot(&self, vacancy: &Vacancy) -> EligibilitySnapshot {
        let id = &vacancy.id;
        EligibilitySnapshot {
            has_active_practice: self.has_active_practice(),
            practicing_here: self.participating.contains(id),
            has_offer_here: self.offers.contains(id),
            already_applied: self.open.contains(id),
            completed_here: self.completed.contains(id),
            spots_left: vacancy.spots_left,
            vacancy_open: vacancy.is_open(),
        }
    }

    pub fn action_for(&self, vacancy: &Vacancy) -> ActionState {
        ActionState::derive(&self.snapshot(vacancy))
    }

    pub fn status_for(&self, vacancy_id: &str) -> Option<&ApplicationStatus> {
        self.statuses.get(vacancy_id)
    }

    pub fn is_favorite(&self, vacancy_id: &str) -> bool {
        self.favorites.contains(vacancy_id)
    }

    pub fn is_hidden(&self, vacancy_id: &str) -> bool {
        self.hidden.contains(vacancy_id)
    }

    pub fn hidden_ids(&self) -> impl Iterator<Item = &String> {
        self.hidden.iter()
    }

    /// Vacancies with an open application.
    pub fn applied_ids(&self) -> impl Iterator<Item = &String> {
        self.open.iter()
    }

    /// A successful apply: the vacancy is now applied and any stale
    /// completed or offer flags for it are cleared.
    pub fn record_applied(&mut self, vacancy_id: &str) {
        self.open.insert(vacancy_id.to_string());
        self.completed.remove(vacancy_id);
        self.offers.remove(vacancy_id);
        self.statuses
            .insert(vacancy_id.to_string(), ApplicationStatus::Applied);
    }

    /// The backend already had an application for this pair.
    pub fn record_duplicate(&mut self, vacancy_id: &str) {
        self.open.insert(vacancy_id.to_string());
        self.statuses
            .entry(vacancy_id.to_string())
            .or_insert(ApplicationStatus::Applied);
    }
}
