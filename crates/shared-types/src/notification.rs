use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How many notifications the bell shows.
pub const NOTIFICATION_FEED_LIMIT: i64 = 20;

/// A row of `notifications`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Notification {
    #[serde(deserialize_with = "crate::common::de_id")]
    pub id: String,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub action_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn is_unread(&self) -> bool {
        self.read_at.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NotificationFeed {
    pub unread_count: usize,
    pub items: Vec<Notification>,
}

impl NotificationFeed {
    pub fn new(items: Vec<Notification>) -> Self {
        Self {
            unread_count: items.iter().filter(|n| n.is_unread()).count(),
            items,
        }
    }
}

/// Payload for the `create_company_notification` procedure when an offer goes out.
#[derive(Debug, Clone, PartialEq)]
pub struct OfferNotice {
    pub title: String,
    pub body: String,
    pub action_url: String,
}

impl OfferNotice {
    pub fn new(company_name: &str, vacancy_title: &str) -> Self {
        Self {
            title: "¡Tienes una oferta! 🎉".to_string(),
            body: format!("{company_name} te ha enviado una oferta para: \"{vacancy_title}\""),
            action_url: crate::routes::STUDENT_OFFERS.to_string(),
        }
    }
}
