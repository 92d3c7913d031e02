//! Table access. Every function takes a [`Conn`](crate::backend::Conn) bound
//! to the caller's token, so row-level security applies to each read and write.

pub mod applications;
pub mod companies;
pub mod groups;
pub mod notifications;
pub mod practices;
pub mod preferences;
pub mod profiles;
pub mod programs;
pub mod vacancies;

/// `updated_at` value for writes that stamp it.
pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
