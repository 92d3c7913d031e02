pub mod error;
pub mod feature_flags;

pub mod models;
pub mod requests;
pub mod routes;

// Portal domain modules
pub mod application;
pub mod common;
pub mod eligibility;
pub mod group;
pub mod notification;
pub mod practice;
pub mod sequence;
pub mod vacancy;

pub use error::*;
pub use feature_flags::*;
pub use models::*;
pub use requests::*;

pub use application::*;
pub use common::*;
pub use eligibility::*;
pub use group::*;
pub use notification::*;
pub use practice::*;
pub use sequence::*;
pub use vacancy::*;
