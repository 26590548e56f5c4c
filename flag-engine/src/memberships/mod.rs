pub mod membership_index;
pub mod membership_models;
pub mod membership_service;

pub use membership_index::MembershipIndex;
pub use membership_models::{Membership, Role};
pub use membership_service::MembershipService;
