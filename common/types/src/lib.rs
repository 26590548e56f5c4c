mod ids;

pub use ids::ConnectionId;
pub use ids::FlagId;
pub use ids::OrganizationId;
pub use ids::OverrideId;
pub use ids::UserId;
