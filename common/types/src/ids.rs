use uuid::Uuid;

/// Users carry the sequential id minted by the account system.
pub type UserId = i64;

pub type OrganizationId = Uuid;
pub type FlagId = Uuid;
pub type OverrideId = Uuid;

/// Opaque identifier for one live subscriber connection.
pub type ConnectionId = Uuid;
