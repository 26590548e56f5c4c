pub mod audit_models;
pub mod audit_trail;

pub use audit_models::{AuditKind, AuditRecord};
pub use audit_trail::AuditTrail;
