pub mod flag_models;
pub mod flag_resolution;
pub mod flag_service;

pub use flag_models::{Flag, FlagOverride, FlagPatch, FlagScope, FlagType, NewFlag};
pub use flag_resolution::FlagResolver;
pub use flag_service::FlagService;
