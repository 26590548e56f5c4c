pub mod registry;

pub use registry::{ChangeBroadcaster, Subscriber};
