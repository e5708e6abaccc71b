pub mod service;

pub use service::{PendingService, SweepReport};
