//! Depot API Library
//!
//! HTTP surface of the storage gateway: file handlers, error rendering and
//! application setup.

pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;
pub mod telemetry;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
