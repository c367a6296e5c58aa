//! Centralized error handling module
//!
//! Typed errors for the transport core and its collaborators. `anyhow` stays
//! at the binary edge and inside event sinks.

pub mod context;
pub mod types;

pub use context::ErrorContextExt;
pub use types::{RelayError, RelayResult};

/// Sink failures arrive as `anyhow` errors; keep the whole context chain
impl From<anyhow::Error> for RelayError {
    fn from(err: anyhow::Error) -> Self {
        RelayError::Other {
            detail: format!("{err:#}"),
        }
    }
}
