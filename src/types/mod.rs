//! Shared types for the Gista gateway

pub mod error;
pub mod gist;

pub use error::{GatewayError, Result};
pub use gist::{GistStatus, ProductionStatus};
