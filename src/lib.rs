//! Gista Gateway - HTTP gateway for Gista content production
//!
//! Exposes a small backend-facing API for inspecting and transitioning the
//! production lifecycle of user-owned gists and their links, stored in a
//! multi-tenant document database with an unsettled schema. When a gist
//! transitions into production, the external workflow engine is notified.
//!
//! ## Services
//!
//! - **Schema Adapter**: uniform record location across the four storage
//!   shapes a user document may use (array, keyed map, embedded single,
//!   subcollection)
//! - **Status Engine**: merge-based status transitions with targeted
//!   leaf-path writes
//! - **Batch Coordinator**: best-effort multi-gist transitions with
//!   per-item outcomes
//! - **Workflow Notifier**: fire-and-observe call to the content approval
//!   engine

pub mod adapter;
pub mod config;
pub mod engine;
pub mod notify;
pub mod routes;
pub mod server;
pub mod service;
pub mod store;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use service::ContentService;
pub use types::{GatewayError, Result};
