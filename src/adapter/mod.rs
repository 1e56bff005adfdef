//! Schema Adapter
//!
//! Users' gists and links were written by several generations of the
//! ingestion pipeline and live in one of four physical shapes: an ordered
//! `gists`/`links` array on the user document, a map keyed by stringified
//! ordinals, the user document's own fields (single-gist degenerate case),
//! or a per-user subcollection. No migration is assumed to have completed,
//! so the adapter must tolerate any of them per user.
//!
//! `shape` holds the pure scanning logic over a raw container document;
//! `locate` layers the subcollection strategy (which needs store access)
//! on top and fixes the resolution order.

pub mod locate;
pub mod shape;

pub use locate::RecordLocator;
pub use shape::{GistHome, LinkHome, LocatedGist, LocatedLink};
