//! Document store abstraction
//!
//! The gateway never talks to MongoDB directly from business logic. All
//! access goes through the [`UserStore`] trait so the real store and the
//! in-memory store are swapped at construction, not behind a module-level
//! dev-mode branch.
//!
//! Writes are expressed as [`WriteOp`] batches of dotted-path `$set`s plus
//! server-timestamp touches. A batch passed to [`UserStore::apply`] commits
//! atomically: inside a client-session transaction on MongoDB, under a
//! single lock in memory. Batch-of-one is the common case; multi-op batches
//! exist for the gist-and-links cascade, which must be all-or-nothing.

pub mod memory;
pub mod mongo;

use bson::{Bson, Document};

use crate::types::Result;

pub use memory::MemoryUserStore;
pub use mongo::MongoUserStore;

/// Per-user subcollection of records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubKind {
    Gists,
    Links,
}

/// A single targeted write against a user's records.
///
/// `set` entries are dotted leaf paths; `touch` paths receive a server
/// timestamp. Only the named paths are mutated - never the whole document.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Partial update of the user container document itself
    SetUserFields {
        set: Vec<(String, Bson)>,
        touch: Vec<String>,
    },
    /// Partial update of one record in a per-user subcollection
    SetSubFields {
        kind: SubKind,
        id: String,
        set: Vec<(String, Bson)>,
        touch: Vec<String>,
    },
    /// Replace the full link set belonging to a gist (subcollection shape)
    ReplaceGistLinks {
        gist_id: String,
        links: Vec<Document>,
    },
}

/// Store of user containers and their gist/link records.
///
/// Implementations must provide per-document write atomicity for a single
/// [`WriteOp`] and all-or-nothing semantics for a multi-op `apply` batch.
/// No caching across calls: every operation re-reads current state.
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    /// Load the raw user container document, whatever shape it is in
    async fn load_user(&self, user_id: &str) -> Result<Option<Document>>;

    /// Keyed O(1) lookup of one subcollection record
    async fn get_sub(&self, user_id: &str, kind: SubKind, id: &str) -> Result<Option<Document>>;

    /// List all records in a subcollection
    async fn list_subs(&self, user_id: &str, kind: SubKind) -> Result<Vec<Document>>;

    /// List subcollection links back-referencing a gist
    async fn list_links_for_gist(&self, user_id: &str, gist_id: &str) -> Result<Vec<Document>>;

    /// Atomically apply a batch of targeted writes for one user
    async fn apply(&self, user_id: &str, ops: Vec<WriteOp>) -> Result<()>;
}
