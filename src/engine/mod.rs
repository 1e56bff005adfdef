//! Status engine
//!
//! The write half of the gateway: merge-patching a gist's status
//! sub-record, the all-or-nothing gist-and-links cascade, and the
//! per-item batch update. All writes go through targeted [`WriteOp`]
//! batches so untouched sibling fields survive whatever shape the
//! user's records are in.
//!
//! [`WriteOp`]: crate::store::WriteOp

pub mod batch;
pub mod cascade;
pub mod status;

pub use batch::{batch_update_gists, BatchItem, BatchItemOutcome, BatchOutcome};
pub use cascade::update_gist_and_links;
pub use status::{merge_status, update_gist_status};
