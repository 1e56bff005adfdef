//! Per-item batch status updates
//!
//! Items are independent: a missing gist is skipped and reported, a
//! failing item does not roll back its predecessors. Only a missing user
//! fails the whole call.

use bson::Document;
use tracing::warn;

use crate::engine::status::update_gist_status;
use crate::store::UserStore;
use crate::types::{GatewayError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum BatchItemOutcome {
    /// Update landed; carries the updated gist record
    Updated(Document),
    /// No such gist for this user; skipped
    NotFound,
    /// Store-level failure for this item only
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub gist_id: String,
    pub outcome: BatchItemOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    /// Number of gists actually updated
    pub count: usize,
    pub items: Vec<BatchItem>,
}

/// Apply status patches to many gists of one user.
///
/// Each item re-reads current state, so earlier items' writes are visible
/// to later ones. Duplicate gist ids are processed (and counted) once per
/// occurrence.
pub async fn batch_update_gists(
    store: &dyn UserStore,
    user_id: &str,
    updates: Vec<(String, Document)>,
) -> Result<BatchOutcome> {
    // A missing user is call-fatal, checked up front
    store
        .load_user(user_id)
        .await?
        .ok_or_else(|| GatewayError::UserNotFound(user_id.to_string()))?;

    let mut count = 0;
    let mut items = Vec::with_capacity(updates.len());
    for (gist_id, patch) in updates {
        let outcome = match update_gist_status(store, user_id, &gist_id, &patch).await {
            Ok(updated) => {
                count += 1;
                BatchItemOutcome::Updated(updated)
            }
            Err(GatewayError::GistNotFound(_)) => BatchItemOutcome::NotFound,
            Err(GatewayError::UserNotFound(id)) => {
                return Err(GatewayError::UserNotFound(id));
            }
            Err(e) => {
                warn!(user_id, gist_id = %gist_id, error = %e, "batch item failed");
                BatchItemOutcome::Failed(e.to_string())
            }
        };
        items.push(BatchItem { gist_id, outcome });
    }

    Ok(BatchOutcome { count, items })
}
