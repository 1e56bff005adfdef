//! Merge-patch of a gist's status sub-record

use bson::{Bson, Document};

use crate::adapter::{GistHome, RecordLocator};
use crate::store::{SubKind, UserStore, WriteOp};
use crate::types::gist::{GistStatus, UPDATED_AT_FIELD};
use crate::types::{GatewayError, Result};

/// Merge a status patch over whatever status the gist currently has.
///
/// Starts from the synthesized defaults, overlays the existing status (if
/// the stored value is a document at all), then overlays the patch. Fields
/// absent from the patch keep their current value; a gist with no status
/// record ends up with defaults-plus-patch.
pub fn merge_status(existing: Option<&Bson>, patch: &Document) -> Document {
    let mut merged = GistStatus::default_document();
    if let Some(Bson::Document(current)) = existing {
        for (key, value) in current {
            merged.insert(key.clone(), value.clone());
        }
    }
    for (key, value) in patch {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Write ops that set a located gist's status to `merged` and touch its
/// `updatedAt`, addressed to wherever the gist lives
pub fn gist_status_ops(home: &GistHome, merged: Document) -> WriteOp {
    match home {
        GistHome::Subcollection { id } => WriteOp::SetSubFields {
            kind: SubKind::Gists,
            id: id.clone(),
            set: vec![("status".to_string(), Bson::Document(merged))],
            touch: vec![UPDATED_AT_FIELD.to_string()],
        },
        _ => {
            // Container homes always yield field paths
            let set = home
                .field_path("status")
                .map(|path| (path, Bson::Document(merged)))
                .into_iter()
                .collect();
            let touch = home.field_path(UPDATED_AT_FIELD).into_iter().collect();
            WriteOp::SetUserFields { set, touch }
        }
    }
}

/// Apply a status patch to one gist and return the updated gist record
pub async fn update_gist_status(
    store: &dyn UserStore,
    user_id: &str,
    gist_id: &str,
    patch: &Document,
) -> Result<Document> {
    let container = store
        .load_user(user_id)
        .await?
        .ok_or_else(|| GatewayError::UserNotFound(user_id.to_string()))?;

    let locator = RecordLocator::new(store);
    let located = locator
        .locate_gist(user_id, &container, gist_id)
        .await?
        .ok_or_else(|| GatewayError::GistNotFound(gist_id.to_string()))?;

    let merged = merge_status(located.record.get("status"), patch);
    store
        .apply(user_id, vec![gist_status_ops(&located.home, merged.clone())])
        .await?;

    let mut updated = located.record;
    updated.insert("status", merged);
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryUserStore;
    use bson::doc;

    #[test]
    fn test_merge_synthesizes_defaults_when_status_missing() {
        let merged = merge_status(None, &doc! { "in_production": true });
        assert!(merged.get_bool("in_production").unwrap());
        assert_eq!(merged.get_str("production_status").unwrap(), "pending");
        assert_eq!(merged.get_f64("playback_time").unwrap(), 0.0);
    }

    #[test]
    fn test_merge_keeps_unpatched_fields() {
        let existing = Bson::Document(doc! {
            "production_status": "review",
            "playback_time": 42.5,
        });
        let merged = merge_status(Some(&existing), &doc! { "in_production": true });
        assert_eq!(merged.get_str("production_status").unwrap(), "review");
        assert_eq!(merged.get_f64("playback_time").unwrap(), 42.5);
        assert!(merged.get_bool("in_production").unwrap());
    }

    #[test]
    fn test_merge_tolerates_non_document_status() {
        let existing = Bson::String("corrupt".into());
        let merged = merge_status(Some(&existing), &doc! {});
        assert_eq!(merged.get_str("production_status").unwrap(), "pending");
    }

    #[tokio::test]
    async fn test_update_array_gist_leaves_siblings_untouched() {
        let store = MemoryUserStore::new();
        store
            .insert_user(
                "u1",
                doc! {
                    "username": "ada",
                    "gists": [
                        { "gistId": "g1", "title": "First" },
                        { "gistId": "g2", "title": "Second", "status": { "production_status": "draft" } },
                    ],
                },
            )
            .await;

        let updated =
            update_gist_status(&store, "u1", "g1", &doc! { "in_production": true }).await.unwrap();
        assert!(updated.get_document("status").unwrap().get_bool("in_production").unwrap());

        let user = store.load_user("u1").await.unwrap().unwrap();
        let gists = user.get_array("gists").unwrap();
        let g1 = gists[0].as_document().unwrap();
        assert!(g1.get_document("status").unwrap().get_bool("in_production").unwrap());
        assert!(matches!(g1.get("updatedAt"), Some(Bson::DateTime(_))));
        // sibling keeps its own status
        let g2 = gists[1].as_document().unwrap();
        assert_eq!(
            g2.get_document("status").unwrap().get_str("production_status").unwrap(),
            "draft"
        );
        assert_eq!(user.get_str("username").unwrap(), "ada");
    }

    #[tokio::test]
    async fn test_update_subcollection_gist() {
        let store = MemoryUserStore::new();
        store.insert_user("u1", doc! { "username": "ada" }).await;
        store
            .insert_gist("u1", "g1", doc! { "id": "g1", "title": "Sub" })
            .await;

        update_gist_status(&store, "u1", "g1", &doc! { "production_status": "review" })
            .await
            .unwrap();

        let gist = store
            .get_sub("u1", SubKind::Gists, "g1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            gist.get_document("status").unwrap().get_str("production_status").unwrap(),
            "review"
        );
        assert!(matches!(gist.get("updatedAt"), Some(Bson::DateTime(_))));
    }

    #[tokio::test]
    async fn test_same_patch_twice_yields_same_status() {
        let store = MemoryUserStore::new();
        store
            .insert_user("u1", doc! { "gists": [ { "gistId": "g1" } ] })
            .await;

        let patch = doc! { "in_production": true, "production_status": "review" };
        let first = update_gist_status(&store, "u1", "g1", &patch).await.unwrap();
        let second = update_gist_status(&store, "u1", "g1", &patch).await.unwrap();

        // same end state, timestamp aside (updatedAt lives outside status)
        assert_eq!(
            first.get_document("status").unwrap(),
            second.get_document("status").unwrap()
        );

        let user = store.load_user("u1").await.unwrap().unwrap();
        let stored = user.get_array("gists").unwrap()[0]
            .as_document()
            .unwrap()
            .get_document("status")
            .unwrap();
        assert_eq!(stored, second.get_document("status").unwrap());
    }

    #[tokio::test]
    async fn test_unknown_gist_is_not_found() {
        let store = MemoryUserStore::new();
        store.insert_user("u1", doc! { "gists": [] }).await;
        let err = update_gist_status(&store, "u1", "nope", &doc! {}).await.unwrap_err();
        assert!(matches!(err, GatewayError::GistNotFound(_)));
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let store = MemoryUserStore::new();
        let err = update_gist_status(&store, "nobody", "g1", &doc! {}).await.unwrap_err();
        assert!(matches!(err, GatewayError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn test_title_fallback_resolves_after_keyed_misses() {
        let store = MemoryUserStore::new();
        store
            .insert_user(
                "u1",
                doc! { "gists": [ { "gistId": "g1", "title": "My Story" } ] },
            )
            .await;

        let updated =
            update_gist_status(&store, "u1", "My Story", &doc! { "in_production": true })
                .await
                .unwrap();
        assert_eq!(updated.get_str("gistId").unwrap(), "g1");
    }
}
