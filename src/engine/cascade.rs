//! Gist-and-links cascade
//!
//! One status change fanned out to the gist and every link that
//! back-references it, committed as a single all-or-nothing batch. Links
//! carry their production fields at the TOP level of the link record,
//! unlike gists, which nest them under `status`.

use bson::{doc, Bson, Document};

use crate::adapter::shape::link_gist_ref;
use crate::adapter::{LinkHome, RecordLocator};
use crate::engine::status::{gist_status_ops, merge_status};
use crate::store::{SubKind, UserStore, WriteOp};
use crate::types::gist::{GIST_CREATED_FIELD, LINKS_FIELD, UPDATED_AT_FIELD};
use crate::types::{GatewayError, Result};

fn link_patch_fields(merged: &Document) -> Vec<(String, Bson)> {
    let in_production = merged.get_bool("in_production").unwrap_or(false);
    let production_status = merged.get_str("production_status").unwrap_or("pending");
    vec![
        ("in_production".to_string(), Bson::Boolean(in_production)),
        (
            "production_status".to_string(),
            Bson::String(production_status.to_string()),
        ),
    ]
}

fn link_patch_op(home: &LinkHome, fields: &[(String, Bson)]) -> WriteOp {
    match home {
        LinkHome::Subcollection { id } => WriteOp::SetSubFields {
            kind: SubKind::Links,
            id: id.clone(),
            set: fields.to_vec(),
            touch: vec![UPDATED_AT_FIELD.to_string()],
        },
        _ => {
            let set = fields
                .iter()
                .filter_map(|(field, value)| {
                    home.field_path(field).map(|path| (path, value.clone()))
                })
                .collect();
            let touch = home.field_path(UPDATED_AT_FIELD).into_iter().collect();
            WriteOp::SetUserFields { set, touch }
        }
    }
}

fn replacement_link_doc(gist_id: &str, index: usize, url: &str, fields: &[(String, Bson)]) -> Document {
    let mut link = doc! {
        "id": format!("{}-link-{}", gist_id, index),
        "url": url,
        "gistId": gist_id,
    };
    link.insert(GIST_CREATED_FIELD, true);
    for (field, value) in fields {
        link.insert(field.clone(), value.clone());
    }
    link
}

/// Ops that replace the gist's link set with freshly-built records,
/// addressed to wherever the user's links currently live
fn replace_links_ops(
    container: &Document,
    gist_id: &str,
    urls: &[String],
    fields: &[(String, Bson)],
) -> Vec<WriteOp> {
    let fresh: Vec<Document> = urls
        .iter()
        .enumerate()
        .map(|(index, url)| replacement_link_doc(gist_id, index, url, fields))
        .collect();

    match container.get(LINKS_FIELD) {
        Some(Bson::Array(existing)) => {
            let mut items: Vec<Bson> = existing
                .iter()
                .filter(|item| match item {
                    Bson::Document(record) => link_gist_ref(record) != Some(gist_id),
                    _ => true,
                })
                .cloned()
                .collect();
            items.extend(fresh.into_iter().map(Bson::Document));
            vec![WriteOp::SetUserFields {
                set: vec![(LINKS_FIELD.to_string(), Bson::Array(items))],
                touch: vec![UPDATED_AT_FIELD.to_string()],
            }]
        }
        Some(Bson::Document(existing)) => {
            let mut map = Document::new();
            for (key, value) in existing {
                let keep = match value {
                    Bson::Document(record) => link_gist_ref(record) != Some(gist_id),
                    _ => true,
                };
                if keep {
                    map.insert(key.clone(), value.clone());
                }
            }
            for link in fresh {
                let key = link.get_str("id").unwrap_or_default().to_string();
                map.insert(key, Bson::Document(link));
            }
            vec![WriteOp::SetUserFields {
                set: vec![(LINKS_FIELD.to_string(), Bson::Document(map))],
                touch: vec![UPDATED_AT_FIELD.to_string()],
            }]
        }
        _ => vec![WriteOp::ReplaceGistLinks {
            gist_id: gist_id.to_string(),
            links: fresh,
        }],
    }
}

/// Apply a status patch to a gist and cascade it to the gist's links.
///
/// With `replacement_urls` the gist's link set is replaced outright;
/// without, every existing link back-referencing the gist has its
/// top-level production fields patched. Either way the whole batch
/// commits atomically. Returns the updated gist record.
pub async fn update_gist_and_links(
    store: &dyn UserStore,
    user_id: &str,
    gist_id: &str,
    status_patch: &Document,
    replacement_urls: Option<&[String]>,
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

    let merged = merge_status(located.record.get("status"), status_patch);
    let fields = link_patch_fields(&merged);

    let mut ops = vec![gist_status_ops(&located.home, merged.clone())];
    match replacement_urls {
        Some(urls) => {
            ops.extend(replace_links_ops(&container, gist_id, urls, &fields));
        }
        None => {
            for (home, _) in locator.list_links_for_gist(user_id, &container, gist_id).await? {
                ops.push(link_patch_op(&home, &fields));
            }
        }
    }

    store.apply(user_id, ops).await?;

    let mut updated = located.record;
    updated.insert("status", merged);
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryUserStore;

    fn seeded() -> Document {
        doc! {
            "username": "ada",
            "gists": [ { "gistId": "g1", "title": "First" } ],
            "links": [
                { "id": "l1", "url": "https://a", "gistId": "g1" },
                { "id": "l2", "url": "https://b", "gistId": "g2" },
            ],
        }
    }

    #[tokio::test]
    async fn test_cascade_patches_links_at_top_level() {
        let store = MemoryUserStore::new();
        store.insert_user("u1", seeded()).await;

        update_gist_and_links(
            &store,
            "u1",
            "g1",
            &doc! { "in_production": true, "production_status": "review" },
            None,
        )
        .await
        .unwrap();

        let user = store.load_user("u1").await.unwrap().unwrap();
        let links = user.get_array("links").unwrap();
        let l1 = links[0].as_document().unwrap();
        assert!(l1.get_bool("in_production").unwrap());
        assert_eq!(l1.get_str("production_status").unwrap(), "review");
        // production fields sit at the top of the link, not under status
        assert!(!l1.contains_key("status"));
        // the other gist's link is untouched
        let l2 = links[1].as_document().unwrap();
        assert!(!l2.contains_key("in_production"));
    }

    #[tokio::test]
    async fn test_replacement_swaps_only_that_gists_links() {
        let store = MemoryUserStore::new();
        store.insert_user("u1", seeded()).await;

        update_gist_and_links(
            &store,
            "u1",
            "g1",
            &doc! { "in_production": true },
            Some(&["https://new".to_string()]),
        )
        .await
        .unwrap();

        let user = store.load_user("u1").await.unwrap().unwrap();
        let links = user.get_array("links").unwrap();
        assert_eq!(links.len(), 2);
        let kept = links[0].as_document().unwrap();
        assert_eq!(kept.get_str("id").unwrap(), "l2");
        let fresh = links[1].as_document().unwrap();
        assert_eq!(fresh.get_str("url").unwrap(), "https://new");
        assert_eq!(fresh.get_str("gistId").unwrap(), "g1");
        assert!(fresh.get_bool("in_production").unwrap());
        assert!(fresh.get_bool("gist_created").unwrap());
    }

    #[tokio::test]
    async fn test_cascade_over_subcollection_links() {
        let store = MemoryUserStore::new();
        store.insert_user("u1", doc! { "username": "ada" }).await;
        store.insert_gist("u1", "g1", doc! { "id": "g1" }).await;
        store
            .insert_link("u1", "l1", doc! { "id": "l1", "gistId": "g1", "url": "https://a" })
            .await;

        update_gist_and_links(&store, "u1", "g1", &doc! { "in_production": true }, None)
            .await
            .unwrap();

        let link = store
            .get_sub("u1", SubKind::Links, "l1")
            .await
            .unwrap()
            .unwrap();
        assert!(link.get_bool("in_production").unwrap());
        assert!(matches!(link.get("updatedAt"), Some(Bson::DateTime(_))));
    }

    #[tokio::test]
    async fn test_replacement_into_subcollection() {
        let store = MemoryUserStore::new();
        store.insert_user("u1", doc! { "username": "ada" }).await;
        store.insert_gist("u1", "g1", doc! { "id": "g1" }).await;
        store
            .insert_link("u1", "old", doc! { "id": "old", "gistId": "g1", "url": "https://old" })
            .await;

        update_gist_and_links(
            &store,
            "u1",
            "g1",
            &doc! {},
            Some(&["https://x".to_string(), "https://y".to_string()]),
        )
        .await
        .unwrap();

        let links = store.list_subs("u1", SubKind::Links).await.unwrap();
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|l| l.get_str("id").unwrap() != "old"));
    }

    #[tokio::test]
    async fn test_unknown_gist_leaves_links_alone() {
        let store = MemoryUserStore::new();
        store.insert_user("u1", seeded()).await;

        let err = update_gist_and_links(&store, "u1", "nope", &doc! {}, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::GistNotFound(_)));

        let user = store.load_user("u1").await.unwrap().unwrap();
        let l1 = user.get_array("links").unwrap()[0].as_document().unwrap();
        assert!(!l1.contains_key("in_production"));
    }
}
