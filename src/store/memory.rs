//! In-memory store for development mode and tests
//!
//! Holds each user's container document plus their two subcollections
//! behind a single async mutex. One `apply` batch runs entirely under the
//! lock against a working copy, so a mid-batch failure leaves nothing
//! behind - the same all-or-nothing contract the MongoDB store gets from
//! a client-session transaction.

use std::collections::{BTreeMap, HashMap};

use bson::{Bson, DateTime, Document};
use tokio::sync::Mutex;
use tracing::debug;

use crate::store::{SubKind, UserStore, WriteOp};
use crate::types::{GatewayError, Result};

#[derive(Debug, Clone, Default)]
struct UserRecord {
    doc: Document,
    gists: BTreeMap<String, Document>,
    links: BTreeMap<String, Document>,
}

impl UserRecord {
    fn subs(&self, kind: SubKind) -> &BTreeMap<String, Document> {
        match kind {
            SubKind::Gists => &self.gists,
            SubKind::Links => &self.links,
        }
    }

    fn subs_mut(&mut self, kind: SubKind) -> &mut BTreeMap<String, Document> {
        match kind {
            SubKind::Gists => &mut self.gists,
            SubKind::Links => &mut self.links,
        }
    }
}

/// Mutex-guarded map of users, keyed by user id
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, UserRecord>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user container document
    pub async fn insert_user(&self, user_id: &str, doc: Document) {
        let mut users = self.users.lock().await;
        users.entry(user_id.to_string()).or_default().doc = doc;
    }

    /// Seed a gist into the user's subcollection
    pub async fn insert_gist(&self, user_id: &str, gist_id: &str, doc: Document) {
        let mut users = self.users.lock().await;
        users
            .entry(user_id.to_string())
            .or_default()
            .gists
            .insert(gist_id.to_string(), doc);
    }

    /// Seed a link into the user's subcollection
    pub async fn insert_link(&self, user_id: &str, link_id: &str, doc: Document) {
        let mut users = self.users.lock().await;
        users
            .entry(user_id.to_string())
            .or_default()
            .links
            .insert(link_id.to_string(), doc);
    }
}

/// Set a dotted-path leaf in a document, creating intermediate documents
/// as needed. Array segments must name an existing index; targeted writes
/// only ever address records the locator has already seen.
fn set_bson_path(doc: &mut Document, path: &str, value: Bson) -> Result<()> {
    let segments: Vec<&str> = path.split('.').collect();
    set_segments(doc, &segments, value, path)
}

fn set_segments(doc: &mut Document, segments: &[&str], value: Bson, full: &str) -> Result<()> {
    let (head, rest) = match segments.split_first() {
        Some(split) => split,
        None => return Err(GatewayError::Store(format!("empty write path '{}'", full))),
    };

    if rest.is_empty() {
        doc.insert(head.to_string(), value);
        return Ok(());
    }

    // An existing array at this segment means the next segment is an index
    if let Some(Bson::Array(arr)) = doc.get_mut(*head) {
        let index: usize = rest[0].parse().map_err(|_| {
            GatewayError::Store(format!("non-numeric array index in path '{}'", full))
        })?;
        let item = arr.get_mut(index).ok_or_else(|| {
            GatewayError::Store(format!("array index out of bounds in path '{}'", full))
        })?;
        if !matches!(item, Bson::Document(_)) {
            *item = Bson::Document(Document::new());
        }
        if let Bson::Document(inner) = item {
            return set_segments(inner, &rest[1..], value, full);
        }
    }

    if !matches!(doc.get(*head), Some(Bson::Document(_))) {
        doc.insert(head.to_string(), Document::new());
    }
    if let Some(Bson::Document(inner)) = doc.get_mut(*head) {
        return set_segments(inner, rest, value, full);
    }
    Err(GatewayError::Store(format!(
        "unexpected value along path '{}'",
        full
    )))
}

fn apply_op(record: &mut UserRecord, user_id: &str, op: WriteOp, now: DateTime) -> Result<()> {
    match op {
        WriteOp::SetUserFields { set, touch } => {
            for (path, value) in set {
                set_bson_path(&mut record.doc, &path, value)?;
            }
            for path in touch {
                set_bson_path(&mut record.doc, &path, Bson::DateTime(now))?;
            }
            Ok(())
        }
        WriteOp::SetSubFields {
            kind,
            id,
            set,
            touch,
        } => {
            let sub = record.subs_mut(kind).get_mut(&id).ok_or_else(|| {
                GatewayError::Store(format!(
                    "subcollection record '{}' missing for user '{}'",
                    id, user_id
                ))
            })?;
            for (path, value) in set {
                set_bson_path(sub, &path, value)?;
            }
            for path in touch {
                set_bson_path(sub, &path, Bson::DateTime(now))?;
            }
            Ok(())
        }
        WriteOp::ReplaceGistLinks { gist_id, links } => {
            record.links.retain(|_, link| {
                crate::adapter::shape::link_gist_ref(link) != Some(gist_id.as_str())
            });
            for link in links {
                let id = link
                    .get_str("id")
                    .or_else(|_| link.get_str("link_id"))
                    .map(str::to_string)
                    .map_err(|_| {
                        GatewayError::Store("replacement link without an id".to_string())
                    })?;
                record.links.insert(id, link);
            }
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl UserStore for MemoryUserStore {
    async fn load_user(&self, user_id: &str) -> Result<Option<Document>> {
        let users = self.users.lock().await;
        Ok(users.get(user_id).map(|record| record.doc.clone()))
    }

    async fn get_sub(&self, user_id: &str, kind: SubKind, id: &str) -> Result<Option<Document>> {
        let users = self.users.lock().await;
        Ok(users
            .get(user_id)
            .and_then(|record| record.subs(kind).get(id))
            .cloned())
    }

    async fn list_subs(&self, user_id: &str, kind: SubKind) -> Result<Vec<Document>> {
        let users = self.users.lock().await;
        Ok(users
            .get(user_id)
            .map(|record| record.subs(kind).values().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_links_for_gist(&self, user_id: &str, gist_id: &str) -> Result<Vec<Document>> {
        let users = self.users.lock().await;
        Ok(users
            .get(user_id)
            .map(|record| {
                record
                    .links
                    .values()
                    .filter(|link| crate::adapter::shape::link_gist_ref(link) == Some(gist_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn apply(&self, user_id: &str, ops: Vec<WriteOp>) -> Result<()> {
        let mut users = self.users.lock().await;
        let record = users
            .get(user_id)
            .ok_or_else(|| GatewayError::UserNotFound(user_id.to_string()))?;

        // Work on a copy; swap in only when every op succeeded
        let mut working = record.clone();
        let now = DateTime::now();
        let op_count = ops.len();
        for op in ops {
            apply_op(&mut working, user_id, op, now)?;
        }
        users.insert(user_id.to_string(), working);
        debug!(user_id, ops = op_count, "applied write batch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_set_bson_path_creates_intermediates() {
        let mut d = doc! { "a": 1 };
        set_bson_path(&mut d, "b.c.d", Bson::Int32(7)).unwrap();
        assert_eq!(
            d.get_document("b").unwrap().get_document("c").unwrap().get_i32("d").unwrap(),
            7
        );
    }

    #[test]
    fn test_set_bson_path_into_array_element() {
        let mut d = doc! { "gists": [ { "gistId": "g1" }, { "gistId": "g2" } ] };
        set_bson_path(&mut d, "gists.1.status.in_production", Bson::Boolean(true)).unwrap();
        let second = d.get_array("gists").unwrap()[1].as_document().unwrap();
        assert!(second.get_document("status").unwrap().get_bool("in_production").unwrap());
        // first element untouched
        let first = d.get_array("gists").unwrap()[0].as_document().unwrap();
        assert!(!first.contains_key("status"));
    }

    #[test]
    fn test_set_bson_path_rejects_out_of_bounds_index() {
        let mut d = doc! { "gists": [ { "gistId": "g1" } ] };
        let err = set_bson_path(&mut d, "gists.5.status", Bson::Int32(1)).unwrap_err();
        assert!(matches!(err, GatewayError::Store(_)));
    }

    #[tokio::test]
    async fn test_apply_is_all_or_nothing() {
        let store = MemoryUserStore::new();
        store
            .insert_user("u1", doc! { "gists": [ { "gistId": "g1" } ] })
            .await;

        let ops = vec![
            WriteOp::SetUserFields {
                set: vec![("gists.0.status.in_production".into(), Bson::Boolean(true))],
                touch: vec![],
            },
            // Targets a subcollection record that does not exist
            WriteOp::SetSubFields {
                kind: SubKind::Gists,
                id: "missing".into(),
                set: vec![("status.in_production".into(), Bson::Boolean(true))],
                touch: vec![],
            },
        ];
        assert!(store.apply("u1", ops).await.is_err());

        // The first op must not have landed
        let user = store.load_user("u1").await.unwrap().unwrap();
        let gist = user.get_array("gists").unwrap()[0].as_document().unwrap();
        assert!(!gist.contains_key("status"));
    }

    #[tokio::test]
    async fn test_apply_touch_writes_timestamp() {
        let store = MemoryUserStore::new();
        store.insert_user("u1", doc! {}).await;
        store
            .apply(
                "u1",
                vec![WriteOp::SetUserFields {
                    set: vec![],
                    touch: vec!["updatedAt".into()],
                }],
            )
            .await
            .unwrap();
        let user = store.load_user("u1").await.unwrap().unwrap();
        assert!(matches!(user.get("updatedAt"), Some(Bson::DateTime(_))));
    }

    #[tokio::test]
    async fn test_apply_unknown_user_is_not_found() {
        let store = MemoryUserStore::new();
        let err = store.apply("nobody", vec![]).await.unwrap_err();
        assert!(matches!(err, GatewayError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn test_replace_gist_links_swaps_only_that_gists_links() {
        let store = MemoryUserStore::new();
        store.insert_user("u1", doc! {}).await;
        store
            .insert_link("u1", "l1", doc! { "id": "l1", "gistId": "g1", "url": "a" })
            .await;
        store
            .insert_link("u1", "l2", doc! { "id": "l2", "gistId": "g2", "url": "b" })
            .await;

        store
            .apply(
                "u1",
                vec![WriteOp::ReplaceGistLinks {
                    gist_id: "g1".into(),
                    links: vec![doc! { "id": "l3", "gistId": "g1", "url": "c" }],
                }],
            )
            .await
            .unwrap();

        let links = store.list_subs("u1", SubKind::Links).await.unwrap();
        let ids: Vec<&str> = links.iter().map(|l| l.get_str("id").unwrap()).collect();
        assert_eq!(ids, vec!["l2", "l3"]);
    }
}
