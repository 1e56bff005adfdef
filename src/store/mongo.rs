//! MongoDB-backed user store
//!
//! User containers live in the `users` collection keyed by `_id`; the
//! per-user subcollections map to `user_gists` and `user_links`, each
//! indexed uniquely on `{user_id, id}` so keyed lookups stay O(1).
//!
//! A multi-op `apply` batch runs inside a client-session transaction;
//! requires MongoDB running as a replica set (single-node is fine).

use bson::{doc, Bson, Document};
use futures_util::TryStreamExt;
use mongodb::{
    options::IndexOptions, Client, ClientSession, Collection, IndexModel,
};
use tracing::{debug, info};

use crate::store::{SubKind, UserStore, WriteOp};
use crate::types::{GatewayError, Result};

const USERS_COLLECTION: &str = "users";
const GISTS_COLLECTION: &str = "user_gists";
const LINKS_COLLECTION: &str = "user_links";

pub struct MongoUserStore {
    client: Client,
    users: Collection<Document>,
    gists: Collection<Document>,
    links: Collection<Document>,
}

impl MongoUserStore {
    /// Connect, ping, and ensure subcollection indexes
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB at {}", uri);

        // Use serverSelectionTimeoutMS to avoid hanging on unreachable MongoDB
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| GatewayError::Store(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| GatewayError::Store(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        let db = client.database(db_name);
        let store = Self {
            users: db.collection(USERS_COLLECTION),
            gists: db.collection(GISTS_COLLECTION),
            links: db.collection(LINKS_COLLECTION),
            client,
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> Result<()> {
        let keyed = IndexModel::builder()
            .keys(doc! { "user_id": 1, "id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.gists.create_index(keyed.clone()).await?;
        self.links.create_index(keyed).await?;

        // Back-reference lookups for a gist's links
        self.links
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "gistId": 1 })
                    .build(),
            )
            .await?;
        Ok(())
    }

    fn sub_coll(&self, kind: SubKind) -> &Collection<Document> {
        match kind {
            SubKind::Gists => &self.gists,
            SubKind::Links => &self.links,
        }
    }

    /// Drop storage-internal fields before records leave the store
    fn strip_internal(mut record: Document) -> Document {
        record.remove("_id");
        record.remove("user_id");
        record
    }

    async fn exec_op(
        &self,
        session: &mut ClientSession,
        user_id: &str,
        op: WriteOp,
    ) -> Result<()> {
        match op {
            WriteOp::SetUserFields { set, touch } => {
                let Some(update) = build_update(set, touch) else {
                    return Ok(());
                };
                let result = self
                    .users
                    .update_one(doc! { "_id": user_id }, update)
                    .session(&mut *session)
                    .await?;
                if result.matched_count == 0 {
                    return Err(GatewayError::UserNotFound(user_id.to_string()));
                }
                Ok(())
            }
            WriteOp::SetSubFields {
                kind,
                id,
                set,
                touch,
            } => {
                let Some(update) = build_update(set, touch) else {
                    return Ok(());
                };
                let result = self
                    .sub_coll(kind)
                    .update_one(doc! { "user_id": user_id, "id": &id }, update)
                    .session(&mut *session)
                    .await?;
                if result.matched_count == 0 {
                    return Err(GatewayError::Store(format!(
                        "subcollection record '{}' missing for user '{}'",
                        id, user_id
                    )));
                }
                Ok(())
            }
            WriteOp::ReplaceGistLinks { gist_id, links } => {
                self.links
                    .delete_many(doc! {
                        "user_id": user_id,
                        "$or": [ { "gistId": &gist_id }, { "gist_id": &gist_id } ],
                    })
                    .session(&mut *session)
                    .await?;
                if links.is_empty() {
                    return Ok(());
                }
                let tagged: Vec<Document> = links
                    .into_iter()
                    .map(|mut link| {
                        link.insert("user_id", user_id);
                        link
                    })
                    .collect();
                self.links
                    .insert_many(tagged)
                    .session(&mut *session)
                    .await?;
                Ok(())
            }
        }
    }
}

/// `$set` plus `$currentDate` update document; `None` when there is
/// nothing to write (Mongo rejects empty updates)
fn build_update(set: Vec<(String, Bson)>, touch: Vec<String>) -> Option<Document> {
    let mut update = Document::new();
    if !set.is_empty() {
        let mut set_doc = Document::new();
        for (path, value) in set {
            set_doc.insert(path, value);
        }
        update.insert("$set", set_doc);
    }
    if !touch.is_empty() {
        let mut date_doc = Document::new();
        for path in touch {
            date_doc.insert(path, true);
        }
        update.insert("$currentDate", date_doc);
    }
    if update.is_empty() {
        None
    } else {
        Some(update)
    }
}

#[async_trait::async_trait]
impl UserStore for MongoUserStore {
    async fn load_user(&self, user_id: &str) -> Result<Option<Document>> {
        let user = self.users.find_one(doc! { "_id": user_id }).await?;
        Ok(user.map(Self::strip_internal))
    }

    async fn get_sub(&self, user_id: &str, kind: SubKind, id: &str) -> Result<Option<Document>> {
        let record = self
            .sub_coll(kind)
            .find_one(doc! { "user_id": user_id, "id": id })
            .await?;
        Ok(record.map(Self::strip_internal))
    }

    async fn list_subs(&self, user_id: &str, kind: SubKind) -> Result<Vec<Document>> {
        let cursor = self
            .sub_coll(kind)
            .find(doc! { "user_id": user_id })
            .await?;
        let records: Vec<Document> = cursor.try_collect().await?;
        Ok(records.into_iter().map(Self::strip_internal).collect())
    }

    async fn list_links_for_gist(&self, user_id: &str, gist_id: &str) -> Result<Vec<Document>> {
        let cursor = self
            .links
            .find(doc! {
                "user_id": user_id,
                "$or": [ { "gistId": gist_id }, { "gist_id": gist_id } ],
            })
            .await?;
        let records: Vec<Document> = cursor.try_collect().await?;
        Ok(records.into_iter().map(Self::strip_internal).collect())
    }

    async fn apply(&self, user_id: &str, ops: Vec<WriteOp>) -> Result<()> {
        let mut session = self.client.start_session().await?;
        let transactional = ops.len() > 1;
        if transactional {
            session.start_transaction().await?;
        }

        let op_count = ops.len();
        for op in ops {
            if let Err(e) = self.exec_op(&mut session, user_id, op).await {
                if transactional {
                    // Best effort; the server aborts on session expiry anyway
                    let _ = session.abort_transaction().await;
                }
                return Err(e);
            }
        }

        if transactional {
            session.commit_transaction().await?;
        }
        debug!(user_id, ops = op_count, "applied write batch");
        Ok(())
    }
}
