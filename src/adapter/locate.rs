//! Record locator: full resolution order over container and subcollection
//!
//! Strategies for a gist, each tried until one succeeds:
//! 1. ordered sequence scan (`id`/`gistId` equality)
//! 2. keyed-map scan (same equality)
//! 3. embedded single gist (container itself is gist-shaped)
//! 4. subcollection keyed lookup (O(1), no scan)
//! 5. title match - documented accommodation, last resort only
//!
//! Links resolve symmetrically, minus the embedded case.

use bson::Document;

use crate::adapter::shape::{self, GistHome, LinkHome, LocatedGist, LocatedLink};
use crate::store::{SubKind, UserStore};
use crate::types::Result;

/// Locator over one user's container plus their subcollections
pub struct RecordLocator<'a> {
    store: &'a dyn UserStore,
}

impl<'a> RecordLocator<'a> {
    pub fn new(store: &'a dyn UserStore) -> Self {
        Self { store }
    }

    /// Resolve a gist by identifier across all supported shapes
    pub async fn locate_gist(
        &self,
        user_id: &str,
        container: &Document,
        gist_id: &str,
    ) -> Result<Option<LocatedGist>> {
        if let Some(found) = shape::scan_container_gist(container, gist_id) {
            return Ok(Some(found));
        }

        if let Some(record) = self.store.get_sub(user_id, SubKind::Gists, gist_id).await? {
            return Ok(Some(LocatedGist {
                home: GistHome::Subcollection {
                    id: gist_id.to_string(),
                },
                record,
            }));
        }

        Ok(shape::scan_gist_by_title(container, gist_id))
    }

    /// Resolve a link by identifier across all supported shapes
    pub async fn locate_link(
        &self,
        user_id: &str,
        container: &Document,
        link_id: &str,
    ) -> Result<Option<LocatedLink>> {
        if let Some(found) = shape::scan_container_link(container, link_id) {
            return Ok(Some(found));
        }

        if let Some(record) = self.store.get_sub(user_id, SubKind::Links, link_id).await? {
            return Ok(Some(LocatedLink {
                home: LinkHome::Subcollection {
                    id: link_id.to_string(),
                },
                record,
            }));
        }

        Ok(None)
    }

    /// All gists for a user. Container shapes take precedence; the
    /// subcollection is consulted when the container holds none.
    pub async fn list_gists(&self, user_id: &str, container: &Document) -> Result<Vec<Document>> {
        let from_container: Vec<Document> = shape::list_container_gists(container)
            .into_iter()
            .map(|(_, record)| record)
            .collect();
        if !from_container.is_empty() {
            return Ok(from_container);
        }

        self.store.list_subs(user_id, SubKind::Gists).await
    }

    /// All links for a user, container first, else subcollection (which
    /// includes links nested under individual gists)
    pub async fn list_links(&self, user_id: &str, container: &Document) -> Result<Vec<Document>> {
        let from_container: Vec<Document> = shape::list_container_links(container)
            .into_iter()
            .map(|(_, record)| record)
            .collect();
        if !from_container.is_empty() {
            return Ok(from_container);
        }

        self.store.list_subs(user_id, SubKind::Links).await
    }

    /// Links back-referencing one gist, across container and subcollection
    pub async fn list_links_for_gist(
        &self,
        user_id: &str,
        container: &Document,
        gist_id: &str,
    ) -> Result<Vec<(LinkHome, Document)>> {
        let mut out: Vec<(LinkHome, Document)> = shape::list_container_links(container)
            .into_iter()
            .filter(|(_, record)| shape::link_gist_ref(record) == Some(gist_id))
            .collect();

        for record in self.store.list_links_for_gist(user_id, gist_id).await? {
            let id = record
                .get_str("id")
                .or_else(|_| record.get_str("link_id"))
                .unwrap_or_default()
                .to_string();
            out.push((LinkHome::Subcollection { id }, record));
        }

        Ok(out)
    }
}
