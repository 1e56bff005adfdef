//! Content service
//!
//! One facade over the locator, the status engine and the notifier; the
//! HTTP layer calls nothing else. Notification failures are logged and
//! swallowed here - the state change has already committed, and approval
//! initiation is retryable out of band.

use std::sync::Arc;

use bson::Document;
use tracing::warn;

use crate::adapter::RecordLocator;
use crate::engine;
use crate::engine::BatchItemOutcome;
use crate::notify::{ApprovalNotice, Notifier};
use crate::store::UserStore;
use crate::types::{GatewayError, GistStatus, Result};

pub struct ContentService {
    store: Arc<dyn UserStore>,
    notifier: Arc<dyn Notifier>,
}

fn production_state(gist: &Document) -> (bool, String) {
    let status = match gist.get_document("status") {
        Ok(status) => GistStatus::from_document(status.clone()),
        Err(_) => GistStatus::default(),
    };
    (status.in_production, status.production_status)
}

impl ContentService {
    pub fn new(store: Arc<dyn UserStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    async fn container(&self, user_id: &str) -> Result<Document> {
        self.store
            .load_user(user_id)
            .await?
            .ok_or_else(|| GatewayError::UserNotFound(user_id.to_string()))
    }

    async fn send_notice(&self, notice: ApprovalNotice) {
        if let Err(e) = self.notifier.notify(&notice).await {
            warn!(
                user_id = %notice.user_id,
                gist_id = %notice.gist_id,
                error = %e,
                "workflow notification failed; update already committed"
            );
        }
    }

    /// All gists of a user, whatever shape they are stored in
    pub async fn get_gists(&self, user_id: &str) -> Result<Vec<Document>> {
        let container = self.container(user_id).await?;
        RecordLocator::new(self.store.as_ref())
            .list_gists(user_id, &container)
            .await
    }

    /// One gist by identifier
    pub async fn get_gist(&self, user_id: &str, gist_id: &str) -> Result<Document> {
        let container = self.container(user_id).await?;
        let located = RecordLocator::new(self.store.as_ref())
            .locate_gist(user_id, &container, gist_id)
            .await?
            .ok_or_else(|| GatewayError::GistNotFound(gist_id.to_string()))?;
        Ok(located.record)
    }

    /// All links of a user
    pub async fn get_links(&self, user_id: &str) -> Result<Vec<Document>> {
        let container = self.container(user_id).await?;
        RecordLocator::new(self.store.as_ref())
            .list_links(user_id, &container)
            .await
    }

    /// One link by identifier
    pub async fn get_link(&self, user_id: &str, link_id: &str) -> Result<Document> {
        let container = self.container(user_id).await?;
        let located = RecordLocator::new(self.store.as_ref())
            .locate_link(user_id, &container, link_id)
            .await?
            .ok_or_else(|| GatewayError::LinkNotFound(link_id.to_string()))?;
        Ok(located.record)
    }

    /// Links back-referencing one gist
    pub async fn get_gist_links(&self, user_id: &str, gist_id: &str) -> Result<Vec<Document>> {
        let container = self.container(user_id).await?;
        let locator = RecordLocator::new(self.store.as_ref());
        locator
            .locate_gist(user_id, &container, gist_id)
            .await?
            .ok_or_else(|| GatewayError::GistNotFound(gist_id.to_string()))?;
        let links = locator
            .list_links_for_gist(user_id, &container, gist_id)
            .await?;
        Ok(links.into_iter().map(|(_, record)| record).collect())
    }

    /// Merge-patch one gist's status. Kicks off the approval flow when the
    /// updated gist is in production.
    pub async fn update_gist_status(
        &self,
        user_id: &str,
        gist_id: &str,
        patch: &Document,
    ) -> Result<Document> {
        let updated =
            engine::update_gist_status(self.store.as_ref(), user_id, gist_id, patch).await?;

        let (in_production, production_status) = production_state(&updated);
        if in_production {
            self.send_notice(ApprovalNotice {
                user_id: user_id.to_string(),
                gist_id: gist_id.to_string(),
                production_status,
                link_url: None,
            })
            .await;
        }
        Ok(updated)
    }

    /// Set the free-text workflow label on a gist's status. The pipeline
    /// only labels gists it is actively producing, so the label implies
    /// `in_production`. Progress labels do not initiate approval.
    pub async fn update_gist_workflow_status(
        &self,
        user_id: &str,
        gist_id: &str,
        label: &str,
    ) -> Result<Document> {
        let patch = bson::doc! { "in_production": true, "production_status": label };
        engine::update_gist_status(self.store.as_ref(), user_id, gist_id, &patch).await
    }

    /// Per-item batch of status patches. Notifies once per updated gist
    /// that ends up in production.
    pub async fn batch_update_gists(
        &self,
        user_id: &str,
        updates: Vec<(String, Document)>,
    ) -> Result<engine::BatchOutcome> {
        let outcome = engine::batch_update_gists(self.store.as_ref(), user_id, updates).await?;

        for item in &outcome.items {
            if let BatchItemOutcome::Updated(gist) = &item.outcome {
                let (in_production, production_status) = production_state(gist);
                if in_production {
                    self.send_notice(ApprovalNotice {
                        user_id: user_id.to_string(),
                        gist_id: item.gist_id.clone(),
                        production_status,
                        link_url: None,
                    })
                    .await;
                }
            }
        }
        Ok(outcome)
    }

    /// Atomic gist-and-links update. Notifies only for the in-production
    /// review transition, carrying a representative link URL.
    pub async fn update_gist_and_links(
        &self,
        user_id: &str,
        gist_id: &str,
        patch: &Document,
        replacement_urls: Option<&[String]>,
    ) -> Result<Document> {
        let updated = engine::update_gist_and_links(
            self.store.as_ref(),
            user_id,
            gist_id,
            patch,
            replacement_urls,
        )
        .await?;

        let (in_production, production_status) = production_state(&updated);
        if in_production && production_status == "review" {
            let link_url = self
                .representative_link_url(user_id, gist_id, &updated, replacement_urls)
                .await;
            self.send_notice(ApprovalNotice {
                user_id: user_id.to_string(),
                gist_id: gist_id.to_string(),
                production_status,
                link_url,
            })
            .await;
        }
        Ok(updated)
    }

    /// Best link URL for the approval notice: the replacement set's first
    /// URL, the gist's own `link` field, or the first linked record's URL
    async fn representative_link_url(
        &self,
        user_id: &str,
        gist_id: &str,
        gist: &Document,
        replacement_urls: Option<&[String]>,
    ) -> Option<String> {
        if let Some(url) = replacement_urls.and_then(|urls| urls.first()) {
            return Some(url.clone());
        }
        if let Ok(url) = gist.get_str("link") {
            return Some(url.to_string());
        }
        let container = self.store.load_user(user_id).await.ok()??;
        let links = RecordLocator::new(self.store.as_ref())
            .list_links_for_gist(user_id, &container, gist_id)
            .await
            .ok()?;
        links
            .into_iter()
            .find_map(|(_, record)| record.get_str("url").ok().map(str::to_string))
    }
}
