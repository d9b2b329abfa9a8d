//! User tag interest maintenance. Every write is mirrored into the
//! knowledge graph as INTEREST edges.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use crate::core::{InterestConfig, NewsrecError, Result};
use crate::db::{Store, StoreError};
use crate::models::{ArticleId, EventType, TagId, UserEvent, UserId, UserTagWeight};
use crate::toolkit::graph::{KnowledgeGraphSync, SyncStats};


pub struct UserInterestService {
    store: Arc<dyn Store>,
    graph: Arc<KnowledgeGraphSync>,
    config: InterestConfig,
}

impl UserInterestService {
    pub fn new(store: Arc<dyn Store>, graph: Arc<KnowledgeGraphSync>, config: InterestConfig) -> Self {
        Self { store, graph, config }
    }

    /// Replaces the user's explicit tag selection. Every distinct tag starts
    /// at the configured initial weight.
    pub async fn save_user_tags(&self, user_id: UserId, tag_ids: &[TagId]) -> Result<Vec<UserTagWeight>> {
        let removed = self.store.delete_user_tags(user_id).await?;
        let mut seen = HashSet::new();
        let initial = self.config.initial_weight.clamp(0.0, self.config.max_weight.max(0.0));
        for tag_id in tag_ids.iter().filter(|id| seen.insert(**id)) {
            match self.store.insert_user_tag(user_id, *tag_id, initial).await {
                Ok(()) => {}
                // written by a concurrent save; the row exists either way
                Err(StoreError::Conflict(_)) => {
                    debug!("User tag ({}, {}) already present", user_id, tag_id);
                }
                Err(e) => return Err(e.into()),
            }
        }
        info!(
            "Saved {} tags for user {} (replaced {})",
            seen.len(),
            user_id,
            removed
        );
        self.sync(user_id).await
    }

    /// Adds each delta to the user's weight for that tag, kept within
    /// `[0, max_weight]`. Missing rows are created at the clamped delta.
    pub async fn increment_weights(
        &self,
        user_id: UserId,
        increments: &BTreeMap<TagId, f64>,
        max_weight: f64,
    ) -> Result<Vec<UserTagWeight>> {
        if max_weight < 0.0 {
            return Err(NewsrecError::validation(format!(
                "max_weight must be >= 0, got {}",
                max_weight
            )));
        }

        for (tag_id, delta) in increments {
            self.apply_increment(user_id, *tag_id, *delta, max_weight).await?;
        }
        debug!("Incremented {} tag weights for user {}", increments.len(), user_id);
        self.sync(user_id).await
    }

    /// Appends the event. Reading events (VIEW, CLICK) also raise the user's
    /// weight on each of the article's tags in proportion to its annotation
    /// confidence.
    pub async fn record_event(&self, user_id: UserId, article_id: ArticleId, event_type: EventType) -> Result<()> {
        self.store
            .insert_event(&UserEvent::new(user_id, article_id, event_type))
            .await?;
        if !event_type.is_engagement() {
            return Ok(());
        }

        let increments: BTreeMap<TagId, f64> = self
            .store
            .find_article_tags(&[article_id])
            .await?
            .into_iter()
            .map(|row| (row.tag_id, self.config.event_increment * row.weight.min(1.0)))
            .collect();
        if increments.is_empty() {
            return Ok(());
        }

        self.increment_weights(user_id, &increments, self.config.max_weight)
            .await?;
        Ok(())
    }

    pub async fn user_tags(&self, user_id: UserId) -> Result<Vec<UserTagWeight>> {
        Ok(self.store.find_user_tags(user_id).await?)
    }

    /// Increment, else insert. A conflicting insert means another writer
    /// created the row in between, so the increment is applied to it.
    async fn apply_increment(&self, user_id: UserId, tag_id: TagId, delta: f64, max_weight: f64) -> Result<()> {
        if self.store.increment_user_tag(user_id, tag_id, delta, max_weight).await? {
            return Ok(());
        }
        match self
            .store
            .insert_user_tag(user_id, tag_id, delta.clamp(0.0, max_weight))
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::Conflict(_)) => {
                debug!("User tag ({}, {}) created concurrently, retrying increment", user_id, tag_id);
                self.store
                    .increment_user_tag(user_id, tag_id, delta, max_weight)
                    .await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn sync(&self, user_id: UserId) -> Result<Vec<UserTagWeight>> {
        let weights = self.store.find_user_tags(user_id).await?;
        let stats: SyncStats = self.graph.sync_user_tag_interests(user_id, &weights).await?;
        debug!("User {} interest sync wrote {} rows", user_id, stats.writes());
        Ok(weights)
    }
}

impl std::fmt::Debug for UserInterestService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UserInterestService(max_weight={})", self.config.max_weight)
    }
}
