//! Test store that lands a second writer's row between the two halves of a
//! read-modify-write, the way a transactional backend can.

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ArticleStore, GraphStore, MemoryStore, StoreResult, TagStore, UserStore};
use crate::models::{Article, ArticleId, ArticleTag, Tag, TagId, User, UserEvent, UserId, UserTagWeight};
use crate::toolkit::graph::models::{
    EntityId, EntityType, KnowledgeEntity, KnowledgeRelation, NewEntity, RelationKey,
};


#[derive(Default)]
pub(crate) struct InterleavedStore {
    pub inner: MemoryStore,
    /// Inserted right after an increment misses its row.
    user_rows: Mutex<Vec<UserTagWeight>>,
    /// Inserted right after the article's rows are deleted.
    article_rows: Mutex<Vec<ArticleTag>>,
}

impl InterleavedStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn on_increment_miss(&self, row: UserTagWeight) {
        self.user_rows.lock().push(row);
    }

    pub fn on_article_delete(&self, row: ArticleTag) {
        self.article_rows.lock().push(row);
    }
}

#[async_trait]
impl ArticleStore for InterleavedStore {
    async fn find_recent(&self, limit: usize) -> StoreResult<Vec<Article>> {
        self.inner.find_recent(limit).await
    }

    async fn list_by_publish_time(&self, offset: usize, limit: usize) -> StoreResult<Vec<Article>> {
        self.inner.list_by_publish_time(offset, limit).await
    }

    async fn find_article(&self, id: ArticleId) -> StoreResult<Option<Article>> {
        self.inner.find_article(id).await
    }

    async fn find_article_tags(&self, article_ids: &[ArticleId]) -> StoreResult<Vec<ArticleTag>> {
        self.inner.find_article_tags(article_ids).await
    }

    async fn delete_article_tags(&self, article_id: ArticleId) -> StoreResult<usize> {
        let removed = self.inner.delete_article_tags(article_id).await?;
        let pending: Vec<ArticleTag> = {
            let mut rows = self.article_rows.lock();
            let (hit, rest): (Vec<ArticleTag>, Vec<ArticleTag>) = rows.drain(..).partition(|row| row.article_id == article_id);
            *rows = rest;
            hit
        };
        for row in &pending {
            self.inner.insert_article_tag(row).await?;
        }
        Ok(removed)
    }

    async fn insert_article_tag(&self, tag: &ArticleTag) -> StoreResult<()> {
        self.inner.insert_article_tag(tag).await
    }
}

#[async_trait]
impl TagStore for InterleavedStore {
    async fn find_all_tags(&self) -> StoreResult<Vec<Tag>> {
        self.inner.find_all_tags().await
    }

    async fn find_tags_by_ids(&self, ids: &[TagId]) -> StoreResult<Vec<Tag>> {
        self.inner.find_tags_by_ids(ids).await
    }
}

#[async_trait]
impl UserStore for InterleavedStore {
    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        self.inner.find_user(id).await
    }

    async fn find_user_tags(&self, user_id: UserId) -> StoreResult<Vec<UserTagWeight>> {
        self.inner.find_user_tags(user_id).await
    }

    async fn delete_user_tags(&self, user_id: UserId) -> StoreResult<usize> {
        self.inner.delete_user_tags(user_id).await
    }

    async fn insert_user_tag(&self, user_id: UserId, tag_id: TagId, weight: f64) -> StoreResult<()> {
        self.inner.insert_user_tag(user_id, tag_id, weight).await
    }

    async fn increment_user_tag(
        &self,
        user_id: UserId,
        tag_id: TagId,
        delta: f64,
        max_weight: f64,
    ) -> StoreResult<bool> {
        let updated = self
            .inner
            .increment_user_tag(user_id, tag_id, delta, max_weight)
            .await?;
        if !updated {
            let pending = {
                let mut rows = self.user_rows.lock();
                rows.iter()
                    .position(|row| row.user_id == user_id && row.tag_id == tag_id)
                    .map(|idx| rows.remove(idx))
            };
            if let Some(row) = pending {
                self.inner.insert_user_tag(row.user_id, row.tag_id, row.weight).await?;
            }
        }
        Ok(updated)
    }

    async fn insert_event(&self, event: &UserEvent) -> StoreResult<()> {
        self.inner.insert_event(event).await
    }

    async fn find_recent_article_ids(&self, user_id: UserId, limit: usize) -> StoreResult<Vec<ArticleId>> {
        self.inner.find_recent_article_ids(user_id, limit).await
    }
}

#[async_trait]
impl GraphStore for InterleavedStore {
    async fn find_entity(
        &self,
        entity_type: EntityType,
        external_id: &str,
    ) -> StoreResult<Option<KnowledgeEntity>> {
        self.inner.find_entity(entity_type, external_id).await
    }

    async fn insert_entity(&self, entity: &NewEntity) -> StoreResult<KnowledgeEntity> {
        self.inner.insert_entity(entity).await
    }

    async fn update_entity(&self, entity: &KnowledgeEntity) -> StoreResult<()> {
        self.inner.update_entity(entity).await
    }

    async fn find_all_entities(&self) -> StoreResult<Vec<KnowledgeEntity>> {
        self.inner.find_all_entities().await
    }

    async fn find_relation(&self, key: &RelationKey) -> StoreResult<Option<KnowledgeRelation>> {
        self.inner.find_relation(key).await
    }

    async fn insert_relation(&self, key: &RelationKey, weight: f64) -> StoreResult<KnowledgeRelation> {
        self.inner.insert_relation(key, weight).await
    }

    async fn update_relation_weight(&self, id: EntityId, weight: f64) -> StoreResult<()> {
        self.inner.update_relation_weight(id, weight).await
    }

    async fn find_all_relations(&self) -> StoreResult<Vec<KnowledgeRelation>> {
        self.inner.find_all_relations().await
    }
}
