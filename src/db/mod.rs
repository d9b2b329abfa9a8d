//! Storage seam. The engine only reads and writes through these traits;
//! retries and transactions across processes belong to the implementation.

pub mod memory;
#[cfg(test)]
pub(crate) mod interleaved;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Article, ArticleId, ArticleTag, Tag, TagId, User, UserEvent, UserId, UserTagWeight};
use crate::toolkit::graph::models::{
    EntityId, EntityType, KnowledgeEntity, KnowledgeRelation, NewEntity, RelationKey,
};

pub use memory::{MemoryStore, Snapshot};


#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),
    /// Unique constraint violation; the row was created by someone else.
    #[error("Unique constraint violated: {0}")]
    Conflict(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;


#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Most recent articles by publish time (falling back to creation time).
    async fn find_recent(&self, limit: usize) -> StoreResult<Vec<Article>>;

    async fn list_by_publish_time(&self, offset: usize, limit: usize) -> StoreResult<Vec<Article>>;

    async fn find_article(&self, id: ArticleId) -> StoreResult<Option<Article>>;

    async fn find_article_tags(&self, article_ids: &[ArticleId]) -> StoreResult<Vec<ArticleTag>>;

    async fn delete_article_tags(&self, article_id: ArticleId) -> StoreResult<usize>;

    async fn insert_article_tag(&self, tag: &ArticleTag) -> StoreResult<()>;
}


#[async_trait]
pub trait TagStore: Send + Sync {
    async fn find_all_tags(&self) -> StoreResult<Vec<Tag>>;

    async fn find_tags_by_ids(&self, ids: &[TagId]) -> StoreResult<Vec<Tag>>;
}


#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>>;

    async fn find_user_tags(&self, user_id: UserId) -> StoreResult<Vec<UserTagWeight>>;

    async fn delete_user_tags(&self, user_id: UserId) -> StoreResult<usize>;

    async fn insert_user_tag(&self, user_id: UserId, tag_id: TagId, weight: f64) -> StoreResult<()>;

    /// Adds `delta` to an existing row, kept within `[0, max_weight]`.
    /// Returns `false` when the row does not exist.
    async fn increment_user_tag(
        &self,
        user_id: UserId,
        tag_id: TagId,
        delta: f64,
        max_weight: f64,
    ) -> StoreResult<bool>;

    async fn insert_event(&self, event: &UserEvent) -> StoreResult<()>;

    /// Distinct article ids from the user's latest VIEW/CLICK events, newest first.
    async fn find_recent_article_ids(&self, user_id: UserId, limit: usize) -> StoreResult<Vec<ArticleId>>;
}


#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn find_entity(
        &self,
        entity_type: EntityType,
        external_id: &str,
    ) -> StoreResult<Option<KnowledgeEntity>>;

    /// Fails with [`StoreError::Conflict`] when `(type, external_id)` exists.
    async fn insert_entity(&self, entity: &NewEntity) -> StoreResult<KnowledgeEntity>;

    async fn update_entity(&self, entity: &KnowledgeEntity) -> StoreResult<()>;

    async fn find_all_entities(&self) -> StoreResult<Vec<KnowledgeEntity>>;

    async fn find_relation(&self, key: &RelationKey) -> StoreResult<Option<KnowledgeRelation>>;

    /// Fails with [`StoreError::Conflict`] when the key exists.
    async fn insert_relation(&self, key: &RelationKey, weight: f64) -> StoreResult<KnowledgeRelation>;

    async fn update_relation_weight(&self, id: EntityId, weight: f64) -> StoreResult<()>;

    async fn find_all_relations(&self) -> StoreResult<Vec<KnowledgeRelation>>;
}


pub trait Store: ArticleStore + TagStore + UserStore + GraphStore {}

impl<T> Store for T where T: ArticleStore + TagStore + UserStore + GraphStore {}
