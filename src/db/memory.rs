use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ArticleStore, GraphStore, StoreError, StoreResult, TagStore, UserStore};
use crate::models::{Article, ArticleId, ArticleTag, Tag, TagId, User, UserEvent, UserId, UserTagWeight};
use crate::toolkit::graph::models::{
    EntityId, EntityType, KnowledgeEntity, KnowledgeRelation, NewEntity, RelationKey,
};


/// Plain data used to seed a [`MemoryStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub articles: Vec<Article>,
    pub tags: Vec<Tag>,
    pub users: Vec<User>,
    pub article_tags: Vec<ArticleTag>,
    pub user_tags: Vec<UserTagWeight>,
    pub events: Vec<UserEvent>,
}


#[derive(Default)]
struct Tables {
    articles: HashMap<ArticleId, Article>,
    tags: HashMap<TagId, Tag>,
    users: HashMap<UserId, User>,
    article_tags: HashMap<(ArticleId, TagId), ArticleTag>,
    user_tags: HashMap<(UserId, TagId), UserTagWeight>,
    events: Vec<UserEvent>,
    entities: HashMap<EntityId, KnowledgeEntity>,
    entity_index: HashMap<(EntityType, String), EntityId>,
    relations: HashMap<EntityId, KnowledgeRelation>,
    relation_index: HashMap<RelationKey, EntityId>,
    next_entity_id: EntityId,
    next_relation_id: EntityId,
}


/// In-process store with the same uniqueness guarantees as the relational
/// schema: one entity per `(type, external_id)`, one relation per key, one
/// article-tag per pair and one user-tag per pair.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let store = Self::new();
        {
            let mut tables = store.tables.write();
            for article in snapshot.articles {
                tables.articles.insert(article.id, article);
            }
            for tag in snapshot.tags {
                tables.tags.insert(tag.id, tag);
            }
            for user in snapshot.users {
                tables.users.insert(user.id, user);
            }
            for tag in snapshot.article_tags {
                let tag = ArticleTag::new(tag.article_id, tag.tag_id, tag.weight);
                tables.article_tags.insert((tag.article_id, tag.tag_id), tag);
            }
            for weight in snapshot.user_tags {
                tables.user_tags.insert((weight.user_id, weight.tag_id), weight);
            }
            tables.events = snapshot.events;
            debug!(
                "MemoryStore seeded: {} articles, {} tags, {} users, {} events",
                tables.articles.len(),
                tables.tags.len(),
                tables.users.len(),
                tables.events.len()
            );
        }
        store
    }

    pub fn insert_article(&self, article: Article) {
        self.tables.write().articles.insert(article.id, article);
    }

    pub fn insert_tag(&self, tag: Tag) {
        self.tables.write().tags.insert(tag.id, tag);
    }

    pub fn insert_user(&self, user: User) {
        self.tables.write().users.insert(user.id, user);
    }

    pub fn entity_count(&self) -> usize {
        self.tables.read().entities.len()
    }

    pub fn relation_count(&self) -> usize {
        self.tables.read().relations.len()
    }

    fn sorted_by_recency(tables: &Tables) -> Vec<Article> {
        let mut articles: Vec<Article> = tables.articles.values().cloned().collect();
        articles.sort_by_key(|article| Reverse((article.effective_time(), article.id)));
        articles
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn find_recent(&self, limit: usize) -> StoreResult<Vec<Article>> {
        let tables = self.tables.read();
        let mut articles = Self::sorted_by_recency(&tables);
        articles.truncate(limit);
        Ok(articles)
    }

    async fn list_by_publish_time(&self, offset: usize, limit: usize) -> StoreResult<Vec<Article>> {
        let tables = self.tables.read();
        Ok(Self::sorted_by_recency(&tables)
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }

    async fn find_article(&self, id: ArticleId) -> StoreResult<Option<Article>> {
        Ok(self.tables.read().articles.get(&id).cloned())
    }

    async fn find_article_tags(&self, article_ids: &[ArticleId]) -> StoreResult<Vec<ArticleTag>> {
        let wanted: HashSet<ArticleId> = article_ids.iter().copied().collect();
        let tables = self.tables.read();
        let mut rows: Vec<ArticleTag> = tables
            .article_tags
            .values()
            .filter(|row| wanted.contains(&row.article_id))
            .cloned()
            .collect();
        rows.sort_by_key(|row| (row.article_id, row.tag_id));
        Ok(rows)
    }

    async fn delete_article_tags(&self, article_id: ArticleId) -> StoreResult<usize> {
        let mut tables = self.tables.write();
        let before = tables.article_tags.len();
        tables.article_tags.retain(|(id, _), _| *id != article_id);
        Ok(before - tables.article_tags.len())
    }

    async fn insert_article_tag(&self, tag: &ArticleTag) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let key = (tag.article_id, tag.tag_id);
        if tables.article_tags.contains_key(&key) {
            return Err(StoreError::Conflict(format!(
                "article_tag ({}, {})",
                tag.article_id, tag.tag_id
            )));
        }
        tables
            .article_tags
            .insert(key, ArticleTag::new(tag.article_id, tag.tag_id, tag.weight));
        Ok(())
    }
}

#[async_trait]
impl TagStore for MemoryStore {
    async fn find_all_tags(&self) -> StoreResult<Vec<Tag>> {
        let mut tags: Vec<Tag> = self.tables.read().tags.values().cloned().collect();
        tags.sort_by_key(|tag| tag.id);
        Ok(tags)
    }

    async fn find_tags_by_ids(&self, ids: &[TagId]) -> StoreResult<Vec<Tag>> {
        let tables = self.tables.read();
        let mut seen = HashSet::new();
        Ok(ids
            .iter()
            .filter(|id| seen.insert(**id))
            .filter_map(|id| tables.tags.get(id).cloned())
            .collect())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.tables.read().users.get(&id).cloned())
    }

    async fn find_user_tags(&self, user_id: UserId) -> StoreResult<Vec<UserTagWeight>> {
        let tables = self.tables.read();
        let mut rows: Vec<UserTagWeight> = tables
            .user_tags
            .values()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.tag_id);
        Ok(rows)
    }

    async fn delete_user_tags(&self, user_id: UserId) -> StoreResult<usize> {
        let mut tables = self.tables.write();
        let before = tables.user_tags.len();
        tables.user_tags.retain(|(id, _), _| *id != user_id);
        Ok(before - tables.user_tags.len())
    }

    async fn insert_user_tag(&self, user_id: UserId, tag_id: TagId, weight: f64) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if tables.user_tags.contains_key(&(user_id, tag_id)) {
            return Err(StoreError::Conflict(format!("user_tag ({}, {})", user_id, tag_id)));
        }
        tables
            .user_tags
            .insert((user_id, tag_id), UserTagWeight::new(user_id, tag_id, weight.max(0.0)));
        Ok(())
    }

    async fn increment_user_tag(
        &self,
        user_id: UserId,
        tag_id: TagId,
        delta: f64,
        max_weight: f64,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        match tables.user_tags.get_mut(&(user_id, tag_id)) {
            Some(row) => {
                row.weight = (row.weight + delta).clamp(0.0, max_weight.max(0.0));
                row.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_event(&self, event: &UserEvent) -> StoreResult<()> {
        self.tables.write().events.push(event.clone());
        Ok(())
    }

    async fn find_recent_article_ids(&self, user_id: UserId, limit: usize) -> StoreResult<Vec<ArticleId>> {
        let tables = self.tables.read();
        let mut events: Vec<(usize, &UserEvent)> = tables
            .events
            .iter()
            .enumerate()
            .filter(|(_, event)| event.user_id == user_id && event.event_type.is_engagement())
            .collect();
        events.sort_by_key(|(position, event)| Reverse((event.created_at, *position)));

        let mut seen = HashSet::new();
        Ok(events
            .into_iter()
            .map(|(_, event)| event.article_id)
            .filter(|id| seen.insert(*id))
            .take(limit)
            .collect())
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn find_entity(
        &self,
        entity_type: EntityType,
        external_id: &str,
    ) -> StoreResult<Option<KnowledgeEntity>> {
        let tables = self.tables.read();
        Ok(tables
            .entity_index
            .get(&(entity_type, external_id.to_string()))
            .and_then(|id| tables.entities.get(id))
            .cloned())
    }

    async fn insert_entity(&self, entity: &NewEntity) -> StoreResult<KnowledgeEntity> {
        let mut tables = self.tables.write();
        if let Some(external_id) = &entity.external_id {
            let key = (entity.entity_type, external_id.clone());
            if tables.entity_index.contains_key(&key) {
                return Err(StoreError::Conflict(format!(
                    "knowledge_entity ({}, {})",
                    entity.entity_type, external_id
                )));
            }
        }

        tables.next_entity_id += 1;
        let now = Utc::now();
        let stored = KnowledgeEntity {
            id: tables.next_entity_id,
            entity_type: entity.entity_type,
            external_id: entity.external_id.clone(),
            name: entity.name.clone(),
            description: entity.description.clone(),
            modality: entity.modality.clone(),
            created_at: now,
            updated_at: now,
        };
        if let Some(external_id) = &stored.external_id {
            tables
                .entity_index
                .insert((stored.entity_type, external_id.clone()), stored.id);
        }
        tables.entities.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_entity(&self, entity: &KnowledgeEntity) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let existing = tables
            .entities
            .get_mut(&entity.id)
            .ok_or_else(|| StoreError::NotFound(format!("knowledge_entity {}", entity.id)))?;
        existing.name = entity.name.clone();
        existing.description = entity.description.clone();
        existing.modality = entity.modality.clone();
        existing.updated_at = Utc::now();
        Ok(())
    }

    async fn find_all_entities(&self) -> StoreResult<Vec<KnowledgeEntity>> {
        let mut entities: Vec<KnowledgeEntity> =
            self.tables.read().entities.values().cloned().collect();
        entities.sort_by_key(|entity| entity.id);
        Ok(entities)
    }

    async fn find_relation(&self, key: &RelationKey) -> StoreResult<Option<KnowledgeRelation>> {
        let tables = self.tables.read();
        Ok(tables
            .relation_index
            .get(key)
            .and_then(|id| tables.relations.get(id))
            .cloned())
    }

    async fn insert_relation(&self, key: &RelationKey, weight: f64) -> StoreResult<KnowledgeRelation> {
        let mut tables = self.tables.write();
        if tables.relation_index.contains_key(key) {
            return Err(StoreError::Conflict(format!(
                "knowledge_relation ({}, {}, {})",
                key.source_id, key.target_id, key.relation_type
            )));
        }

        tables.next_relation_id += 1;
        let now = Utc::now();
        let stored = KnowledgeRelation {
            id: tables.next_relation_id,
            source_id: key.source_id,
            target_id: key.target_id,
            relation_type: key.relation_type,
            modality: key.modality.clone(),
            weight: weight.max(0.0),
            created_at: now,
            updated_at: now,
        };
        tables.relation_index.insert(key.clone(), stored.id);
        tables.relations.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_relation_weight(&self, id: EntityId, weight: f64) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let relation = tables
            .relations
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("knowledge_relation {}", id)))?;
        relation.weight = weight.max(0.0);
        relation.updated_at = Utc::now();
        Ok(())
    }

    async fn find_all_relations(&self) -> StoreResult<Vec<KnowledgeRelation>> {
        let mut relations: Vec<KnowledgeRelation> =
            self.tables.read().relations.values().cloned().collect();
        relations.sort_by_key(|relation| relation.id);
        Ok(relations)
    }
}
