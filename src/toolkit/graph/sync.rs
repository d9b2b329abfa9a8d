use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use super::models::{
    EntityId, EntityType, KnowledgeEntity, NewEntity, RelationKey, RelationType, SyncStats,
    MODALITY_BEHAVIOR, MODALITY_TEXT,
};
use crate::core::Result;
use crate::db::{Store, StoreError};
use crate::models::{ArticleId, ArticleTag, TagId, UserId, UserTagWeight};
use crate::utils::{placeholder_label, safe_truncate};


const DESCRIPTION_CHARS: usize = 240;


/// Which stored fields an "ensure" call may refresh on an existing entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Refresh {
    Never,
    Name,
    NameAndDescription,
}


struct EntitySeed {
    entity: NewEntity,
    refresh: Refresh,
}


/// Keeps user/article/tag entities and their undirected interest and
/// annotation edges in step with the domain tables.
pub struct KnowledgeGraphSync {
    store: Arc<dyn Store>,
    // One synchronization call is one unit of work in this process; the
    // store's unique constraints cover concurrent writers elsewhere.
    unit_of_work: Mutex<()>,
}

impl KnowledgeGraphSync {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            unit_of_work: Mutex::new(()),
        }
    }

    pub(crate) fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub async fn sync_user_tag_interests(
        &self,
        user_id: UserId,
        tag_weights: &[UserTagWeight],
    ) -> Result<SyncStats> {
        let mut stats = SyncStats::default();
        if tag_weights.is_empty() {
            return Ok(stats);
        }

        let _guard = self.unit_of_work.lock().await;
        let user_entity = self.ensure_user_entity(user_id, &mut stats).await?;
        let tag_names = self
            .load_tag_names(tag_weights.iter().map(|t| t.tag_id).collect())
            .await?;

        for tag in tag_weights {
            let tag_entity = self
                .ensure_tag_entity(tag.tag_id, tag_names.get(&tag.tag_id).cloned(), &mut stats)
                .await?;
            let key = RelationKey::undirected(
                user_entity,
                tag_entity,
                RelationType::Interest,
                Some(MODALITY_BEHAVIOR),
            );
            self.upsert_relation(&key, tag.weight.max(0.0), &mut stats).await?;
        }

        log_sync("user", user_id, &stats);
        Ok(stats)
    }

    pub async fn sync_article_tags(
        &self,
        article_id: ArticleId,
        article_tags: &[ArticleTag],
    ) -> Result<SyncStats> {
        let mut stats = SyncStats::default();
        if article_tags.is_empty() {
            return Ok(stats);
        }

        let _guard = self.unit_of_work.lock().await;
        let article_entity = self.ensure_article_entity(article_id, &mut stats).await?;
        let tag_names = self
            .load_tag_names(article_tags.iter().map(|t| t.tag_id).collect())
            .await?;

        for tag in article_tags {
            let tag_entity = self
                .ensure_tag_entity(tag.tag_id, tag_names.get(&tag.tag_id).cloned(), &mut stats)
                .await?;
            let key = RelationKey::undirected(
                article_entity,
                tag_entity,
                RelationType::AnnotatedWith,
                Some(MODALITY_TEXT),
            );
            self.upsert_relation(&key, tag.weight.clamp(0.0, 1.0), &mut stats)
                .await?;
        }

        log_sync("article", article_id, &stats);
        Ok(stats)
    }

    async fn ensure_user_entity(&self, user_id: UserId, stats: &mut SyncStats) -> Result<EntityId> {
        let reference = user_id.to_string();
        let user = self.store.find_user(user_id).await?;

        let (name, description, refresh) = match user {
            Some(user) => (
                user.nickname.unwrap_or_else(|| placeholder_label("user", &reference)),
                Some(user.username),
                Refresh::Name,
            ),
            None => (placeholder_label("user", &reference), None, Refresh::Never),
        };

        self.ensure_entity(
            EntitySeed {
                entity: NewEntity {
                    entity_type: EntityType::User,
                    external_id: Some(reference),
                    name: Some(name),
                    description,
                    modality: None,
                },
                refresh,
            },
            stats,
        )
        .await
    }

    async fn ensure_article_entity(
        &self,
        article_id: ArticleId,
        stats: &mut SyncStats,
    ) -> Result<EntityId> {
        let reference = article_id.to_string();
        let article = self.store.find_article(article_id).await?;

        let (name, description, refresh) = match article {
            Some(article) => (
                article.title,
                Some(safe_truncate(&article.content, DESCRIPTION_CHARS)),
                Refresh::NameAndDescription,
            ),
            None => (placeholder_label("article", &reference), None, Refresh::Never),
        };

        self.ensure_entity(
            EntitySeed {
                entity: NewEntity {
                    entity_type: EntityType::Article,
                    external_id: Some(reference),
                    name: Some(name),
                    description,
                    modality: Some(MODALITY_TEXT.to_string()),
                },
                refresh,
            },
            stats,
        )
        .await
    }

    async fn ensure_tag_entity(
        &self,
        tag_id: TagId,
        tag_name: Option<String>,
        stats: &mut SyncStats,
    ) -> Result<EntityId> {
        let reference = tag_id.to_string();
        let name = tag_name.unwrap_or_else(|| placeholder_label("tag", &reference));

        self.ensure_entity(
            EntitySeed {
                entity: NewEntity {
                    entity_type: EntityType::Tag,
                    external_id: Some(reference),
                    name: Some(name),
                    description: None,
                    modality: Some(MODALITY_TEXT.to_string()),
                },
                refresh: Refresh::Name,
            },
            stats,
        )
        .await
    }

    /// Look up by `(type, external_id)`, patch changed fields, or insert.
    /// A unique violation on insert means a concurrent writer won; re-read.
    async fn ensure_entity(&self, seed: EntitySeed, stats: &mut SyncStats) -> Result<EntityId> {
        let entity_type = seed.entity.entity_type;
        let external_id = seed.entity.external_id.clone().unwrap_or_default();

        if let Some(existing) = self.store.find_entity(entity_type, &external_id).await? {
            self.refresh_entity(existing.clone(), &seed, stats).await?;
            return Ok(existing.id);
        }

        match self.store.insert_entity(&seed.entity).await {
            Ok(created) => {
                stats.entities_created += 1;
                debug!("Created KG entity {} {}", entity_type, external_id);
                Ok(created.id)
            }
            Err(StoreError::Conflict(detail)) => {
                debug!("Entity created concurrently ({}), re-reading", detail);
                self.store
                    .find_entity(entity_type, &external_id)
                    .await?
                    .map(|entity| entity.id)
                    .ok_or_else(|| StoreError::NotFound(detail).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn refresh_entity(
        &self,
        mut existing: KnowledgeEntity,
        seed: &EntitySeed,
        stats: &mut SyncStats,
    ) -> Result<()> {
        let name_changed = existing.name != seed.entity.name;
        let description_changed = existing.description != seed.entity.description;

        let changed = match seed.refresh {
            Refresh::Never => false,
            Refresh::Name => name_changed,
            Refresh::NameAndDescription => name_changed || description_changed,
        };
        if !changed {
            return Ok(());
        }

        existing.name = seed.entity.name.clone();
        if seed.refresh == Refresh::NameAndDescription {
            existing.description = seed.entity.description.clone();
        }
        self.store.update_entity(&existing).await?;
        stats.entities_updated += 1;
        Ok(())
    }

    /// Existing edges get their weight replaced, never accumulated.
    async fn upsert_relation(&self, key: &RelationKey, weight: f64, stats: &mut SyncStats) -> Result<()> {
        let weight = weight.max(0.0);

        let existing = match self.store.find_relation(key).await? {
            Some(existing) => existing,
            None => match self.store.insert_relation(key, weight).await {
                Ok(_) => {
                    stats.relations_created += 1;
                    return Ok(());
                }
                Err(StoreError::Conflict(detail)) => self
                    .store
                    .find_relation(key)
                    .await?
                    .ok_or(StoreError::NotFound(detail))?,
                Err(e) => return Err(e.into()),
            },
        };

        if existing.weight == weight {
            stats.relations_unchanged += 1;
        } else {
            self.store.update_relation_weight(existing.id, weight).await?;
            stats.relations_updated += 1;
        }
        Ok(())
    }

    async fn load_tag_names(&self, ids: Vec<TagId>) -> Result<HashMap<TagId, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        Ok(self
            .store
            .find_tags_by_ids(&ids)
            .await?
            .into_iter()
            .map(|tag| (tag.id, tag.name))
            .collect())
    }
}

impl std::fmt::Debug for KnowledgeGraphSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeGraphSync").finish_non_exhaustive()
    }
}


fn log_sync(kind: &str, id: i64, stats: &SyncStats) {
    if stats.writes() == 0 {
        debug!("Knowledge graph {} {} already in sync", kind, id);
    } else {
        info!(
            "Knowledge graph {} {}: +{} entities, ~{} entities, +{} relations, ~{} relations",
            kind,
            id,
            stats.entities_created,
            stats.entities_updated,
            stats.relations_created,
            stats.relations_updated
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{GraphStore, MemoryStore};
    use crate::models::{Article, Tag, User};
    use crate::toolkit::graph::models::GraphSummary;

    fn seeded_store() -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        store.insert_user(User {
            id: 1,
            username: "alice".to_string(),
            nickname: Some("Alice".to_string()),
        });
        store.insert_article(Article::new(10, "人工智能提升城市效率", "正文".repeat(200)));
        store.insert_tag(Tag::new(100, "科技"));
        store.insert_tag(Tag::new(101, "城市"));
        Arc::new(store)
    }

    fn article_tags() -> Vec<ArticleTag> {
        vec![ArticleTag::new(10, 100, 0.9), ArticleTag::new(10, 101, 0.4)]
    }

    #[tokio::test]
    async fn test_empty_input_is_noop() {
        let store = seeded_store();
        let sync = KnowledgeGraphSync::new(store.clone());

        let stats = sync.sync_article_tags(10, &[]).await.unwrap();
        assert_eq!(stats, SyncStats::default());
        let stats = sync.sync_user_tag_interests(1, &[]).await.unwrap();
        assert_eq!(stats, SyncStats::default());
        assert_eq!(store.entity_count(), 0);
    }

    #[tokio::test]
    async fn test_sync_article_tags_is_idempotent() {
        let store = seeded_store();
        let sync = KnowledgeGraphSync::new(store.clone());

        let first = sync.sync_article_tags(10, &article_tags()).await.unwrap();
        assert_eq!(first.entities_created, 3);
        assert_eq!(first.relations_created, 2);

        let second = sync.sync_article_tags(10, &article_tags()).await.unwrap();
        assert_eq!(second.writes(), 0);
        assert_eq!(second.relations_unchanged, 2);
        assert_eq!(store.entity_count(), 3);
        assert_eq!(store.relation_count(), 2);
    }

    #[tokio::test]
    async fn test_article_entity_fields() {
        let store = seeded_store();
        let sync = KnowledgeGraphSync::new(store.clone());
        sync.sync_article_tags(10, &article_tags()).await.unwrap();

        let entity = store.find_entity(EntityType::Article, "10").await.unwrap().unwrap();
        assert_eq!(entity.name.as_deref(), Some("人工智能提升城市效率"));
        assert_eq!(entity.description.as_ref().unwrap().chars().count(), DESCRIPTION_CHARS);
        assert_eq!(entity.modality.as_deref(), Some(MODALITY_TEXT));
    }

    #[tokio::test]
    async fn test_relation_weight_is_replaced_not_accumulated() {
        let store = seeded_store();
        let sync = KnowledgeGraphSync::new(store.clone());
        sync.sync_article_tags(10, &article_tags()).await.unwrap();

        let stats = sync
            .sync_article_tags(10, &[ArticleTag::new(10, 100, 0.2)])
            .await
            .unwrap();
        assert_eq!(stats.relations_updated, 1);

        let relations = store.find_all_relations().await.unwrap();
        assert_eq!(relations.len(), 2);
        let tag_entity = store.find_entity(EntityType::Tag, "100").await.unwrap().unwrap();
        let updated = relations.iter().find(|r| r.touches(tag_entity.id)).unwrap();
        assert_eq!(updated.weight, 0.2);
    }

    #[tokio::test]
    async fn test_interest_edges_are_undirected_and_clamped() {
        let store = seeded_store();
        let sync = KnowledgeGraphSync::new(store.clone());

        // tag entities first so they get lower ids than the user
        sync.sync_article_tags(10, &article_tags()).await.unwrap();
        let weights = vec![UserTagWeight::new(1, 100, 1.5), UserTagWeight::new(1, 101, -0.3)];
        let stats = sync.sync_user_tag_interests(1, &weights).await.unwrap();
        assert_eq!(stats.entities_created, 1);
        assert_eq!(stats.relations_created, 2);

        let user = store.find_entity(EntityType::User, "1").await.unwrap().unwrap();
        assert_eq!(user.name.as_deref(), Some("Alice"));
        assert_eq!(user.description.as_deref(), Some("alice"));

        let interests: Vec<_> = store
            .find_all_relations()
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.relation_type == RelationType::Interest)
            .collect();
        assert_eq!(interests.len(), 2);
        for relation in &interests {
            assert!(relation.source_id < relation.target_id);
            assert_eq!(relation.target_id, user.id);
            assert_eq!(relation.modality.as_deref(), Some(MODALITY_BEHAVIOR));
            assert!(relation.weight >= 0.0);
        }
        assert!(interests.iter().any(|r| r.weight == 1.5));
        assert!(interests.iter().any(|r| r.weight == 0.0));
    }

    #[tokio::test]
    async fn test_entity_names_refresh_only_when_changed() {
        let store = seeded_store();
        let sync = KnowledgeGraphSync::new(store.clone());
        let weights = vec![UserTagWeight::new(1, 100, 0.5)];
        sync.sync_user_tag_interests(1, &weights).await.unwrap();

        store.insert_user(User {
            id: 1,
            username: "alice".to_string(),
            nickname: Some("Alice W.".to_string()),
        });
        store.insert_tag(Tag::new(100, "前沿科技"));

        let stats = sync.sync_user_tag_interests(1, &weights).await.unwrap();
        assert_eq!(stats.entities_updated, 2);
        assert_eq!(stats.entities_created, 0);

        let tag = store.find_entity(EntityType::Tag, "100").await.unwrap().unwrap();
        assert_eq!(tag.name.as_deref(), Some("前沿科技"));

        let stats = sync.sync_user_tag_interests(1, &weights).await.unwrap();
        assert_eq!(stats.writes(), 0);
    }

    #[tokio::test]
    async fn test_unknown_rows_get_placeholder_names() {
        let store = Arc::new(MemoryStore::new());
        let sync = KnowledgeGraphSync::new(store.clone());
        sync.sync_user_tag_interests(7, &[UserTagWeight::new(7, 8, 0.3)])
            .await
            .unwrap();

        let user = store.find_entity(EntityType::User, "7").await.unwrap().unwrap();
        let tag = store.find_entity(EntityType::Tag, "8").await.unwrap().unwrap();
        assert_eq!(user.name.as_deref(), Some("user-7"));
        assert_eq!(tag.name.as_deref(), Some("tag-8"));
    }

    #[tokio::test]
    async fn test_concurrent_syncs_do_not_duplicate() {
        let store = seeded_store();
        let sync = Arc::new(KnowledgeGraphSync::new(store.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let sync = Arc::clone(&sync);
            handles.push(tokio::spawn(async move {
                sync.sync_article_tags(10, &article_tags()).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.entity_count(), 3);
        assert_eq!(store.relation_count(), 2);
    }

    #[tokio::test]
    async fn test_load_graph_summary_with_focus() {
        let store = seeded_store();
        let sync = KnowledgeGraphSync::new(store.clone());

        let empty = sync.load_graph_summary(Some(EntityType::User)).await.unwrap();
        assert!(empty.is_empty());

        sync.sync_article_tags(10, &article_tags()).await.unwrap();
        sync.sync_user_tag_interests(1, &[UserTagWeight::new(1, 100, 0.8)])
            .await
            .unwrap();

        let full = sync.load_graph_summary(None).await.unwrap();
        assert_eq!(full.nodes.len(), 4);
        assert_eq!(full.edges.len(), 3);

        let users = sync.load_graph_summary(Some(EntityType::User)).await.unwrap();
        assert_eq!(users.nodes.len(), 2);
        assert_eq!(users.edges.len(), 1);
        assert_eq!(users.focus_type, Some(EntityType::User));

        let people = sync.load_graph_summary(Some(EntityType::Person)).await.unwrap();
        assert_eq!(people, GraphSummary::empty(Some(EntityType::Person)));
    }
}
