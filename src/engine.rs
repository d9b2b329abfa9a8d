//! One entry point over a shared store. Services share the same
//! [`KnowledgeGraphSync`] so every graph write goes through one unit of work.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::core::{EngineConfig, Result};
use crate::db::Store;
use crate::models::{ArticleId, ArticleTag, EventType, Tag, TagId, UserId, UserTagWeight};
use crate::toolkit::classifier::{TagPrediction, TitleClassifier};
use crate::toolkit::graph::{EntityType, GraphSummary, KnowledgeGraphSync, SyncStats};
use crate::toolkit::interest::UserInterestService;
use crate::toolkit::recommend::{RecommendedArticle, Recommender};
use crate::toolkit::tagging::{ArticleAutoTagger, AutoTagOutcome, KeywordTagger};


pub struct NewsrecEngine {
    store: Arc<dyn Store>,
    config: EngineConfig,
    recommender: Recommender,
    classifier: Arc<TitleClassifier>,
    graph: Arc<KnowledgeGraphSync>,
    interest: UserInterestService,
    auto_tagger: ArticleAutoTagger,
}

impl NewsrecEngine {
    pub fn new(store: Arc<dyn Store>, config: EngineConfig, keywords: KeywordTagger) -> Self {
        let graph = Arc::new(KnowledgeGraphSync::new(store.clone()));
        let classifier = Arc::new(TitleClassifier::new(store.clone(), config.classifier.clone()));
        let recommender = Recommender::new(store.clone(), config.reco.clone());
        let interest = UserInterestService::new(store.clone(), graph.clone(), config.interest.clone());
        let auto_tagger = ArticleAutoTagger::new(
            store.clone(),
            classifier.clone(),
            Arc::new(keywords),
            graph.clone(),
            config.tagging.clone(),
        );

        Self {
            store,
            config,
            recommender,
            classifier,
            graph,
            interest,
            auto_tagger,
        }
    }

    /// Builds the engine with keyword rules read from `tagging.rules_path`.
    /// An unreadable rules file only disables the keyword fallback.
    pub fn from_config(store: Arc<dyn Store>, config: EngineConfig) -> Self {
        let keywords = KeywordTagger::load_or_empty(config.tagging.rules_path.as_deref());
        Self::new(store, config, keywords)
    }

    /// Initial classifier build. Call once after construction.
    pub async fn init(&self) -> Result<()> {
        let samples = self.classifier.reload_model().await?;
        info!("NewsrecEngine ready (classifier samples={})", samples);
        Ok(())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn recommend_for_user(&self, user_id: UserId, top_k: usize) -> Result<Vec<RecommendedArticle>> {
        self.recommender.recommend_for_user(user_id, top_k).await
    }

    pub fn predict_tags(
        &self,
        title: &str,
        top_k: Option<usize>,
        neighbor_k: Option<usize>,
    ) -> Vec<TagPrediction> {
        self.classifier.predict_tags(title, top_k, neighbor_k)
    }

    pub async fn reload_model(&self) -> Result<usize> {
        self.classifier.reload_model().await
    }

    pub async fn sync_user_tag_interests(
        &self,
        user_id: UserId,
        tag_weights: &[UserTagWeight],
    ) -> Result<SyncStats> {
        self.graph.sync_user_tag_interests(user_id, tag_weights).await
    }

    pub async fn sync_article_tags(&self, article_id: ArticleId, article_tags: &[ArticleTag]) -> Result<SyncStats> {
        self.graph.sync_article_tags(article_id, article_tags).await
    }

    pub async fn load_graph_summary(&self, focus_type: Option<EntityType>) -> Result<GraphSummary> {
        self.graph.load_graph_summary(focus_type).await
    }

    pub async fn list_all_tags(&self) -> Result<Vec<Tag>> {
        Ok(self.store.find_all_tags().await?)
    }

    pub async fn save_user_tags(&self, user_id: UserId, tag_ids: &[TagId]) -> Result<Vec<UserTagWeight>> {
        self.interest.save_user_tags(user_id, tag_ids).await
    }

    pub async fn increment_weights(
        &self,
        user_id: UserId,
        increments: &BTreeMap<TagId, f64>,
        max_weight: Option<f64>,
    ) -> Result<Vec<UserTagWeight>> {
        let cap = max_weight.unwrap_or(self.config.interest.max_weight);
        self.interest.increment_weights(user_id, increments, cap).await
    }

    pub async fn record_event(&self, user_id: UserId, article_id: ArticleId, event_type: EventType) -> Result<()> {
        self.interest.record_event(user_id, article_id, event_type).await
    }

    pub async fn apply_tags_by_title(
        &self,
        article_id: ArticleId,
        title: &str,
        fallback_content: Option<&str>,
        top_k: Option<usize>,
    ) -> Result<AutoTagOutcome> {
        self.auto_tagger
            .apply_by_title(article_id, title, fallback_content, top_k)
            .await
    }
}

impl std::fmt::Debug for NewsrecEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewsrecEngine")
            .field("recommender", &self.recommender)
            .field("classifier", &self.classifier)
            .field("auto_tagger", &self.auto_tagger)
            .finish()
    }
}
