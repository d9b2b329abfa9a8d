use std::sync::Arc;

use tracing::{debug, info};

use super::rules::KeywordTagger;
use crate::core::{Result, TaggingConfig};
use crate::db::{Store, StoreError};
use crate::models::{ArticleId, ArticleTag};
use crate::toolkit::classifier::{TagPrediction, TitleClassifier};
use crate::toolkit::graph::KnowledgeGraphSync;


/// Where an article's tags came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOrigin {
    Classifier,
    Keywords,
    None,
}


#[derive(Debug, Clone, PartialEq)]
pub struct AutoTagOutcome {
    pub origin: TagOrigin,
    pub tags: Vec<ArticleTag>,
}


/// Title-first tagging: kNN predictions when the classifier has any,
/// keyword rules over the body otherwise.
pub struct ArticleAutoTagger {
    store: Arc<dyn Store>,
    classifier: Arc<TitleClassifier>,
    keywords: Arc<KeywordTagger>,
    graph: Arc<KnowledgeGraphSync>,
    config: TaggingConfig,
}

impl ArticleAutoTagger {
    pub fn new(
        store: Arc<dyn Store>,
        classifier: Arc<TitleClassifier>,
        keywords: Arc<KeywordTagger>,
        graph: Arc<KnowledgeGraphSync>,
        config: TaggingConfig,
    ) -> Self {
        Self {
            store,
            classifier,
            keywords,
            graph,
            config,
        }
    }

    /// Replaces the article's tag rows wholesale and mirrors them into the
    /// knowledge graph.
    pub async fn apply_by_title(
        &self,
        article_id: ArticleId,
        title: &str,
        fallback_content: Option<&str>,
        top_k: Option<usize>,
    ) -> Result<AutoTagOutcome> {
        let top_k = top_k.unwrap_or(self.config.auto_tag_top_k);
        self.store.delete_article_tags(article_id).await?;

        let predictions = self.classifier.predict_tags(title, Some(top_k), None);
        let (origin, mut tags) = if !predictions.is_empty() {
            (
                TagOrigin::Classifier,
                normalized_tags(article_id, &predictions, self.config.min_auto_weight),
            )
        } else {
            match fallback_content.filter(|content| !content.trim().is_empty()) {
                Some(content) => {
                    let matched: Vec<ArticleTag> = self
                        .keywords
                        .match_tags(content)
                        .into_iter()
                        .map(|(tag_id, weight)| ArticleTag::new(article_id, tag_id, weight))
                        .collect();
                    let origin = if matched.is_empty() { TagOrigin::None } else { TagOrigin::Keywords };
                    (origin, matched)
                }
                None => (TagOrigin::None, Vec::new()),
            }
        };
        tags.sort_by_key(|tag| tag.tag_id);

        for tag in &tags {
            match self.store.insert_article_tag(tag).await {
                Ok(()) => {}
                // another tagging pass wrote the same pair after our delete
                Err(StoreError::Conflict(_)) => {
                    debug!("Article tag ({}, {}) created concurrently", article_id, tag.tag_id);
                }
                Err(e) => return Err(e.into()),
            }
        }
        self.graph.sync_article_tags(article_id, &tags).await?;

        if tags.is_empty() {
            debug!("No tags found for article {}", article_id);
        } else {
            info!("Tagged article {} with {} tags ({:?})", article_id, tags.len(), origin);
        }
        Ok(AutoTagOutcome { origin, tags })
    }
}


/// Scales prediction scores by the best one and clamps to `[min_weight, 1]`.
fn normalized_tags(article_id: ArticleId, predictions: &[TagPrediction], min_weight: f64) -> Vec<ArticleTag> {
    let max_score = predictions
        .iter()
        .map(|p| p.score)
        .fold(f64::NEG_INFINITY, f64::max);
    let max_score = if max_score > 0.0 { max_score } else { 1.0 };

    predictions
        .iter()
        .map(|p| ArticleTag::new(article_id, p.tag_id, (p.score / max_score).clamp(min_weight, 1.0)))
        .collect()
}

impl std::fmt::Debug for ArticleAutoTagger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ArticleAutoTagger(rules={}, top_k={})",
            self.keywords.len(),
            self.config.auto_tag_top_k
        )
    }
}
