//! Per-user article ranking: content similarity to the reading history,
//! tag-interest similarity and a recency bonus.

pub mod scoring;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{RecommendConfig, Result};
use crate::db::Store;
use crate::models::{Article, ArticleId, TagId, UserId};
use crate::text::TfidfVectorizer;
use crate::utils::safe_truncate;

pub use scoring::{blend_score, rank_candidates, recency, Candidate, ScoredCandidate};

const SUMMARY_CHARS: usize = 200;


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedArticle {
    pub id: ArticleId,
    pub title: String,
    pub summary: String,
    pub source: Option<String>,
    pub publish_time: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub score: f64,
}


pub struct Recommender {
    store: Arc<dyn Store>,
    config: RecommendConfig,
}

impl Recommender {
    pub fn new(store: Arc<dyn Store>, config: RecommendConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RecommendConfig {
        &self.config
    }

    /// Ranks the recent candidate pool for `user_id`. The TF-IDF space is
    /// fitted on the pool itself for every call.
    pub async fn recommend_for_user(&self, user_id: UserId, top_k: usize) -> Result<Vec<RecommendedArticle>> {
        let candidates = self.store.find_recent(self.config.candidate_limit).await?;
        if candidates.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let history = self
            .store
            .find_recent_article_ids(user_id, self.config.history_limit)
            .await?;
        let user_weights: Vec<(TagId, f64)> = self
            .store
            .find_user_tags(user_id)
            .await?
            .into_iter()
            .map(|row| (row.tag_id, row.weight))
            .collect();

        let candidate_ids: Vec<ArticleId> = candidates.iter().map(|article| article.id).collect();
        let article_tags = scoring::group_tag_weights(
            self.store
                .find_article_tags(&candidate_ids)
                .await?
                .into_iter()
                .map(|row| (row.article_id, row.tag_id, row.weight)),
        );

        let config = self.config.clone();
        let now = Utc::now();
        let (candidates, article_tags, ranked) = tokio::task::spawn_blocking(move || {
            let ranked = score_pool(&candidates, &article_tags, &history, user_weights, now, &config);
            (candidates, article_tags, ranked)
        })
        .await?;

        let top: Vec<ScoredCandidate> = ranked.into_iter().take(top_k).collect();
        let tag_names = self.resolve_tag_names(&top, &article_tags).await?;

        let results: Vec<RecommendedArticle> = top
            .iter()
            .map(|scored| {
                let article = &candidates[scored.position];
                let tags = article_tags
                    .get(&article.id)
                    .map(|weights| {
                        weights
                            .iter()
                            .filter_map(|(tag_id, _)| tag_names.get(tag_id).cloned())
                            .collect()
                    })
                    .unwrap_or_default();
                to_recommended(article, tags, scored.score)
            })
            .collect();

        if !results.is_empty() {
            let avg = results.iter().map(|r| r.score).sum::<f64>() / results.len() as f64;
            debug!(
                "Recommended {} of {} candidates for user {} (avg score {:.3})",
                results.len(),
                candidates.len(),
                user_id,
                avg
            );
        }
        Ok(results)
    }

    async fn resolve_tag_names(
        &self,
        top: &[ScoredCandidate],
        article_tags: &HashMap<ArticleId, Vec<(TagId, f64)>>,
    ) -> Result<HashMap<TagId, String>> {
        let mut seen = HashSet::new();
        let tag_ids: Vec<TagId> = top
            .iter()
            .filter_map(|scored| article_tags.get(&scored.article_id))
            .flatten()
            .map(|(tag_id, _)| *tag_id)
            .filter(|tag_id| seen.insert(*tag_id))
            .collect();
        if tag_ids.is_empty() {
            return Ok(HashMap::new());
        }

        Ok(self
            .store
            .find_tags_by_ids(&tag_ids)
            .await?
            .into_iter()
            .map(|tag| (tag.id, tag.name))
            .collect())
    }
}


fn score_pool(
    candidates: &[Article],
    article_tags: &HashMap<ArticleId, Vec<(TagId, f64)>>,
    history: &[ArticleId],
    user_weights: Vec<(TagId, f64)>,
    now: DateTime<Utc>,
    config: &RecommendConfig,
) -> Vec<ScoredCandidate> {
    let model = TfidfVectorizer::new().fit(
        candidates
            .iter()
            .map(|article| (article.id, article.content.as_str())),
    );

    // history outside the pool has no vector in this space
    let content_profile = scoring::average_vectors(
        history
            .iter()
            .filter_map(|article_id| model.document_vector(*article_id)),
    );
    let tag_profile = scoring::tag_profile(user_weights);

    let pool: Vec<Candidate<'_>> = candidates
        .iter()
        .map(|article| Candidate {
            article_id: article.id,
            content_vector: model.document_vector(article.id),
            tag_weights: article_tags.get(&article.id).cloned().unwrap_or_default(),
            time: article.effective_time(),
        })
        .collect();

    rank_candidates(&pool, &content_profile, &tag_profile, now, config)
}


fn to_recommended(article: &Article, tags: Vec<String>, score: f64) -> RecommendedArticle {
    RecommendedArticle {
        id: article.id,
        title: article.title.clone(),
        summary: safe_truncate(&article.content, SUMMARY_CHARS),
        source: article.source.clone(),
        publish_time: article.effective_time(),
        tags,
        score,
    }
}

impl std::fmt::Debug for Recommender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Recommender(alpha={}, beta={}, candidate_limit={})",
            self.config.alpha, self.config.beta, self.config.candidate_limit
        )
    }
}
