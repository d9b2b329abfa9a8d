//! Title classifier: kNN tag prediction over the TF-IDF space of recent,
//! already tagged article titles.

pub mod model;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::core::{ClassifierConfig, Result};
use crate::db::Store;
use crate::models::{ArticleId, TagId};

pub use model::{TagPrediction, TitleModel, TitleSample};


pub struct TitleClassifier {
    store: Arc<dyn Store>,
    config: ClassifierConfig,
    // Readers clone the Arc and release the lock at once; a rebuild only
    // takes the write lock to replace the pointer.
    model: RwLock<Option<Arc<TitleModel>>>,
}

impl TitleClassifier {
    pub fn new(store: Arc<dyn Store>, config: ClassifierConfig) -> Self {
        info!(
            "TitleClassifier initialized (max_articles={}, batch_size={})",
            config.max_articles, config.batch_size
        );
        Self {
            store,
            config,
            model: RwLock::new(None),
        }
    }

    /// Current snapshot, if a model has been built.
    pub fn snapshot(&self) -> Option<Arc<TitleModel>> {
        self.model.read().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.model.read().is_some()
    }

    /// Rebuilds from the most recent tagged articles and publishes the new
    /// model in one pointer swap. Returns the number of training samples.
    pub async fn reload_model(&self) -> Result<usize> {
        let samples = self.collect_samples().await?;
        if samples.is_empty() {
            warn!("TitleClassifier model not built: no articles with tags available");
            *self.model.write() = None;
            return Ok(0);
        }

        let tag_names: HashMap<TagId, String> = self
            .store
            .find_all_tags()
            .await?
            .into_iter()
            .map(|tag| (tag.id, tag.name))
            .collect();

        let model = tokio::task::spawn_blocking(move || TitleModel::build(samples, tag_names)).await?;
        let sample_count = model.sample_count();
        info!(
            "TitleClassifier model built with {} articles and {} tags",
            sample_count,
            model.tag_count()
        );

        *self.model.write() = Some(Arc::new(model));
        Ok(sample_count)
    }

    /// Pages through articles newest first, keeping those with a non-blank
    /// title and at least one tag, up to `max_articles`.
    async fn collect_samples(&self) -> Result<Vec<TitleSample>> {
        let max_articles = self.config.max_articles;
        let batch_size = self.config.batch_size.max(1);
        let mut samples: Vec<TitleSample> = Vec::new();
        let mut offset = 0;

        while samples.len() < max_articles {
            let articles = self.store.list_by_publish_time(offset, batch_size).await?;
            if articles.is_empty() {
                break;
            }

            let ids: Vec<ArticleId> = articles.iter().map(|article| article.id).collect();
            let mut tags_by_article: HashMap<ArticleId, Vec<TagId>> = HashMap::new();
            for row in self.store.find_article_tags(&ids).await? {
                tags_by_article.entry(row.article_id).or_default().push(row.tag_id);
            }

            for article in &articles {
                if samples.len() >= max_articles {
                    break;
                }
                if article.title.trim().is_empty() {
                    continue;
                }
                if let Some(tag_ids) = tags_by_article.remove(&article.id) {
                    samples.push(TitleSample {
                        article_id: article.id,
                        title: article.title.clone(),
                        tag_ids,
                    });
                }
            }

            offset += articles.len();
            if articles.len() < batch_size {
                break;
            }
        }

        debug!("TitleClassifier collected {} samples from {} articles", samples.len(), offset);
        Ok(samples)
    }

    /// Ranked tag predictions for a bare title. `top_k` and `neighbor_k`
    /// fall back to the configured defaults and are clamped to their caps.
    pub fn predict_tags(
        &self,
        title: &str,
        top_k: Option<usize>,
        neighbor_k: Option<usize>,
    ) -> Vec<TagPrediction> {
        if title.trim().is_empty() {
            return Vec::new();
        }
        let Some(model) = self.snapshot() else {
            warn!("TitleClassifier model not ready, returning no predictions");
            return Vec::new();
        };

        let top_k = top_k
            .unwrap_or(self.config.default_top_k)
            .clamp(1, self.config.max_top_k.max(1));
        let neighbor_k = neighbor_k
            .unwrap_or(self.config.default_neighbor_k)
            .clamp(1, self.config.max_neighbor_k.max(1));

        let predictions = model.predict(title, top_k, neighbor_k);
        debug!("Predicted {} tags for title '{}'", predictions.len(), title);
        predictions
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }
}

impl std::fmt::Debug for TitleClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.snapshot() {
            Some(model) => write!(
                f,
                "TitleClassifier(samples={}, vocabulary={}, built_at={})",
                model.sample_count(),
                model.vocabulary_size(),
                model.built_at()
            ),
            None => write!(f, "TitleClassifier(not ready)"),
        }
    }
}
