use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ArticleId, TagId};
use crate::text::{cosine_sparse, TfidfModel, TfidfVectorizer};


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagPrediction {
    pub tag_id: TagId,
    pub tag_name: String,
    pub score: f64,
}


/// One labelled training title.
#[derive(Debug, Clone)]
pub struct TitleSample {
    pub article_id: ArticleId,
    pub title: String,
    pub tag_ids: Vec<TagId>,
}


/// Immutable k-nearest-neighbour model over article titles.
#[derive(Debug, Clone)]
pub struct TitleModel {
    tfidf: TfidfModel,
    article_tags: HashMap<ArticleId, Vec<TagId>>,
    tag_names: HashMap<TagId, String>,
    built_at: DateTime<Utc>,
}

impl TitleModel {
    pub fn build(samples: Vec<TitleSample>, tag_names: HashMap<TagId, String>) -> Self {
        let tfidf = TfidfVectorizer::new().fit(
            samples
                .iter()
                .map(|sample| (sample.article_id, sample.title.as_str())),
        );
        let article_tags = samples
            .into_iter()
            .map(|sample| (sample.article_id, sample.tag_ids))
            .collect();

        Self {
            tfidf,
            article_tags,
            tag_names,
            built_at: Utc::now(),
        }
    }

    /// Similarity-weighted vote of the `neighbor_k` closest titles.
    /// Both limits must already be clamped by the caller.
    pub fn predict(&self, title: &str, top_k: usize, neighbor_k: usize) -> Vec<TagPrediction> {
        let query = self.tfidf.transform(title);
        if query.is_empty() {
            return Vec::new();
        }

        let mut neighbors: Vec<(ArticleId, f64)> = self
            .tfidf
            .documents()
            .map(|(article_id, vector)| (article_id, cosine_sparse(vector, &query)))
            .filter(|(_, similarity)| *similarity > 0.0)
            .collect();
        neighbors.sort_by(|a, b| by_score_then_id(a.1, b.1, a.0, b.0));
        neighbors.truncate(neighbor_k);

        let mut votes: HashMap<TagId, f64> = HashMap::new();
        for (article_id, similarity) in &neighbors {
            if let Some(tags) = self.article_tags.get(article_id) {
                for tag_id in tags {
                    *votes.entry(*tag_id).or_insert(0.0) += similarity;
                }
            }
        }

        let mut ranked: Vec<(TagId, f64)> = votes.into_iter().collect();
        ranked.sort_by(|a, b| by_score_then_id(a.1, b.1, a.0, b.0));

        ranked
            .into_iter()
            .take(top_k)
            .filter_map(|(tag_id, score)| {
                let tag_name = self.tag_names.get(&tag_id)?.clone();
                Some(TagPrediction {
                    tag_id,
                    tag_name,
                    score,
                })
            })
            .collect()
    }

    pub fn sample_count(&self) -> usize {
        self.tfidf.document_count()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.tfidf.vocabulary().len()
    }

    pub fn tag_count(&self) -> usize {
        self.tag_names.len()
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }
}


fn by_score_then_id(score_a: f64, score_b: f64, id_a: i64, id_b: i64) -> Ordering {
    score_b
        .partial_cmp(&score_a)
        .unwrap_or(Ordering::Equal)
        .then(id_a.cmp(&id_b))
}
