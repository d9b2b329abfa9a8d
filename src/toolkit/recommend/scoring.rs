use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::core::RecommendConfig;
use crate::models::{ArticleId, TagId};
use crate::text::{cosine_dense, cosine_sparse, normalize_by_max, SparseVector, TagVector};


/// Exponential freshness decay on whole elapsed hours. A missing timestamp
/// counts as "now"; future timestamps count as zero hours old.
pub fn recency(time: Option<DateTime<Utc>>, now: DateTime<Utc>, tau_hours: f64) -> f64 {
    let Some(time) = time else { return 1.0; };
    let hours = (now - time).num_hours().max(0) as f64;
    (-hours / tau_hours).exp()
}


pub fn blend_score(content: f64, tag: f64, recency: f64, config: &RecommendConfig) -> f64 {
    let score = config.alpha * content + (1.0 - config.alpha) * tag + config.beta * recency;
    score.clamp(0.0, 1.0)
}


/// Mean of the given vectors, key by key. Empty input gives an empty vector.
pub fn average_vectors<'a>(vectors: impl IntoIterator<Item = &'a SparseVector>) -> SparseVector {
    let mut sum = SparseVector::new();
    let mut count = 0usize;
    for vector in vectors {
        for (index, weight) in vector {
            *sum.entry(*index).or_insert(0.0) += weight;
        }
        count += 1;
    }
    if count > 0 {
        let divisor = count as f64;
        for weight in sum.values_mut() {
            *weight /= divisor;
        }
    }
    sum
}


/// One candidate ready to be scored.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub article_id: ArticleId,
    pub content_vector: Option<&'a SparseVector>,
    pub tag_weights: Vec<(TagId, f64)>,
    pub time: Option<DateTime<Utc>>,
}


#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredCandidate {
    pub article_id: ArticleId,
    pub position: usize,
    pub score: f64,
}


/// Scores every candidate against the user's profiles and returns them
/// best first. Equal scores keep candidate order.
pub fn rank_candidates(
    candidates: &[Candidate<'_>],
    content_profile: &SparseVector,
    tag_profile: &TagVector,
    now: DateTime<Utc>,
    config: &RecommendConfig,
) -> Vec<ScoredCandidate> {
    let tau_hours = config.tau_hours();
    let empty = SparseVector::new();

    let mut scored: Vec<ScoredCandidate> = candidates
        .iter()
        .enumerate()
        .map(|(position, candidate)| {
            let content = cosine_sparse(candidate.content_vector.unwrap_or(&empty), content_profile);
            let article_tags: TagVector = normalize_by_max(candidate.tag_weights.iter().copied());
            let tag = cosine_dense(&article_tags, tag_profile);
            let fresh = recency(candidate.time, now, tau_hours);
            ScoredCandidate {
                article_id: candidate.article_id,
                position,
                score: blend_score(content, tag, fresh, config),
            }
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored
}


/// User tag weights scaled so the strongest interest is 1.0.
pub fn tag_profile(weights: impl IntoIterator<Item = (TagId, f64)>) -> TagVector {
    normalize_by_max(weights)
}


pub fn group_tag_weights(rows: impl IntoIterator<Item = (ArticleId, TagId, f64)>) -> HashMap<ArticleId, Vec<(TagId, f64)>> {
    let mut grouped: HashMap<ArticleId, Vec<(TagId, f64)>> = HashMap::new();
    for (article_id, tag_id, weight) in rows {
        grouped.entry(article_id).or_default().push((tag_id, weight));
    }
    grouped
}
