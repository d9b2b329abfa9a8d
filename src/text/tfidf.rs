use std::collections::{HashMap, HashSet};

use super::tokenizer::tokenize;


pub type DocId = i64;

/// Term index to TF-IDF weight.
pub type SparseVector = HashMap<usize, f64>;


const DEFAULT_IDF: f64 = 1.0;


/// Fits TF-IDF models over a set of `(id, text)` documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct TfidfVectorizer;

impl TfidfVectorizer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Fits a model. Term indices are assigned in first-seen order across the
    /// documents as given; a repeated document id keeps its first text.
    pub fn fit<I, S>(&self, documents: I) -> TfidfModel
    where
        I: IntoIterator<Item = (DocId, S)>,
        S: AsRef<str>,
    {
        let mut vocabulary: HashMap<String, usize> = HashMap::new();
        let mut document_frequency: HashMap<usize, usize> = HashMap::new();
        let mut term_frequencies: Vec<(DocId, SparseVector)> = Vec::new();
        let mut seen: HashSet<DocId> = HashSet::new();

        for (doc_id, text) in documents {
            if !seen.insert(doc_id) {
                continue;
            }

            let tokens = tokenize(text.as_ref());
            if tokens.is_empty() {
                term_frequencies.push((doc_id, SparseVector::new()));
                continue;
            }

            let mut counts = SparseVector::new();
            for token in &tokens {
                let next_index = vocabulary.len();
                let index = *vocabulary.entry(token.clone()).or_insert(next_index);
                *counts.entry(index).or_insert(0.0) += 1.0;
            }

            let token_count = tokens.len() as f64;
            for index in counts.keys() {
                *document_frequency.entry(*index).or_insert(0) += 1;
            }
            let tf = counts
                .into_iter()
                .map(|(index, count)| (index, count / token_count))
                .collect();
            term_frequencies.push((doc_id, tf));
        }

        let total_docs = term_frequencies.len() as f64;
        let idf: HashMap<usize, f64> = document_frequency
            .into_iter()
            .map(|(index, df)| (index, smoothed_idf(total_docs, df as f64)))
            .collect();

        let mut order = Vec::with_capacity(term_frequencies.len());
        let mut document_vectors = HashMap::with_capacity(term_frequencies.len());
        for (doc_id, tf) in term_frequencies {
            let vector: SparseVector = tf
                .into_iter()
                .map(|(index, tf)| (index, tf * idf.get(&index).copied().unwrap_or(DEFAULT_IDF)))
                .collect();
            order.push(doc_id);
            document_vectors.insert(doc_id, vector);
        }

        TfidfModel {
            vocabulary,
            idf,
            document_vectors,
            order,
        }
    }

    /// Fits and keeps only the per-document vectors.
    pub fn vectorize<I, S>(&self, documents: I) -> HashMap<DocId, SparseVector>
    where
        I: IntoIterator<Item = (DocId, S)>,
        S: AsRef<str>,
    {
        self.fit(documents).document_vectors
    }
}


/// `ln((N + 1) / (df + 1)) + 1`: strictly positive and decreasing in `df`.
#[inline]
pub fn smoothed_idf(total_docs: f64, df: f64) -> f64 {
    ((total_docs + 1.0) / (df + 1.0)).ln() + 1.0
}


/// Immutable fitted vector space.
#[derive(Debug, Clone, Default)]
pub struct TfidfModel {
    vocabulary: HashMap<String, usize>,
    idf: HashMap<usize, f64>,
    document_vectors: HashMap<DocId, SparseVector>,
    order: Vec<DocId>,
}

impl TfidfModel {
    /// Projects `text` into the fitted space. Tokens outside the vocabulary
    /// contribute nothing, but still count towards the term-frequency total.
    pub fn transform(&self, text: &str) -> SparseVector {
        if text.trim().is_empty() || self.vocabulary.is_empty() {
            return SparseVector::new();
        }

        let tokens = tokenize(text);
        if tokens.is_empty() {
            return SparseVector::new();
        }

        let mut counts: HashMap<usize, usize> = HashMap::new();
        for token in &tokens {
            if let Some(index) = self.vocabulary.get(token) {
                *counts.entry(*index).or_insert(0) += 1;
            }
        }

        let total_tokens = tokens.len() as f64;
        counts
            .into_iter()
            .map(|(index, count)| {
                let idf = self.idf.get(&index).copied().unwrap_or(DEFAULT_IDF);
                (index, count as f64 / total_tokens * idf)
            })
            .collect()
    }

    pub fn vocabulary(&self) -> &HashMap<String, usize> {
        &self.vocabulary
    }

    pub fn index_of(&self, token: &str) -> Option<usize> {
        self.vocabulary.get(token).copied()
    }

    pub fn idf(&self, index: usize) -> Option<f64> {
        self.idf.get(&index).copied()
    }

    pub fn document_vector(&self, doc_id: DocId) -> Option<&SparseVector> {
        self.document_vectors.get(&doc_id)
    }

    /// Document vectors in fit order.
    pub fn documents(&self) -> impl Iterator<Item = (DocId, &SparseVector)> + '_ {
        self.order
            .iter()
            .filter_map(|id| self.document_vectors.get(id).map(|vector| (*id, vector)))
    }

    pub fn document_count(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vocabulary.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_docs() -> Vec<(DocId, &'static str)> {
        vec![
            (1, "人工智能 提升 城市 效率"),
            (2, "人工智能 推动 医疗 诊断"),
        ]
    }

    #[test]
    fn test_shared_token_has_same_index_and_lower_idf() {
        let model = TfidfVectorizer::new().fit(two_docs());

        let shared = model.index_of("人工智能").unwrap();
        let unique = model.index_of("城市").unwrap();

        assert!(model.document_vector(1).unwrap().contains_key(&shared));
        assert!(model.document_vector(2).unwrap().contains_key(&shared));
        assert!(model.idf(shared).unwrap() < model.idf(unique).unwrap());
    }

    #[test]
    fn test_indices_follow_first_seen_order() {
        let model = TfidfVectorizer::new().fit(two_docs());
        assert_eq!(model.index_of("人工智能"), Some(0));
        assert_eq!(model.index_of("提升"), Some(1));
        assert_eq!(model.index_of("推动"), Some(4));
        assert_eq!(model.vocabulary().len(), 7);
    }

    #[test]
    fn test_idf_formula() {
        let model = TfidfVectorizer::new().fit(two_docs());
        let shared = model.index_of("人工智能").unwrap();
        assert!((model.idf(shared).unwrap() - 1.0).abs() < 1e-12);
        let unique = model.index_of("医疗").unwrap();
        assert!((model.idf(unique).unwrap() - ((3.0_f64 / 2.0).ln() + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_document_weights_are_tf_times_idf() {
        let model = TfidfVectorizer::new().fit(vec![(1, "rust rust tokio"), (2, "serde")]);
        let rust = model.index_of("rust").unwrap();
        let expected = 2.0 / 3.0 * smoothed_idf(2.0, 1.0);
        assert!((model.document_vector(1).unwrap()[&rust] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_empty_document_gets_empty_vector() {
        let model = TfidfVectorizer::new().fit(vec![(1, "rust tokio"), (2, "  的 of ")]);
        assert_eq!(model.document_count(), 2);
        assert!(model.document_vector(2).unwrap().is_empty());
    }

    #[test]
    fn test_empty_corpus() {
        let model = TfidfVectorizer::new().fit(Vec::<(DocId, String)>::new());
        assert!(model.is_empty());
        assert!(model.transform("anything").is_empty());
        assert!(TfidfVectorizer::new().vectorize(Vec::<(DocId, String)>::new()).is_empty());
    }

    #[test]
    fn test_transform_drops_unknown_terms() {
        let model = TfidfVectorizer::new().fit(two_docs());
        assert!(model.transform("完全 陌生 词汇").is_empty());

        let vector = model.transform("人工智能 陌生");
        assert_eq!(vector.len(), 1);
        let shared = model.index_of("人工智能").unwrap();
        assert!((vector[&shared] - 0.5 * model.idf(shared).unwrap()).abs() < 1e-12);
    }

    #[test]
    fn test_transform_is_idempotent() {
        let model = TfidfVectorizer::new().fit(two_docs());
        let first = model.transform("人工智能 医疗 城市 城市");
        let second = model.transform("人工智能 医疗 城市 城市");
        assert_eq!(first, second);
    }

    #[test]
    fn test_transform_matches_fitted_vector() {
        let model = TfidfVectorizer::new().fit(two_docs());
        let projected = model.transform("人工智能 提升 城市 效率");
        assert_eq!(&projected, model.document_vector(1).unwrap());
    }

    #[test]
    fn test_duplicate_id_keeps_first_text() {
        let model = TfidfVectorizer::new().fit(vec![(1, "alpha"), (1, "beta")]);
        assert_eq!(model.document_count(), 1);
        assert!(model.index_of("beta").is_none());
    }

    #[test]
    fn test_documents_iterate_in_fit_order() {
        let model = TfidfVectorizer::new().fit(vec![(9, "x"), (3, "y"), (5, "z")]);
        let ids: Vec<DocId> = model.documents().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![9, 3, 5]);
    }
}
