
pub mod similarity;
pub mod tfidf;
pub mod tokenizer;

pub use similarity::{cosine, cosine_dense, cosine_sparse, normalize_by_max, TagVector};
pub use tfidf::{DocId, SparseVector, TfidfModel, TfidfVectorizer};
pub use tokenizer::tokenize;
