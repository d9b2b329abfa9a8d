
pub mod classifier;
pub mod graph;
pub mod interest;
pub mod recommend;
pub mod tagging;


pub use classifier::{TagPrediction, TitleClassifier};
pub use graph::{GraphSummary, KnowledgeGraphSync, SyncStats};
pub use interest::UserInterestService;
pub use recommend::{RecommendedArticle, Recommender};
pub use tagging::{ArticleAutoTagger, KeywordTagger};
