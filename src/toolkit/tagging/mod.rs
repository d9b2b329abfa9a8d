pub mod auto_tag;
pub mod rules;

pub use auto_tag::{ArticleAutoTagger, AutoTagOutcome, TagOrigin};
pub use rules::{KeywordTagger, TagRule};
