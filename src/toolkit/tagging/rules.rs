use std::collections::HashMap;
use std::path::Path;

use config::{Config, File, FileFormat};
use serde::Deserialize;
use tracing::{info, warn};

use crate::core::{NewsrecError, Result};
use crate::models::TagId;

const DEFAULT_RULE_WEIGHT: f64 = 0.5;


/// Keyword rule as written in the rules file.
#[derive(Debug, Clone, Deserialize)]
struct RawRule {
    #[serde(default)]
    keyword: Option<String>,
    #[serde(default, alias = "tagId", alias = "tagid")]
    tag_id: Option<TagId>,
    #[serde(default)]
    weight: Option<f64>,
}


#[derive(Debug, Default, Deserialize)]
struct RuleFile {
    #[serde(default)]
    rules: Vec<RawRule>,
}


#[derive(Debug, Clone, PartialEq)]
pub struct TagRule {
    /// Always lowercase.
    pub keyword: String,
    pub tag_id: TagId,
    pub weight: f64,
}

impl TagRule {
    pub fn new(keyword: &str, tag_id: TagId, weight: f64) -> Self {
        Self {
            keyword: keyword.to_lowercase(),
            tag_id,
            weight,
        }
    }
}


/// Substring keyword tagger used when the title classifier has nothing to
/// say. Loaded once and immutable afterwards.
#[derive(Debug, Clone, Default)]
pub struct KeywordTagger {
    rules: Vec<TagRule>,
}

impl KeywordTagger {
    pub fn new(rules: Vec<TagRule>) -> Self {
        Self { rules }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Reads `rules: [{keyword, tag_id, weight}]` from a YAML, TOML or JSON
    /// file. Rules without a keyword or tag id are skipped.
    pub fn load(path: &Path) -> Result<Self> {
        let parsed = Config::builder()
            .add_source(File::from(path))
            .build()
            .map_err(|e| NewsrecError::Rules(format!("{}: {}", path.display(), e)))?;
        let tagger = Self::from_config(parsed)?;
        info!("Loaded {} tagging rules from {}", tagger.len(), path.display());
        Ok(tagger)
    }

    /// Like [`load`](Self::load) but degrades to an empty rule set.
    pub fn load_or_empty(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::empty();
        };
        match Self::load(path) {
            Ok(tagger) => tagger,
            Err(e) => {
                warn!("Failed to load tagging rules, keyword fallback disabled: {}", e);
                Self::empty()
            }
        }
    }

    pub fn parse(text: &str, format: FileFormat) -> Result<Self> {
        let parsed = Config::builder()
            .add_source(File::from_str(text, format))
            .build()
            .map_err(|e| NewsrecError::Rules(e.to_string()))?;
        Self::from_config(parsed)
    }

    fn from_config(parsed: Config) -> Result<Self> {
        let file: RuleFile = parsed
            .try_deserialize()
            .map_err(|e| NewsrecError::Rules(e.to_string()))?;

        let rules = file
            .rules
            .into_iter()
            .filter_map(|raw| {
                let keyword = raw.keyword.filter(|k| !k.trim().is_empty())?;
                let tag_id = raw.tag_id?;
                Some(TagRule::new(&keyword, tag_id, raw.weight.unwrap_or(DEFAULT_RULE_WEIGHT)))
            })
            .collect();
        Ok(Self { rules })
    }

    /// Highest rule weight per tag over every keyword found in `content`.
    pub fn match_tags(&self, content: &str) -> HashMap<TagId, f64> {
        let mut matches: HashMap<TagId, f64> = HashMap::new();
        if self.rules.is_empty() || content.trim().is_empty() {
            return matches;
        }

        let lower = content.to_lowercase();
        for rule in self.rules.iter().filter(|rule| lower.contains(&rule.keyword)) {
            let entry = matches.entry(rule.tag_id).or_insert(rule.weight);
            *entry = entry.max(rule.weight);
        }
        matches
    }

    pub fn rules(&self) -> &[TagRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES_YAML: &str = r#"
rules:
  - keyword: HarmonyOS
    tag_id: 1
    weight: 0.9
  - keyword: 华为
    tag_id: 1
  - keyword: 旅行
    tag_id: 3
    weight: 0.7
  - keyword: ""
    tag_id: 4
  - keyword: orphan
"#;

    #[test]
    fn test_parse_skips_incomplete_rules() {
        let tagger = KeywordTagger::parse(RULES_YAML, FileFormat::Yaml).unwrap();
        assert_eq!(tagger.len(), 3);
        assert_eq!(tagger.rules()[0].keyword, "harmonyos");
        assert_eq!(tagger.rules()[1].weight, DEFAULT_RULE_WEIGHT);
    }

    #[test]
    fn test_match_keeps_max_weight_per_tag() {
        let tagger = KeywordTagger::parse(RULES_YAML, FileFormat::Yaml).unwrap();
        let matches = tagger.match_tags("华为发布 harmonyos 6，顺便聊聊旅行");
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[&1], 0.9);
        assert_eq!(matches[&3], 0.7);
    }

    #[test]
    fn test_no_match_and_blank_content() {
        let tagger = KeywordTagger::new(vec![TagRule::new("Rust", 9, 0.4)]);
        assert!(tagger.match_tags("python only").is_empty());
        assert!(tagger.match_tags("   ").is_empty());
        assert_eq!(tagger.match_tags("Learning RUST")[&9], 0.4);
    }

    #[test]
    fn test_json_rules() {
        let tagger = KeywordTagger::parse(
            r#"{"rules": [{"keyword": "AI", "tag_id": 2, "weight": 0.8}]}"#,
            FileFormat::Json,
        )
        .unwrap();
        assert_eq!(tagger.rules(), &[TagRule::new("ai", 2, 0.8)]);
    }

    #[test]
    fn test_missing_file_degrades_to_empty() {
        let tagger = KeywordTagger::load_or_empty(Some(Path::new("/nonexistent/tags.yml")));
        assert!(tagger.is_empty());
        assert!(KeywordTagger::load_or_empty(None).is_empty());
    }
}
