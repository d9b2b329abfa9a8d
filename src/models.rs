use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};


pub type ArticleId = i64;
pub type TagId = i64;
pub type UserId = i64;


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub publish_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Article {
    pub fn new(id: ArticleId, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            content: content.into(),
            source: None,
            publish_time: None,
            created_at: None,
        }
    }

    #[must_use]
    pub fn with_publish_time(mut self, publish_time: DateTime<Utc>) -> Self {
        self.publish_time = Some(publish_time);
        self
    }

    #[must_use]
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Publish time, falling back to creation time.
    pub fn effective_time(&self) -> Option<DateTime<Utc>> {
        self.publish_time.or(self.created_at)
    }
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
}

impl Tag {
    pub fn new(id: TagId, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleTag {
    pub article_id: ArticleId,
    pub tag_id: TagId,
    pub weight: f64,
}

impl ArticleTag {
    /// Annotation weights are confidences and always live in [0, 1].
    pub fn new(article_id: ArticleId, tag_id: TagId, weight: f64) -> Self {
        Self {
            article_id,
            tag_id,
            weight: weight.clamp(0.0, 1.0),
        }
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTagWeight {
    pub user_id: UserId,
    pub tag_id: TagId,
    pub weight: f64,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl UserTagWeight {
    pub fn new(user_id: UserId, tag_id: TagId, weight: f64) -> Self {
        Self {
            user_id,
            tag_id,
            weight,
            updated_at: Utc::now(),
        }
    }
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub nickname: Option<String>,
}


#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    View,
    Click,
    Like,
    Upload,
}

impl EventType {
    /// Events that count as reading the article.
    pub fn is_engagement(self) -> bool {
        matches!(self, Self::View | Self::Click)
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEvent {
    pub user_id: UserId,
    pub article_id: ArticleId,
    pub event_type: EventType,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl UserEvent {
    pub fn new(user_id: UserId, article_id: ArticleId, event_type: EventType) -> Self {
        Self {
            user_id,
            article_id,
            event_type,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_article_tag_weight_is_clamped() {
        assert_eq!(ArticleTag::new(1, 2, 1.7).weight, 1.0);
        assert_eq!(ArticleTag::new(1, 2, -0.3).weight, 0.0);
        assert_eq!(ArticleTag::new(1, 2, 0.4).weight, 0.4);
    }

    #[test]
    fn test_effective_time_fallback() {
        let created = Utc::now();
        let article = Article::new(1, "t", "c").with_created_at(created);
        assert_eq!(article.effective_time(), Some(created));
        assert_eq!(Article::new(2, "t", "c").effective_time(), None);
    }

    #[test]
    fn test_event_type_parsing() {
        assert_eq!(EventType::from_str("VIEW").unwrap(), EventType::View);
        assert_eq!(EventType::from_str("click").unwrap(), EventType::Click);
        assert_eq!(EventType::Upload.to_string(), "UPLOAD");
        assert!(EventType::View.is_engagement());
        assert!(!EventType::Like.is_engagement());
    }
}
