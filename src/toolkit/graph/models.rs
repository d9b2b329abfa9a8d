use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::utils::placeholder_label;


pub type EntityId = i64;

pub const MODALITY_TEXT: &str = "text";
pub const MODALITY_BEHAVIOR: &str = "behavior";


#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    User,
    Article,
    Tag,
    Person,
    Organization,
    Location,
    Event,
    MediaObject,
    Other,
}


#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    /// user - tag
    Interest,
    /// article - tag
    AnnotatedWith,
    /// article - media object
    GeneratedFrom,
    RelatedTo,
    CoOccurs,
    SimilarTo,
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntity {
    pub id: EntityId,
    pub entity_type: EntityType,
    pub external_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub modality: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KnowledgeEntity {
    /// Entity name when non-blank, otherwise `type-id`.
    pub fn label(&self) -> String {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => {
                let kind: &'static str = self.entity_type.into();
                placeholder_label(kind, self.id)
            }
        }
    }
}


/// Insert payload; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntity {
    pub entity_type: EntityType,
    pub external_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub modality: Option<String>,
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeRelation {
    pub id: EntityId,
    pub source_id: EntityId,
    pub target_id: EntityId,
    pub relation_type: RelationType,
    pub modality: Option<String>,
    pub weight: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KnowledgeRelation {
    pub fn touches(&self, entity_id: EntityId) -> bool {
        self.source_id == entity_id || self.target_id == entity_id
    }
}


/// Unique key of a stored relation. Undirected edges are always stored with
/// `source_id <= target_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationKey {
    pub source_id: EntityId,
    pub target_id: EntityId,
    pub relation_type: RelationType,
    pub modality: Option<String>,
}

impl RelationKey {
    pub fn undirected(
        first: EntityId,
        second: EntityId,
        relation_type: RelationType,
        modality: Option<&str>,
    ) -> Self {
        let (source_id, target_id) = if first <= second {
            (first, second)
        } else {
            (second, first)
        };
        Self {
            source_id,
            target_id,
            relation_type,
            modality: modality.map(str::to_string),
        }
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: EntityId,
    pub label: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub modality: Option<String>,
}

impl From<&KnowledgeEntity> for GraphNode {
    fn from(entity: &KnowledgeEntity) -> Self {
        Self {
            id: entity.id,
            label: entity.label(),
            entity_type: entity.entity_type,
            modality: entity.modality.clone(),
        }
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: EntityId,
    pub target: EntityId,
    pub relation_type: RelationType,
    pub modality: Option<String>,
    pub weight: f64,
}

impl From<&KnowledgeRelation> for GraphEdge {
    fn from(relation: &KnowledgeRelation) -> Self {
        Self {
            source: relation.source_id,
            target: relation.target_id,
            relation_type: relation.relation_type,
            modality: relation.modality.clone(),
            weight: relation.weight,
        }
    }
}


#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphSummary {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub focus_type: Option<EntityType>,
}

impl GraphSummary {
    pub fn empty(focus_type: Option<EntityType>) -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            focus_type,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}


/// Write counters for one synchronization call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub entities_created: usize,
    pub entities_updated: usize,
    pub relations_created: usize,
    pub relations_updated: usize,
    pub relations_unchanged: usize,
}

impl SyncStats {
    pub fn writes(&self) -> usize {
        self.entities_created + self.entities_updated + self.relations_created + self.relations_updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn entity(id: EntityId, name: Option<&str>) -> KnowledgeEntity {
        KnowledgeEntity {
            id,
            entity_type: EntityType::MediaObject,
            external_id: None,
            name: name.map(str::to_string),
            description: None,
            modality: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_relation_key_is_canonical() {
        let forward = RelationKey::undirected(3, 9, RelationType::Interest, Some(MODALITY_BEHAVIOR));
        let backward = RelationKey::undirected(9, 3, RelationType::Interest, Some(MODALITY_BEHAVIOR));
        assert_eq!(forward, backward);
        assert_eq!((forward.source_id, forward.target_id), (3, 9));
    }

    #[test]
    fn test_label_falls_back_to_placeholder() {
        assert_eq!(entity(4, Some("Rust")).label(), "Rust");
        assert_eq!(entity(4, Some("   ")).label(), "media_object-4");
        assert_eq!(entity(5, None).label(), "media_object-5");
    }

    #[test]
    fn test_entity_type_round_trips_through_strings() {
        assert_eq!(EntityType::from_str("media_object").unwrap(), EntityType::MediaObject);
        assert_eq!(EntityType::from_str("TAG").unwrap(), EntityType::Tag);
        assert_eq!(RelationType::AnnotatedWith.to_string(), "ANNOTATED_WITH");
        assert!(EntityType::from_str("planet").is_err());
    }
}
