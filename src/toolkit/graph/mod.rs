
pub mod models;
pub mod summary;
pub mod sync;

pub use models::{
    EntityId, EntityType, GraphEdge, GraphNode, GraphSummary, KnowledgeEntity, KnowledgeRelation,
    NewEntity, RelationKey, RelationType, SyncStats, MODALITY_BEHAVIOR, MODALITY_TEXT,
};
pub use summary::summarize;
pub use sync::KnowledgeGraphSync;
