use std::collections::HashSet;

use tracing::debug;

use super::models::{EntityId, EntityType, GraphEdge, GraphNode, GraphSummary, KnowledgeEntity, KnowledgeRelation};
use super::sync::KnowledgeGraphSync;
use crate::core::Result;


impl KnowledgeGraphSync {
    /// Full graph, or the one-hop ego network around every entity of
    /// `focus_type`.
    pub async fn load_graph_summary(&self, focus_type: Option<EntityType>) -> Result<GraphSummary> {
        let entities = self.store().find_all_entities().await?;
        if entities.is_empty() {
            return Ok(GraphSummary::empty(focus_type));
        }
        let relations = self.store().find_all_relations().await?;

        let summary = summarize(&entities, &relations, focus_type);
        debug!(
            "Graph summary focus={:?}: {} nodes, {} edges",
            focus_type,
            summary.nodes.len(),
            summary.edges.len()
        );
        Ok(summary)
    }
}


pub fn summarize(
    entities: &[KnowledgeEntity],
    relations: &[KnowledgeRelation],
    focus_type: Option<EntityType>,
) -> GraphSummary {
    if entities.is_empty() {
        return GraphSummary::empty(focus_type);
    }

    let focus_ids: HashSet<EntityId> = match focus_type {
        Some(kind) => entities
            .iter()
            .filter(|entity| entity.entity_type == kind)
            .map(|entity| entity.id)
            .collect(),
        None => HashSet::new(),
    };
    if focus_type.is_some() && focus_ids.is_empty() {
        return GraphSummary::empty(focus_type);
    }

    let allowed: HashSet<EntityId> = if focus_type.is_none() {
        entities.iter().map(|entity| entity.id).collect()
    } else {
        let mut closure = focus_ids.clone();
        for relation in relations {
            if focus_ids.contains(&relation.source_id) || focus_ids.contains(&relation.target_id) {
                closure.insert(relation.source_id);
                closure.insert(relation.target_id);
            }
        }
        closure
    };

    let nodes = entities
        .iter()
        .filter(|entity| allowed.contains(&entity.id))
        .map(GraphNode::from)
        .collect();

    let edges = relations
        .iter()
        .filter(|relation| allowed.contains(&relation.source_id) && allowed.contains(&relation.target_id))
        .filter(|relation| {
            focus_type.is_none()
                || focus_ids.contains(&relation.source_id)
                || focus_ids.contains(&relation.target_id)
        })
        .map(GraphEdge::from)
        .collect();

    GraphSummary {
        nodes,
        edges,
        focus_type,
    }
}
