//! Workflow template model.
//!
//! A template is a versioned, soft-deletable ordered list of nodes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One step of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateNode {
    pub id: String,
}

impl TemplateNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Stored workflow template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: i64,

    pub name: String,

    /// Starts at 1, incremented by every update
    pub version: i32,

    /// Nodes in execution order
    pub nodes: Vec<TemplateNode>,

    /// Soft delete flag
    pub is_deleted: bool,

    pub created_at: DateTime<Utc>,
}

impl Template {
    pub fn first_node(&self) -> Option<&TemplateNode> {
        self.nodes.first()
    }

    /// Index of the node with this id.
    pub fn position_of(&self, node_id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == node_id)
    }

    /// Node following `node_id`, or `None` when `node_id` is last or unknown.
    pub fn node_after(&self, node_id: &str) -> Option<&TemplateNode> {
        self.position_of(node_id)
            .and_then(|index| self.nodes.get(index + 1))
    }
}

/// Body of template create and update requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRequest {
    pub name: String,

    #[serde(default)]
    pub nodes: Vec<TemplateNode>,
}

impl TemplateRequest {
    pub fn new<I, S>(name: impl Into<String>, node_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            nodes: node_ids.into_iter().map(TemplateNode::new).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(ids: &[&str]) -> Template {
        Template {
            id: 1,
            name: "t".to_string(),
            version: 1,
            nodes: ids.iter().map(|id| TemplateNode::new(*id)).collect(),
            is_deleted: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_node_after_walks_in_order() {
        let t = template(&["A", "B", "End"]);
        assert_eq!(t.first_node().map(|n| n.id.as_str()), Some("A"));
        assert_eq!(t.node_after("A").map(|n| n.id.as_str()), Some("B"));
        assert_eq!(t.node_after("B").map(|n| n.id.as_str()), Some("End"));
        assert!(t.node_after("End").is_none());
    }

    #[test]
    fn test_node_after_unknown_node() {
        let t = template(&["A", "B"]);
        assert!(t.position_of("Z").is_none());
        assert!(t.node_after("Z").is_none());
    }

    #[test]
    fn test_request_deserializes_without_nodes() {
        let request: TemplateRequest = serde_json::from_str(r#"{"name": "empty"}"#).unwrap();
        assert!(request.nodes.is_empty());
    }
}
