use serde::{Deserialize, Serialize};

/// Identifier of a node within one estimate tree.
///
/// Ids are allocated sequentially at insert time and are only meaningful
/// within their tree; parent/child relationships are expressed through
/// them rather than through nested structures, so a tree round-trips
/// through tabular storage unchanged.
pub type NodeId = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Section,
    Task,
    Resource,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Section => "section",
            Self::Task => "task",
            Self::Resource => "resource",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "section" => Some(Self::Section),
            "task" => Some(Self::Task),
            "resource" => Some(Self::Resource),
            _ => None,
        }
    }
}

/// One row of an estimate tree.
///
/// Sections carry only a label; tasks add unit, quantity, cost, and the
/// formula text they were computed from; resource detail nodes add the
/// resource's unit, quantity, and cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateNode {
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
    pub kind: NodeKind,
    pub label: String,
    pub unit: Option<String>,
    pub quantity: Option<f64>,
    pub cost: Option<f64>,
    /// Formula text the quantity was computed from, kept for traceability.
    pub formula: Option<String>,
    /// Ordering among siblings.
    pub position: i64,
}

/// The computed estimate for one project: a flat arena of nodes.
///
/// Exclusively owned by the project it was computed for; a new run fully
/// replaces the previous tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EstimationTree {
    pub nodes: Vec<EstimateNode>,
}

impl EstimationTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&EstimateNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Top-level section nodes, in insertion order.
    pub fn sections(&self) -> Vec<&EstimateNode> {
        let mut roots: Vec<&EstimateNode> = self
            .nodes
            .iter()
            .filter(|n| n.parent_id.is_none())
            .collect();
        roots.sort_by_key(|n| n.position);
        roots
    }

    /// Direct children of a node, ordered by position.
    pub fn children(&self, parent: NodeId) -> Vec<&EstimateNode> {
        let mut children: Vec<&EstimateNode> = self
            .nodes
            .iter()
            .filter(|n| n.parent_id == Some(parent))
            .collect();
        children.sort_by_key(|n| n.position);
        children
    }

    pub fn tasks(&self) -> impl Iterator<Item = &EstimateNode> {
        self.nodes.iter().filter(|n| n.kind == NodeKind::Task)
    }

    /// Sum of all task costs, rounded to cents.
    pub fn total_cost(&self) -> f64 {
        let sum: f64 = self.tasks().filter_map(|n| n.cost).sum();
        (sum * 100.0).round() / 100.0
    }
}
