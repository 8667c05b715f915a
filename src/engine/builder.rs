//! Arena-style assembly of the estimate hierarchy.
//!
//! Nodes live in a flat list with ids handed out at insert time and
//! parent links by id, so the finished tree persists as plain rows and
//! reconstructs without recursive pointer structures.

use std::collections::HashMap;

use crate::models::{EstimateNode, EstimationTree, NodeId, NodeKind, ResourceUsage};

#[derive(Default)]
pub struct TreeBuilder {
    nodes: Vec<EstimateNode>,
    /// Section label → node id; templates sharing a label share a section.
    sections: HashMap<String, NodeId>,
    /// Next sibling position per parent.
    positions: HashMap<Option<NodeId>, i64>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the section node for a label.
    pub fn section(&mut self, label: &str) -> NodeId {
        if let Some(&id) = self.sections.get(label) {
            return id;
        }
        let id = self.insert(None, NodeKind::Section, label, None, None, None, None);
        self.sections.insert(label.to_string(), id);
        id
    }

    /// Add a task under a section.
    ///
    /// Tasks with a quantity of zero or less add no value to an estimate
    /// and are pruned here, not recorded as errors.
    #[allow(clippy::too_many_arguments)]
    pub fn add_task(
        &mut self,
        section: NodeId,
        name: &str,
        unit: &str,
        quantity: f64,
        cost: f64,
        formula: &str,
    ) -> Option<NodeId> {
        if quantity <= 0.0 {
            return None;
        }
        debug_assert!(self.kind_of(section) == Some(NodeKind::Section));
        Some(self.insert(
            Some(section),
            NodeKind::Task,
            name,
            Some(unit.to_string()),
            Some(quantity),
            Some(cost),
            Some(formula.to_string()),
        ))
    }

    /// Attach a resource detail node under a task.
    pub fn add_resource(&mut self, task: NodeId, usage: &ResourceUsage) -> NodeId {
        debug_assert!(self.kind_of(task) == Some(NodeKind::Task));
        self.insert(
            Some(task),
            NodeKind::Resource,
            &usage.resource.name,
            Some(usage.resource.unit.clone()),
            Some(usage.quantity),
            Some(usage.cost),
            None,
        )
    }

    pub fn finish(self) -> EstimationTree {
        EstimationTree { nodes: self.nodes }
    }

    fn kind_of(&self, id: NodeId) -> Option<NodeKind> {
        self.nodes.iter().find(|n| n.id == id).map(|n| n.kind)
    }

    #[allow(clippy::too_many_arguments)]
    fn insert(
        &mut self,
        parent_id: Option<NodeId>,
        kind: NodeKind,
        label: &str,
        unit: Option<String>,
        quantity: Option<f64>,
        cost: Option<f64>,
        formula: Option<String>,
    ) -> NodeId {
        let id = self.nodes.len() as NodeId + 1;
        let position = self.positions.entry(parent_id).or_insert(0);
        let node = EstimateNode {
            id,
            parent_id,
            kind,
            label: label.to_string(),
            unit,
            quantity,
            cost,
            formula,
            position: *position,
        };
        *position += 1;
        self.nodes.push(node);
        id
    }
}
