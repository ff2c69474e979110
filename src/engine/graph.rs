use std::collections::{HashMap, HashSet};

use crate::flow::{Flow, FlowEdge, FlowNode};

/// Runtime view of a flow: node lookup plus outgoing adjacency in edge
/// declaration order.
pub struct Graph {
    pub nodes: HashMap<String, FlowNode>,
    outgoing: HashMap<String, Vec<FlowEdge>>,
}

impl Graph {
    pub fn from_flow(flow: &Flow) -> Self {
        let mut nodes = HashMap::new();
        for node in &flow.nodes {
            // Duplicate ids: last declaration wins.
            nodes.insert(node.id.clone(), node.clone());
        }

        let mut outgoing: HashMap<String, Vec<FlowEdge>> = HashMap::new();
        for edge in &flow.edges {
            outgoing
                .entry(edge.source.clone())
                .or_default()
                .push(edge.clone());
        }

        Graph { nodes, outgoing }
    }

    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.get(id)
    }

    pub fn outgoing(&self, id: &str) -> &[FlowEdge] {
        self.outgoing.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The walk's entry points: trigger nodes in declaration order, falling
    /// back to nodes with no incoming edge when the flow has no trigger.
    pub fn start_nodes(&self, flow: &Flow) -> Vec<String> {
        let triggers: Vec<String> = flow
            .nodes
            .iter()
            .filter(|n| n.kind == "trigger")
            .map(|n| n.id.clone())
            .collect();
        if !triggers.is_empty() {
            return triggers;
        }

        let targets: HashSet<&str> = flow.edges.iter().map(|e| e.target.as_str()).collect();
        flow.nodes
            .iter()
            .filter(|n| !targets.contains(n.id.as_str()))
            .map(|n| n.id.clone())
            .collect()
    }
}
