use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// The node/edge document produced by the flow editor. Loading is tolerant:
/// clients send whatever their canvas holds, so anything that is not an
/// array of objects coerces to empty rather than failing the request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Flow {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlowNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Layout-only keys (`position`, UI state) kept intact across round-trips.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FlowNode {
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.data.as_ref()?.get(key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(
        default,
        rename = "sourceHandle",
        skip_serializing_if = "Option::is_none"
    )]
    pub source_handle: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Flow {
    pub fn empty() -> Self {
        Flow::default()
    }

    /// Reads a stored or client-provided flow document. Missing or non-array
    /// `nodes`/`edges` members become empty lists; elements that do not
    /// deserialize (non-objects, missing ids) are skipped. Never fails.
    pub fn load(raw: &Value) -> Self {
        Flow {
            nodes: load_list(raw.get("nodes")),
            edges: load_list(raw.get("edges")),
        }
    }

    /// The persisted JSON representation.
    pub fn save(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({ "nodes": [], "edges": [] }))
    }
}

fn load_list<T: serde::de::DeserializeOwned>(member: Option<&Value>) -> Vec<T> {
    member
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}
