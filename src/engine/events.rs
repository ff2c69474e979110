use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where in a node's lifetime the event was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    NodeStart,
    NodeEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Running,
    Success,
    Failure,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Running => "running",
            NodeStatus::Success => "success",
            NodeStatus::Failure => "failure",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeEvent {
    pub kind: EventKind,
    pub run_id: Uuid,
    pub node_id: String,
    pub node_type: String,
    pub status: NodeStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl NodeEvent {
    /// One line of the accumulated run log.
    pub fn log_line(&self) -> String {
        format!("[{}] {} {}", self.node_id, self.status.as_str(), self.message)
    }
}

/// The engine's only side channel. An `Err` here means the event could not
/// be recorded anywhere and aborts the walk.
#[async_trait]
pub trait RunObserver: Send + Sync {
    async fn node_event(&self, event: NodeEvent) -> Result<(), sqlx::Error>;
}
