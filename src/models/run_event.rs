use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// One node outcome inside a run. Append-only; never updated after insert.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunEvent {
    pub id: Uuid,
    pub run_id: Uuid,
    pub node_id: String,
    pub node_type: String,
    pub status: String,
    pub message: String,
    pub path: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewRunEvent {
    pub run_id: Uuid,
    pub node_id: String,
    pub node_type: String,
    pub status: String,
    pub message: String,
    pub path: Option<String>,
}
