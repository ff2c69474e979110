use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

mod crud;
mod prelude;
mod runs;
mod sse;
mod webhooks;

pub use crud::{
    create_automation, delete_automation, get_automation, get_automation_flow, list_automations,
    update_automation_flow,
};
pub use runs::{get_run, list_runs, poll_run_events, start_run};
pub use sse::stream_run_events;
pub use webhooks::{get_webhook_url, webhook_trigger};

#[cfg(test)]
pub(crate) mod test_support {
    use std::time::{SystemTime, UNIX_EPOCH};

    use serde_json::Value;
    use time::OffsetDateTime;
    use uuid::Uuid;

    use crate::models::automation::Automation;
    use crate::models::run::Run;
    use crate::utils::jwt::Claims;

    pub(crate) fn claims() -> Claims {
        Claims {
            sub: "user-123".into(),
            workspace_id: Uuid::new_v4(),
            email: "test@example.com".into(),
            exp: (SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_secs()
                + 3600) as usize,
            iss: String::new(),
            aud: String::new(),
        }
    }

    pub(crate) fn stored_automation(workspace_id: Uuid, name: &str, flow: Value) -> Automation {
        let now = OffsetDateTime::now_utc();
        Automation {
            id: Uuid::new_v4(),
            workspace_id,
            name: name.to_string(),
            flow,
            webhook_salt: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn stored_run(automation_id: Uuid, workspace_id: Uuid, status: &str) -> Run {
        let now = OffsetDateTime::now_utc();
        Run {
            id: Uuid::new_v4(),
            automation_id,
            workspace_id,
            status: status.to_string(),
            log: String::new(),
            started_at: now,
            finished_at: if status == "RUNNING" { None } else { Some(now) },
            created_at: now,
            updated_at: now,
        }
    }
}

/// Workspace-scoped surface; every handler authenticates via `AuthSession`.
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/automations", post(create_automation).get(list_automations))
        .route(
            "/automations/{id}",
            get(get_automation).delete(delete_automation),
        )
        .route(
            "/automations/{id}/flow",
            get(get_automation_flow)
                .put(update_automation_flow)
                .post(update_automation_flow),
        )
        .route("/automations/{id}/run", post(start_run))
        .route("/automations/{id}/runs", get(list_runs))
        .route("/automations/{id}/runs/{run_id}", get(get_run))
        .route("/automations/{id}/runs/{run_id}/events", get(poll_run_events))
        .route("/automations/{id}/runs/{run_id}/stream", get(stream_run_events))
        .route("/automations/{id}/webhook-url", get(get_webhook_url))
}

/// Token-authenticated trigger endpoint; no session required.
pub fn public_routes() -> Router<AppState> {
    Router::new().route("/hooks/{automation_id}/{token}", post(webhook_trigger))
}
