use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::automation_repository::AutomationRepository;
use crate::flow::Flow;
use crate::models::run::{Run, RunStatus};
use crate::models::run_event::NewRunEvent;
use crate::state::AppState;
use crate::stream::{RunStreamEvent, RunStreamPublisher};

use super::events::{EventKind, NodeEvent, RunObserver};
use super::executor::{execute_flow, ExecutionContext};

pub(crate) const PERSISTENCE_MAX_ATTEMPTS: usize = 3;
#[cfg(test)]
const PERSISTENCE_INITIAL_BACKOFF: Duration = Duration::from_millis(5);
#[cfg(not(test))]
const PERSISTENCE_INITIAL_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error(
        "executor persistence operation `{operation}` failed for run {run_id} after {attempts} attempts: {source}"
    )]
    Persistence {
        run_id: Uuid,
        operation: &'static str,
        attempts: usize,
        #[source]
        source: sqlx::Error,
    },
}

impl ExecutorError {
    pub fn run_id(&self) -> Uuid {
        match self {
            ExecutorError::Persistence { run_id, .. } => *run_id,
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            ExecutorError::Persistence { operation, .. } => operation,
        }
    }

    pub fn attempts(&self) -> usize {
        match self {
            ExecutorError::Persistence { attempts, .. } => *attempts,
        }
    }

    fn into_source(self) -> sqlx::Error {
        match self {
            ExecutorError::Persistence { source, .. } => source,
        }
    }
}

/// Persists `nodeEnd` events through the repository, then forwards every
/// event to the run's live stream. Persist-before-forward: a subscriber
/// never sees an event the poll endpoint cannot return.
pub struct EventBridge {
    repo: Arc<dyn AutomationRepository>,
    publisher: RunStreamPublisher,
}

impl EventBridge {
    pub fn new(repo: Arc<dyn AutomationRepository>, publisher: RunStreamPublisher) -> Self {
        EventBridge { repo, publisher }
    }

    pub fn publish(&self, event: RunStreamEvent) {
        self.publisher.publish(event);
    }
}

#[async_trait]
impl RunObserver for EventBridge {
    async fn node_event(&self, event: NodeEvent) -> Result<(), sqlx::Error> {
        if event.kind == EventKind::NodeEnd {
            let repo = self.repo.clone();
            let new_event = NewRunEvent {
                run_id: event.run_id,
                node_id: event.node_id.clone(),
                node_type: event.node_type.clone(),
                status: event.status.as_str().to_string(),
                message: event.message.clone(),
                path: event.path.clone(),
            };
            retry_with_backoff(event.run_id, "record_run_event", || {
                let repo = repo.clone();
                let new_event = new_event.clone();
                async move { repo.record_run_event(new_event).await }
            })
            .await
            .map_err(ExecutorError::into_source)?;
        }

        self.publisher.publish(RunStreamEvent::Node(event));
        Ok(())
    }
}

/// Drives one run end to end: walk the flow, finalize the row exactly once,
/// publish the terminal stream event. The stream closes on every exit path
/// because the bridge owns the publisher.
pub async fn execute_run(
    state: AppState,
    run: Run,
    flow: Flow,
    trigger: Value,
) -> Result<(), ExecutorError> {
    let run_id = run.id;
    info!(%run_id, automation_id = %run.automation_id, "executing automation run");

    let publisher = state.run_streams.open(run_id);
    let bridge = EventBridge::new(state.automation_repo.clone(), publisher);
    let ctx = ExecutionContext {
        run_id,
        http_client: (*state.http_client).clone(),
        ai: state.ai.clone(),
        trigger,
    };

    match execute_flow(&flow, &ctx, &bridge).await {
        Ok(report) => {
            let status = if report.success {
                RunStatus::Success
            } else {
                RunStatus::Failed
            };
            complete_run_with_retry(&state, run_id, status, &report.log).await?;
            info!(%run_id, status = status.as_str(), "automation run finished");
            bridge.publish(RunStreamEvent::Completed {
                status,
                success: report.success,
                log: report.log,
            });
            Ok(())
        }
        Err(source) => {
            let err = ExecutorError::Persistence {
                run_id,
                operation: "record_run_event",
                attempts: PERSISTENCE_MAX_ATTEMPTS,
                source,
            };
            error!(%run_id, ?err, "run aborted: node events could not be persisted");
            if let Err(complete_err) = complete_run_with_retry(
                &state,
                run_id,
                RunStatus::Failed,
                "run aborted: event persistence failed",
            )
            .await
            {
                warn!(%run_id, ?complete_err, "failed to finalize aborted run");
            }
            bridge.publish(RunStreamEvent::Failed {
                message: "event persistence failed".to_string(),
            });
            Err(err)
        }
    }
}

async fn complete_run_with_retry(
    state: &AppState,
    run_id: Uuid,
    status: RunStatus,
    log: &str,
) -> Result<(), ExecutorError> {
    let repo = state.automation_repo.clone();
    let updated = retry_with_backoff(run_id, "complete_run", || {
        let repo = repo.clone();
        let log = log.to_string();
        async move { repo.complete_run(run_id, status, &log).await }
    })
    .await?;

    if !updated {
        // Row was already finalized; completion is first-writer-wins.
        info!(%run_id, "run was already finalized");
    }
    Ok(())
}

async fn retry_with_backoff<T, Fut, F>(
    run_id: Uuid,
    operation: &'static str,
    mut op: F,
) -> Result<T, ExecutorError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, sqlx::Error>>,
{
    let mut attempt = 0usize;
    let mut backoff = PERSISTENCE_INITIAL_BACKOFF;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < PERSISTENCE_MAX_ATTEMPTS => {
                warn!(
                    %run_id,
                    operation,
                    attempt,
                    ?err,
                    "executor persistence operation failed; retrying"
                );
                sleep(backoff).await;
                backoff = backoff.saturating_mul(2);
            }
            Err(err) => {
                error!(
                    %run_id,
                    operation,
                    attempt,
                    ?err,
                    "executor persistence operation exhausted retries"
                );
                return Err(ExecutorError::Persistence {
                    run_id,
                    operation,
                    attempts: attempt,
                    source: err,
                });
            }
        }
    }
}
