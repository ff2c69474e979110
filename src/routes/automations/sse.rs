use tokio::sync::broadcast::error::RecvError;

use super::prelude::*;
use crate::models::run::Run;
use crate::stream::RunStreamEvent;

/// Live run feed. Emits `runStart` with the run snapshot, relays `node`
/// events from the run's channel, and closes after the terminal `runEnd`
/// (or `error`). Late subscribers to a finished run get `runStart` +
/// `runEnd` from the stored record instead of hanging.
pub async fn stream_run_events(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path((automation_id, run_id)): Path<(Uuid, Uuid)>,
) -> Response {
    let run = match app_state
        .automation_repo
        .find_run(claims.workspace_id, automation_id, run_id)
        .await
    {
        Ok(Some(run)) => run,
        Ok(None) => return JsonResponse::not_found("Run not found").into_response(),
        Err(err) => {
            error!(%run_id, ?err, "failed to fetch run for streaming");
            return JsonResponse::server_error("Failed to open run stream").into_response();
        }
    };

    // Subscribe before inspecting status so no terminal event can slip
    // between the check and the subscription.
    let receiver = app_state.run_streams.subscribe(run_id);
    let state = app_state.clone();
    let workspace_id = claims.workspace_id;

    let s = stream! {
        yield Ok::<Event, Infallible>(
            Event::default().event("runStart").json_data(&run).unwrap(),
        );

        if run.is_terminal() {
            yield Ok(run_end_event(&run));
            return;
        }

        let mut receiver = match receiver {
            Some(receiver) => receiver,
            None => {
                // Channel already gone: the run finished (or the publisher
                // died) between the fetch and the subscribe.
                if let Ok(Some(run)) = state
                    .automation_repo
                    .find_run(workspace_id, automation_id, run_id)
                    .await
                {
                    if run.is_terminal() {
                        yield Ok(run_end_event(&run));
                        return;
                    }
                }
                yield Ok(Event::default().event("error").data("stream unavailable"));
                return;
            }
        };

        loop {
            match receiver.recv().await {
                Ok(RunStreamEvent::Node(event)) => {
                    yield Ok(Event::default().event("node").json_data(&event).unwrap());
                }
                Ok(RunStreamEvent::Completed { status, success, log }) => {
                    yield Ok(Event::default()
                        .event("runEnd")
                        .json_data(&json!({
                            "status": status,
                            "success": success,
                            "log": log,
                        }))
                        .unwrap());
                    break;
                }
                Ok(RunStreamEvent::Failed { message }) => {
                    yield Ok(Event::default().event("error").data(message));
                    break;
                }
                Err(RecvError::Lagged(skipped)) => {
                    // Slow consumer: drop the oldest events and keep going.
                    error!(%run_id, skipped, "sse subscriber lagged behind the run stream");
                    continue;
                }
                Err(RecvError::Closed) => {
                    // Publisher dropped without a terminal event; fall back
                    // to the stored record.
                    if let Ok(Some(run)) = state
                        .automation_repo
                        .find_run(workspace_id, automation_id, run_id)
                        .await
                    {
                        if run.is_terminal() {
                            yield Ok(run_end_event(&run));
                        }
                    }
                    break;
                }
            }
        }
    };

    Sse::new(s)
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(10))
                .text("keepalive"),
        )
        .into_response()
}

fn run_end_event(run: &Run) -> Event {
    Event::default()
        .event("runEnd")
        .json_data(&json!({
            "status": run.status,
            "success": run.status == "SUCCESS",
            "log": run.log,
        }))
        .unwrap()
}
