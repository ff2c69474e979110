use super::prelude::*;

const DEFAULT_RUNS_PER_PAGE: i64 = 20;
const MAX_RUNS_PER_PAGE: i64 = 100;
const EVENT_PAGE_SIZE: i64 = 200;

#[derive(Deserialize)]
pub struct StartRunRequest {
    pub payload: Option<Value>,
}

#[derive(Deserialize)]
pub struct RunsPageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Deserialize)]
pub struct EventsCursorQuery {
    pub cursor: Option<String>,
}

pub async fn start_run(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path(automation_id): Path<Uuid>,
    payload: Option<Json<StartRunRequest>>,
) -> Response {
    let automation = match app_state
        .automation_repo
        .find_automation(claims.workspace_id, automation_id)
        .await
    {
        Ok(Some(automation)) => automation,
        Ok(None) => return JsonResponse::not_found("Automation not found").into_response(),
        Err(err) => {
            error!(%automation_id, ?err, "failed to fetch automation for run");
            return JsonResponse::server_error("Failed to start run").into_response();
        }
    };

    let run = match app_state
        .automation_repo
        .create_run(automation.id, automation.workspace_id)
        .await
    {
        Ok(run) => run,
        Err(err) => {
            error!(%automation_id, ?err, "failed to create run");
            return JsonResponse::server_error("Failed to start run").into_response();
        }
    };

    let flow = Flow::load(&automation.flow);
    let trigger = payload
        .and_then(|Json(body)| body.payload)
        .unwrap_or(Value::Null);

    let state = app_state.clone();
    let spawned_run = run.clone();
    tokio::spawn(async move {
        if let Err(err) = crate::engine::execute_run(state, spawned_run, flow, trigger).await {
            error!(
                run_id = %err.run_id(),
                operation = err.operation(),
                attempts = err.attempts(),
                "run execution aborted"
            );
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(json!({ "success": true, "run": run })),
    )
        .into_response()
}

pub async fn list_runs(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path(automation_id): Path<Uuid>,
    Query(query): Query<RunsPageQuery>,
) -> Response {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query
        .per_page
        .unwrap_or(DEFAULT_RUNS_PER_PAGE)
        .clamp(1, MAX_RUNS_PER_PAGE);
    let offset = (page - 1) * per_page;

    match app_state
        .automation_repo
        .list_runs(claims.workspace_id, automation_id, per_page, offset)
        .await
    {
        Ok(runs) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "runs": runs,
                "page": page,
                "perPage": per_page,
            })),
        )
            .into_response(),
        Err(err) => {
            error!(%automation_id, ?err, "failed to list runs");
            JsonResponse::server_error("Failed to fetch runs").into_response()
        }
    }
}

pub async fn get_run(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path((automation_id, run_id)): Path<(Uuid, Uuid)>,
) -> Response {
    match app_state
        .automation_repo
        .find_run(claims.workspace_id, automation_id, run_id)
        .await
    {
        Ok(Some(run)) => {
            (StatusCode::OK, Json(json!({ "success": true, "run": run }))).into_response()
        }
        Ok(None) => JsonResponse::not_found("Run not found").into_response(),
        Err(err) => {
            error!(%run_id, ?err, "failed to fetch run");
            JsonResponse::server_error("Failed to fetch run").into_response()
        }
    }
}

/// Cursor polling over the run's event feed. The cursor is the `createdAt`
/// of the last event the client saw; repeated polling with the returned
/// cursor observes each event exactly once.
pub async fn poll_run_events(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path((automation_id, run_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<EventsCursorQuery>,
) -> Response {
    let after = match &query.cursor {
        Some(cursor) => match OffsetDateTime::parse(cursor, &Rfc3339) {
            Ok(ts) => Some(ts),
            Err(_) => {
                return JsonResponse::bad_request("Invalid cursor").into_response();
            }
        },
        None => None,
    };

    match app_state
        .automation_repo
        .find_run(claims.workspace_id, automation_id, run_id)
        .await
    {
        Ok(Some(_)) => {}
        Ok(None) => return JsonResponse::not_found("Run not found").into_response(),
        Err(err) => {
            error!(%run_id, ?err, "failed to fetch run for event polling");
            return JsonResponse::server_error("Failed to fetch run events").into_response();
        }
    }

    match app_state
        .automation_repo
        .list_run_events(run_id, after, EVENT_PAGE_SIZE)
        .await
    {
        Ok(events) => {
            let next_cursor = events
                .last()
                .and_then(|event| event.created_at.format(&Rfc3339).ok())
                .or_else(|| query.cursor.clone());
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "events": events,
                    "nextCursor": next_cursor,
                })),
            )
                .into_response()
        }
        Err(err) => {
            error!(%run_id, ?err, "failed to list run events");
            JsonResponse::server_error("Failed to fetch run events").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::Duration as TimeDuration;

    use super::super::test_support::{claims, stored_automation, stored_run};
    use super::*;
    use crate::db::automation_repository::MockAutomationRepository;
    use crate::models::run_event::RunEvent;
    use crate::state::test_state;

    async fn body_json(resp: Response) -> Value {
        let body = axum::body::to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn event_at(run_id: Uuid, created_at: OffsetDateTime) -> RunEvent {
        RunEvent {
            id: Uuid::new_v4(),
            run_id,
            node_id: "n1".into(),
            node_type: "trigger".into(),
            status: "success".into(),
            message: "ok".into(),
            path: None,
            created_at,
        }
    }

    #[tokio::test]
    async fn start_run_returns_202_with_the_running_row() {
        let claims = claims();
        let workspace_id = claims.workspace_id;
        let mut repo = MockAutomationRepository::new();
        repo.expect_find_automation().returning(|ws, _| {
            let automation = stored_automation(ws, "A", serde_json::json!({}));
            Ok(Some(automation))
        });
        repo.expect_create_run().returning(|automation_id, ws| {
            let run = stored_run(automation_id, ws, "RUNNING");
            Ok(run)
        });
        // The spawned runner finalizes the empty flow in the background.
        repo.expect_complete_run()
            .returning(|_, _, _| Ok(true));

        let resp = start_run(
            State(test_state(Arc::new(repo))),
            AuthSession(claims),
            Path(Uuid::new_v4()),
            None,
        )
        .await;

        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let json = body_json(resp).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["run"]["status"], "RUNNING");
        assert_eq!(json["run"]["workspaceId"], workspace_id.to_string());
    }

    #[tokio::test]
    async fn start_run_on_unknown_automation_is_404() {
        let mut repo = MockAutomationRepository::new();
        repo.expect_find_automation()
            .returning(|_, _| Ok(None));

        let resp = start_run(
            State(test_state(Arc::new(repo))),
            AuthSession(claims()),
            Path(Uuid::new_v4()),
            None,
        )
        .await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_runs_clamps_the_page_size() {
        let mut repo = MockAutomationRepository::new();
        repo.expect_list_runs()
            .withf(|_, _, limit, offset| *limit == MAX_RUNS_PER_PAGE && *offset == 200)
            .returning(|_, _, _, _| Ok(vec![]));

        let resp = list_runs(
            State(test_state(Arc::new(repo))),
            AuthSession(claims()),
            Path(Uuid::new_v4()),
            Query(RunsPageQuery {
                page: Some(3),
                per_page: Some(5000),
            }),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["perPage"], MAX_RUNS_PER_PAGE);
        assert_eq!(json["page"], 3);
    }

    #[tokio::test]
    async fn poll_rejects_malformed_cursors() {
        let repo = MockAutomationRepository::new();
        let resp = poll_run_events(
            State(test_state(Arc::new(repo))),
            AuthSession(claims()),
            Path((Uuid::new_v4(), Uuid::new_v4())),
            Query(EventsCursorQuery {
                cursor: Some("yesterday".into()),
            }),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn poll_advances_the_cursor_to_the_last_event() {
        let run_id = Uuid::new_v4();
        let newest = OffsetDateTime::now_utc();
        let oldest = newest - TimeDuration::seconds(5);

        let mut repo = MockAutomationRepository::new();
        repo.expect_find_run().returning(|ws, automation_id, _| {
            let run = stored_run(automation_id, ws, "RUNNING");
            Ok(Some(run))
        });
        repo.expect_list_run_events()
            .withf(|_, after, limit| after.is_none() && *limit == EVENT_PAGE_SIZE)
            .returning(move |run_id, _, _| {
                let events = vec![event_at(run_id, oldest), event_at(run_id, newest)];
                Ok(events)
            });

        let resp = poll_run_events(
            State(test_state(Arc::new(repo))),
            AuthSession(claims()),
            Path((Uuid::new_v4(), run_id)),
            Query(EventsCursorQuery { cursor: None }),
        )
        .await;

        let json = body_json(resp).await;
        assert_eq!(json["events"].as_array().unwrap().len(), 2);
        assert_eq!(
            json["nextCursor"],
            newest.format(&Rfc3339).unwrap().as_str()
        );
    }

    #[tokio::test]
    async fn idle_poll_echoes_the_cursor() {
        let cursor = OffsetDateTime::now_utc().format(&Rfc3339).unwrap();

        let mut repo = MockAutomationRepository::new();
        repo.expect_find_run().returning(|ws, automation_id, _| {
            let run = stored_run(automation_id, ws, "SUCCESS");
            Ok(Some(run))
        });
        repo.expect_list_run_events()
            .withf(|_, after, _| after.is_some())
            .returning(|_, _, _| Ok(vec![]));

        let resp = poll_run_events(
            State(test_state(Arc::new(repo))),
            AuthSession(claims()),
            Path((Uuid::new_v4(), Uuid::new_v4())),
            Query(EventsCursorQuery {
                cursor: Some(cursor.clone()),
            }),
        )
        .await;

        let json = body_json(resp).await;
        assert_eq!(json["events"], serde_json::json!([]));
        assert_eq!(json["nextCursor"], cursor.as_str());
    }

    #[tokio::test]
    async fn poll_for_unknown_run_is_404() {
        let mut repo = MockAutomationRepository::new();
        repo.expect_find_run()
            .returning(|_, _, _| Ok(None));

        let resp = poll_run_events(
            State(test_state(Arc::new(repo))),
            AuthSession(claims()),
            Path((Uuid::new_v4(), Uuid::new_v4())),
            Query(EventsCursorQuery { cursor: None }),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
