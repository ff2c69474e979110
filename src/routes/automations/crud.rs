use super::prelude::*;

pub async fn create_automation(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Json(payload): Json<CreateAutomation>,
) -> Response {
    let CreateAutomation { name, flow } = payload;
    let name = name.trim().to_string();
    if name.is_empty() {
        return JsonResponse::bad_request("Automation name is required").into_response();
    }

    // Whatever the client sent becomes a normalized flow document.
    let flow = flow
        .map(|raw| Flow::load(&raw))
        .unwrap_or_else(Flow::empty)
        .save();

    match app_state
        .automation_repo
        .create_automation(claims.workspace_id, &name, flow)
        .await
    {
        Ok(automation) => (
            StatusCode::CREATED,
            Json(json!({ "success": true, "automation": automation })),
        )
            .into_response(),
        Err(err) => {
            error!(?err, "failed to create automation");
            JsonResponse::server_error("Failed to create automation").into_response()
        }
    }
}

pub async fn list_automations(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
) -> Response {
    match app_state
        .automation_repo
        .list_automations(claims.workspace_id)
        .await
    {
        Ok(automations) => (
            StatusCode::OK,
            Json(json!({ "success": true, "automations": automations })),
        )
            .into_response(),
        Err(err) => {
            error!(?err, "failed to list automations");
            JsonResponse::server_error("Failed to fetch automations").into_response()
        }
    }
}

pub async fn get_automation(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path(automation_id): Path<Uuid>,
) -> Response {
    match app_state
        .automation_repo
        .find_automation(claims.workspace_id, automation_id)
        .await
    {
        Ok(Some(mut automation)) => {
            automation.flow = Flow::load(&automation.flow).save();
            (
                StatusCode::OK,
                Json(json!({ "success": true, "automation": automation })),
            )
                .into_response()
        }
        Ok(None) => JsonResponse::not_found("Automation not found").into_response(),
        Err(err) => {
            error!(%automation_id, ?err, "failed to fetch automation");
            JsonResponse::server_error("Failed to fetch automation").into_response()
        }
    }
}

pub async fn delete_automation(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path(automation_id): Path<Uuid>,
) -> Response {
    match app_state
        .automation_repo
        .delete_automation(claims.workspace_id, automation_id)
        .await
    {
        Ok(true) => JsonResponse::success("Automation deleted").into_response(),
        Ok(false) => JsonResponse::not_found("Automation not found").into_response(),
        Err(err) => {
            error!(%automation_id, ?err, "failed to delete automation");
            JsonResponse::server_error("Failed to delete automation").into_response()
        }
    }
}

pub async fn get_automation_flow(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path(automation_id): Path<Uuid>,
) -> Response {
    match app_state
        .automation_repo
        .find_automation(claims.workspace_id, automation_id)
        .await
    {
        Ok(Some(automation)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "id": automation.id,
                "name": automation.name,
                "flow": Flow::load(&automation.flow).save(),
            })),
        )
            .into_response(),
        Ok(None) => JsonResponse::not_found("Automation not found").into_response(),
        Err(err) => {
            error!(%automation_id, ?err, "failed to fetch automation flow");
            JsonResponse::server_error("Failed to fetch flow").into_response()
        }
    }
}

pub async fn update_automation_flow(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path(automation_id): Path<Uuid>,
    Json(payload): Json<Value>,
) -> Response {
    let flow = Flow::load(&payload).save();

    match app_state
        .automation_repo
        .update_flow(claims.workspace_id, automation_id, flow)
        .await
    {
        Ok(Some(automation)) => (
            StatusCode::OK,
            Json(json!({ "success": true, "flow": automation.flow })),
        )
            .into_response(),
        Ok(None) => JsonResponse::not_found("Automation not found").into_response(),
        Err(err) => {
            error!(%automation_id, ?err, "failed to update automation flow");
            JsonResponse::server_error("Failed to save flow").into_response()
        }
    }
}
