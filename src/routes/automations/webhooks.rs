use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::prelude::*;

type HmacSha256 = Hmac<Sha256>;

/// Public trigger token: HMAC over the automation id and its webhook salt.
/// Rotating the salt invalidates every previously issued URL.
fn compute_webhook_token(secret: &str, automation_id: Uuid, salt: Uuid) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(format!("{automation_id}.{salt}").as_bytes());
    let res = mac.finalize().into_bytes();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(res)
}

pub async fn get_webhook_url(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path(automation_id): Path<Uuid>,
) -> Response {
    match app_state
        .automation_repo
        .find_automation(claims.workspace_id, automation_id)
        .await
    {
        Ok(Some(automation)) => {
            let token = compute_webhook_token(
                &app_state.config.webhook_secret,
                automation.id,
                automation.webhook_salt,
            );
            let url = format!(
                "{}/api/hooks/{}/{}",
                app_state.config.backend_url, automation.id, token
            );
            (StatusCode::OK, Json(json!({ "success": true, "url": url }))).into_response()
        }
        Ok(None) => JsonResponse::not_found("Automation not found").into_response(),
        Err(err) => {
            error!(%automation_id, ?err, "failed to fetch automation for webhook url");
            JsonResponse::server_error("Failed to get webhook URL").into_response()
        }
    }
}

pub async fn webhook_trigger(
    State(app_state): State<AppState>,
    Path((automation_id, token)): Path<(Uuid, String)>,
    body: Option<Json<Value>>,
) -> Response {
    let automation = match app_state
        .automation_repo
        .find_automation_by_id(automation_id)
        .await
    {
        Ok(Some(automation)) => automation,
        Ok(None) => return JsonResponse::not_found("Automation not found").into_response(),
        Err(err) => {
            error!(%automation_id, ?err, "failed to fetch automation for webhook trigger");
            return JsonResponse::server_error("Failed to trigger automation").into_response();
        }
    };

    let expected = compute_webhook_token(
        &app_state.config.webhook_secret,
        automation.id,
        automation.webhook_salt,
    );
    if !bool::from(expected.as_bytes().ct_eq(token.as_bytes())) {
        return JsonResponse::unauthorized("Invalid token").into_response();
    }

    let run = match app_state
        .automation_repo
        .create_run(automation.id, automation.workspace_id)
        .await
    {
        Ok(run) => run,
        Err(err) => {
            error!(%automation_id, ?err, "failed to create webhook run");
            return JsonResponse::server_error("Failed to trigger automation").into_response();
        }
    };

    let flow = Flow::load(&automation.flow);
    let trigger = body.map(|Json(value)| value).unwrap_or(Value::Null);
    let run_id = run.id;

    let state = app_state.clone();
    tokio::spawn(async move {
        if let Err(err) = crate::engine::execute_run(state, run, flow, trigger).await {
            error!(
                run_id = %err.run_id(),
                operation = err.operation(),
                attempts = err.attempts(),
                "webhook run execution aborted"
            );
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(json!({ "success": true, "runId": run_id })),
    )
        .into_response()
}
