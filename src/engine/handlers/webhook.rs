use std::time::Duration;

use reqwest::Method;
use serde_json::Value;

use crate::engine::executor::ExecutionContext;
use crate::engine::templating::{render, trigger_scope};
use crate::flow::FlowNode;

use super::{truncate, HandlerOutput};

const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const MAX_TIMEOUT_MS: u64 = 120_000;
const BODY_SNIPPET_CHARS: usize = 200;

/// Outbound HTTP call node. URL and body strings pass through
/// `{{trigger.*}}` templating; any non-2xx or transport error is a
/// per-node failure.
pub async fn execute(node: &FlowNode, ctx: &ExecutionContext) -> Result<HandlerOutput, String> {
    let scope = trigger_scope(&ctx.trigger);

    let url = node
        .field("url")
        .and_then(|v| v.as_str())
        .ok_or_else(|| "webhook node has no url".to_string())?;
    let url = render(url, &scope);

    let method = parse_method(node.field("method").and_then(|v| v.as_str()))?;

    let timeout_ms = node
        .field("timeoutMs")
        .and_then(|v| v.as_u64())
        .unwrap_or(DEFAULT_TIMEOUT_MS)
        .min(MAX_TIMEOUT_MS);

    let mut request = ctx
        .http_client
        .request(method, &url)
        .timeout(Duration::from_millis(timeout_ms));

    if let Some(body) = node.field("body") {
        request = request.json(&template_value(body, &scope));
    }

    let response = request
        .send()
        .await
        .map_err(|err| format!("request to {url} failed: {err}"))?;

    let status = response.status();
    if status.is_success() {
        Ok(HandlerOutput::message(format!("HTTP {}", status.as_u16())))
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(format!(
            "HTTP {}: {}",
            status.as_u16(),
            truncate(&body, BODY_SNIPPET_CHARS)
        ))
    }
}

fn parse_method(raw: Option<&str>) -> Result<Method, String> {
    let Some(raw) = raw else {
        return Ok(Method::GET);
    };
    match raw.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        "HEAD" => Ok(Method::HEAD),
        other => Err(format!("unsupported webhook method `{other}`")),
    }
}

/// Renders every string leaf of a JSON body against the trigger scope.
fn template_value(value: &Value, scope: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(render(s, scope)),
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| template_value(item, scope)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), template_value(item, scope)))
                .collect(),
        ),
        other => other.clone(),
    }
}
