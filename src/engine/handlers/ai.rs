use serde_json::Value;

use crate::engine::executor::ExecutionContext;
use crate::engine::templating::{render, trigger_scope};
use crate::flow::{FlowEdge, FlowNode};

use super::{truncate, HandlerOutput};

const REPLY_SNIPPET_CHARS: usize = 200;

pub async fn llm(node: &FlowNode, ctx: &ExecutionContext) -> Result<HandlerOutput, String> {
    let prompt = node
        .field("prompt")
        .and_then(|v| v.as_str())
        .ok_or_else(|| "ai-llm node has no prompt".to_string())?;
    let prompt = render(prompt, &trigger_scope(&ctx.trigger));

    let reply = ctx
        .ai
        .complete(&prompt)
        .await
        .map_err(|err| format!("ai completion failed: {err}"))?;

    Ok(HandlerOutput::message(truncate(&reply, REPLY_SNIPPET_CHARS)))
}

pub async fn classifier(node: &FlowNode, ctx: &ExecutionContext) -> Result<HandlerOutput, String> {
    let input = classifier_input(node, ctx);
    let categories = string_array(node.field("categories"));

    let label = ctx
        .ai
        .classify(&input, &categories)
        .await
        .map_err(|err| format!("ai classification failed: {err}"))?;

    Ok(HandlerOutput::message(format!("classified as {label}")))
}

/// Routes by matching the provider's answer against the configured path
/// labels: first by `sourceHandle`, then by path index. No match keeps the
/// default fan-out.
pub async fn splitter(
    node: &FlowNode,
    ctx: &ExecutionContext,
    outgoing: &[FlowEdge],
) -> Result<HandlerOutput, String> {
    let paths = string_array(node.field("paths"));
    if paths.is_empty() {
        return Ok(HandlerOutput::message("no paths configured"));
    }

    let input = classifier_input(node, ctx);
    let label = ctx
        .ai
        .select_path(&input, &paths)
        .await
        .map_err(|err| format!("ai path selection failed: {err}"))?;

    let matched = outgoing
        .iter()
        .find(|edge| edge.source_handle.as_deref() == Some(label.as_str()))
        .or_else(|| {
            paths
                .iter()
                .position(|path| path == &label)
                .and_then(|index| outgoing.get(index))
        });

    match matched {
        Some(edge) => Ok(HandlerOutput {
            message: format!("routed to {label}"),
            path: Some(label),
            selected: Some(vec![edge.clone()]),
            fork: false,
        }),
        None => Ok(HandlerOutput::message(format!(
            "no matching path for {label}"
        ))),
    }
}

fn classifier_input(node: &FlowNode, ctx: &ExecutionContext) -> String {
    match node.field("input").and_then(Value::as_str) {
        Some(input) => render(input, &trigger_scope(&ctx.trigger)),
        None => ctx.trigger.to_string(),
    }
}

fn string_array(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::services::ai::{AiProviderError, MockAiProvider, ScriptedAiProvider};

    fn ctx(ai: Arc<dyn crate::services::ai::AiProvider>, trigger: Value) -> ExecutionContext {
        ExecutionContext {
            run_id: Uuid::new_v4(),
            http_client: reqwest::Client::new(),
            ai,
            trigger,
        }
    }

    fn node(kind: &str, data: Value) -> FlowNode {
        serde_json::from_value(json!({ "id": "a1", "type": kind, "data": data })).unwrap()
    }

    fn edge(id: &str, handle: Option<&str>) -> FlowEdge {
        serde_json::from_value(json!({
            "id": id, "source": "a1", "target": "next", "sourceHandle": handle
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn llm_templates_the_prompt() {
        let mut ai = MockAiProvider::new();
        ai.expect_complete()
            .withf(|prompt| prompt == "Summarize: welcome email opened")
            .returning(|_| Ok("A contact opened the email.".to_string()));

        let out = llm(
            &node("ai-llm", json!({ "prompt": "Summarize: {{trigger.event}}" })),
            &ctx(Arc::new(ai), json!({ "event": "welcome email opened" })),
        )
        .await
        .unwrap();
        assert_eq!(out.message, "A contact opened the email.");
    }

    #[tokio::test]
    async fn llm_without_prompt_fails() {
        let err = llm(
            &node("ai-llm", json!({})),
            &ctx(Arc::new(ScriptedAiProvider::new()), Value::Null),
        )
        .await
        .unwrap_err();
        assert_eq!(err, "ai-llm node has no prompt");
    }

    #[tokio::test]
    async fn classifier_defaults_input_to_the_trigger_payload() {
        let mut ai = MockAiProvider::new();
        ai.expect_classify()
            .withf(|input, categories| {
                input.contains("\"plan\":\"pro\"") && categories == ["upgrade", "churn"]
            })
            .returning(|_, _| Ok("upgrade".to_string()));

        let out = classifier(
            &node("ai-classifier", json!({ "categories": ["upgrade", "churn"] })),
            &ctx(Arc::new(ai), json!({ "plan": "pro" })),
        )
        .await
        .unwrap();
        assert_eq!(out.message, "classified as upgrade");
    }

    #[tokio::test]
    async fn classifier_provider_error_is_a_failure() {
        let mut ai = MockAiProvider::new();
        ai.expect_classify()
            .returning(|_, _| Err(AiProviderError::MissingOutput));

        let err = classifier(
            &node("ai-classifier", json!({ "categories": [] })),
            &ctx(Arc::new(ai), Value::Null),
        )
        .await
        .unwrap_err();
        assert!(err.starts_with("ai classification failed"));
    }

    #[tokio::test]
    async fn splitter_matches_source_handle_first() {
        let out = splitter(
            &node("ai-splitter", json!({ "paths": ["vip", "standard"] })),
            &ctx(Arc::new(ScriptedAiProvider::scripted(["vip"])), Value::Null),
            &[edge("e1", Some("standard")), edge("e2", Some("vip"))],
        )
        .await
        .unwrap();

        assert_eq!(out.path.as_deref(), Some("vip"));
        let selected = out.selected.unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, "e2");
    }

    #[tokio::test]
    async fn splitter_falls_back_to_path_index() {
        let out = splitter(
            &node("ai-splitter", json!({ "paths": ["vip", "standard"] })),
            &ctx(
                Arc::new(ScriptedAiProvider::scripted(["standard"])),
                Value::Null,
            ),
            &[edge("e1", None), edge("e2", None)],
        )
        .await
        .unwrap();

        let selected = out.selected.unwrap();
        assert_eq!(selected[0].id, "e2");
    }

    #[tokio::test]
    async fn splitter_without_a_match_keeps_fan_out() {
        let out = splitter(
            &node("ai-splitter", json!({ "paths": ["vip"] })),
            &ctx(
                Arc::new(ScriptedAiProvider::scripted(["something else"])),
                Value::Null,
            ),
            &[edge("e1", None)],
        )
        .await
        .unwrap();

        assert!(out.selected.is_none());
        assert!(out.path.is_none());
        assert_eq!(out.message, "no matching path for something else");
    }

    #[tokio::test]
    async fn splitter_without_paths_skips_the_provider() {
        let out = splitter(
            &node("ai-splitter", json!({})),
            &ctx(Arc::new(ScriptedAiProvider::new()), Value::Null),
            &[edge("e1", None)],
        )
        .await
        .unwrap();
        assert_eq!(out.message, "no paths configured");
        assert!(out.selected.is_none());
    }
}
