use crate::flow::{FlowEdge, FlowNode};

use super::executor::ExecutionContext;

pub mod ai;
pub mod webhook;

/// Closed set of executable node kinds. The flow layer keeps `type` open;
/// anything outside this set fails at execution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Trigger,
    Delay,
    Webhook,
    AiLlm,
    AiClassifier,
    AiSplitter,
    Group,
    OrPath,
}

impl NodeKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "trigger" => Some(NodeKind::Trigger),
            "delay" => Some(NodeKind::Delay),
            "webhook" => Some(NodeKind::Webhook),
            "ai-llm" => Some(NodeKind::AiLlm),
            "ai-classifier" => Some(NodeKind::AiClassifier),
            "ai-splitter" => Some(NodeKind::AiSplitter),
            "group" => Some(NodeKind::Group),
            "or-path" => Some(NodeKind::OrPath),
            _ => None,
        }
    }
}

/// What a handler tells the walk. `selected` narrows fan-out to a subset of
/// the outgoing edges; `path` tags successors with a routing label; `fork`
/// tags each successor with its own edge handle instead.
#[derive(Debug, Default)]
pub struct HandlerOutput {
    pub message: String,
    pub path: Option<String>,
    pub selected: Option<Vec<FlowEdge>>,
    pub fork: bool,
}

impl HandlerOutput {
    pub fn message(message: impl Into<String>) -> Self {
        HandlerOutput {
            message: message.into(),
            ..Default::default()
        }
    }
}

/// Runs the node's handler. `Err` is a per-node failure the walk absorbs.
pub async fn dispatch(
    node: &FlowNode,
    ctx: &ExecutionContext,
    outgoing: &[FlowEdge],
) -> Result<HandlerOutput, String> {
    let Some(kind) = NodeKind::parse(&node.kind) else {
        return Err(format!("unknown node type `{}`", node.kind));
    };

    match kind {
        NodeKind::Trigger => Ok(trigger(ctx)),
        NodeKind::Delay => Ok(delay(node)),
        NodeKind::Webhook => webhook::execute(node, ctx).await,
        NodeKind::AiLlm => ai::llm(node, ctx).await,
        NodeKind::AiClassifier => ai::classifier(node, ctx).await,
        NodeKind::AiSplitter => ai::splitter(node, ctx, outgoing).await,
        NodeKind::Group => Ok(HandlerOutput::message("group passthrough")),
        NodeKind::OrPath => Ok(or_path(node, outgoing)),
    }
}

fn trigger(ctx: &ExecutionContext) -> HandlerOutput {
    if ctx.trigger.is_null() {
        HandlerOutput::message("triggered manually")
    } else {
        HandlerOutput::message("triggered with payload")
    }
}

/// Advisory only: the duration lands in the event message, nothing sleeps.
fn delay(node: &FlowNode) -> HandlerOutput {
    let minutes = node
        .field("durationMinutes")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    HandlerOutput::message(format!("delay {minutes}m (advisory)"))
}

fn or_path(node: &FlowNode, outgoing: &[FlowEdge]) -> HandlerOutput {
    let first_only = node
        .field("mode")
        .and_then(|v| v.as_str())
        .is_some_and(|mode| mode == "first");

    if first_only {
        let selected: Vec<FlowEdge> = outgoing.iter().take(1).cloned().collect();
        HandlerOutput {
            message: "selected first path".into(),
            selected: Some(selected),
            fork: true,
            ..Default::default()
        }
    } else {
        HandlerOutput {
            message: format!("fanned out to {} paths", outgoing.len()),
            fork: true,
            ..Default::default()
        }
    }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{head}…")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn node(kind: &str, data: serde_json::Value) -> FlowNode {
        serde_json::from_value(json!({ "id": "n1", "type": kind, "data": data })).unwrap()
    }

    fn edge(id: &str, handle: Option<&str>) -> FlowEdge {
        serde_json::from_value(json!({
            "id": id, "source": "n1", "target": "n2", "sourceHandle": handle
        }))
        .unwrap()
    }

    #[test]
    fn parse_covers_the_closed_kind_set() {
        assert_eq!(NodeKind::parse("ai-splitter"), Some(NodeKind::AiSplitter));
        assert_eq!(NodeKind::parse("or-path"), Some(NodeKind::OrPath));
        assert_eq!(NodeKind::parse("email"), None);
    }

    #[test]
    fn delay_defaults_invalid_durations_to_zero() {
        let out = delay(&node("delay", json!({ "durationMinutes": "soon" })));
        assert_eq!(out.message, "delay 0m (advisory)");

        let out = delay(&node("delay", json!({ "durationMinutes": 15 })));
        assert_eq!(out.message, "delay 15m (advisory)");
    }

    #[test]
    fn or_path_first_mode_selects_one_edge() {
        let edges = vec![edge("e1", Some("a")), edge("e2", Some("b"))];
        let out = or_path(&node("or-path", json!({ "mode": "first" })), &edges);
        let selected = out.selected.unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, "e1");
        assert!(out.fork);
    }

    #[test]
    fn or_path_default_fans_out() {
        let edges = vec![edge("e1", None), edge("e2", None)];
        let out = or_path(&node("or-path", json!({})), &edges);
        assert!(out.selected.is_none());
        assert!(out.fork);
    }

    #[test]
    fn truncate_keeps_short_strings_intact() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc…");
    }
}
