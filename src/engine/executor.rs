use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::flow::Flow;
use crate::services::ai::AiProvider;

use super::events::{EventKind, NodeEvent, NodeStatus, RunObserver};
use super::graph::Graph;
use super::handlers::dispatch;

/// Everything a node handler may touch. The engine itself never reaches
/// storage; persistence happens behind the observer.
pub struct ExecutionContext {
    pub run_id: Uuid,
    pub http_client: reqwest::Client,
    pub ai: Arc<dyn AiProvider>,
    pub trigger: Value,
}

pub struct ExecutionReport {
    pub success: bool,
    pub log: String,
}

struct WorkItem {
    node_id: String,
    path: Option<String>,
    ancestors: HashSet<String>,
}

/// Walks the flow graph depth-first from its trigger nodes. Handler failures
/// and unknown node kinds are absorbed as failure events (the branch stops,
/// siblings continue); only observer errors abort the walk.
pub async fn execute_flow(
    flow: &Flow,
    ctx: &ExecutionContext,
    observer: &dyn RunObserver,
) -> Result<ExecutionReport, sqlx::Error> {
    let graph = Graph::from_flow(flow);
    let mut log: Vec<String> = Vec::new();
    let mut success = true;

    let start = graph.start_nodes(flow);
    if start.is_empty() {
        log.push("no nodes to execute".to_string());
        return Ok(ExecutionReport {
            success: true,
            log: log.join("\n"),
        });
    }

    let mut stack: Vec<WorkItem> = start
        .into_iter()
        .rev()
        .map(|node_id| WorkItem {
            node_id,
            path: None,
            ancestors: HashSet::new(),
        })
        .collect();

    while let Some(item) = stack.pop() {
        if item.ancestors.contains(&item.node_id) {
            // Revisiting an ancestor means this branch loops; report once
            // and stop the branch.
            success = false;
            emit(
                observer,
                &mut log,
                failure_event(ctx.run_id, &item, &graph, "cycle detected"),
            )
            .await?;
            continue;
        }

        let Some(node) = graph.node(&item.node_id) else {
            success = false;
            emit(
                observer,
                &mut log,
                failure_event(ctx.run_id, &item, &graph, "node not found"),
            )
            .await?;
            continue;
        };

        emit(
            observer,
            &mut log,
            NodeEvent {
                kind: EventKind::NodeStart,
                run_id: ctx.run_id,
                node_id: node.id.clone(),
                node_type: node.kind.clone(),
                status: NodeStatus::Running,
                message: format!("executing {}", node.kind),
                path: item.path.clone(),
            },
        )
        .await?;

        let outgoing = graph.outgoing(&item.node_id);
        let output = match dispatch(node, ctx, outgoing).await {
            Ok(output) => output,
            Err(message) => {
                success = false;
                emit(
                    observer,
                    &mut log,
                    NodeEvent {
                        kind: EventKind::NodeEnd,
                        run_id: ctx.run_id,
                        node_id: node.id.clone(),
                        node_type: node.kind.clone(),
                        status: NodeStatus::Failure,
                        message,
                        path: item.path.clone(),
                    },
                )
                .await?;
                continue;
            }
        };

        emit(
            observer,
            &mut log,
            NodeEvent {
                kind: EventKind::NodeEnd,
                run_id: ctx.run_id,
                node_id: node.id.clone(),
                node_type: node.kind.clone(),
                status: NodeStatus::Success,
                message: output.message.clone(),
                path: output.path.clone().or_else(|| item.path.clone()),
            },
        )
        .await?;

        let successors = output
            .selected
            .unwrap_or_else(|| outgoing.to_vec());

        let mut ancestors = item.ancestors;
        ancestors.insert(item.node_id.clone());

        for edge in successors.iter().rev() {
            let path = if let Some(label) = &output.path {
                Some(label.clone())
            } else if output.fork {
                Some(
                    edge.source_handle
                        .clone()
                        .unwrap_or_else(|| edge.id.clone()),
                )
            } else {
                item.path.clone()
            };

            stack.push(WorkItem {
                node_id: edge.target.clone(),
                path,
                ancestors: ancestors.clone(),
            });
        }
    }

    Ok(ExecutionReport {
        success,
        log: log.join("\n"),
    })
}

fn failure_event(run_id: Uuid, item: &WorkItem, graph: &Graph, message: &str) -> NodeEvent {
    let node_type = graph
        .node(&item.node_id)
        .map(|n| n.kind.clone())
        .unwrap_or_else(|| "unknown".to_string());
    NodeEvent {
        kind: EventKind::NodeEnd,
        run_id,
        node_id: item.node_id.clone(),
        node_type,
        status: NodeStatus::Failure,
        message: message.to_string(),
        path: item.path.clone(),
    }
}

async fn emit(
    observer: &dyn RunObserver,
    log: &mut Vec<String>,
    event: NodeEvent,
) -> Result<(), sqlx::Error> {
    log.push(event.log_line());
    observer.node_event(event).await
}
