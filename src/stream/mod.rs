use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::engine::events::NodeEvent;
use crate::models::run::RunStatus;

/// Per-run channel capacity. A subscriber that lags past this many events
/// loses the oldest ones (`RecvError::Lagged`); consumers skip and continue.
const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", untagged)]
pub enum RunStreamEvent {
    Node(NodeEvent),
    Completed {
        status: RunStatus,
        success: bool,
        log: String,
    },
    Failed {
        message: String,
    },
}

/// Registry of live run channels. Cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct RunStreams {
    inner: Arc<DashMap<Uuid, broadcast::Sender<RunStreamEvent>>>,
}

impl RunStreams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a channel for the run and hands back the publishing side.
    /// Dropping the publisher unregisters the channel, so the stream closes
    /// on every exit path.
    pub fn open(&self, run_id: Uuid) -> RunStreamPublisher {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        self.inner.insert(run_id, sender.clone());
        RunStreamPublisher {
            streams: self.clone(),
            run_id,
            sender,
        }
    }

    /// `None` once the run's publisher is gone; callers fall back to the
    /// stored run record.
    pub fn subscribe(&self, run_id: Uuid) -> Option<broadcast::Receiver<RunStreamEvent>> {
        self.inner.get(&run_id).map(|sender| sender.subscribe())
    }
}

pub struct RunStreamPublisher {
    streams: RunStreams,
    run_id: Uuid,
    sender: broadcast::Sender<RunStreamEvent>,
}

impl RunStreamPublisher {
    /// Send errors mean no subscriber is listening right now, which is fine.
    pub fn publish(&self, event: RunStreamEvent) {
        let _ = self.sender.send(event);
    }
}

impl Drop for RunStreamPublisher {
    fn drop(&mut self) {
        self.streams.inner.remove(&self.run_id);
    }
}
