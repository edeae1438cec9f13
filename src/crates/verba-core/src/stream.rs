//! Step events
//!
//! Every completed node is reported as a [`StepEvent`] in completion order.
//! Delivery is best effort; the checkpoint is the durable record.

use crate::graph::Node;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

/// A node finished and these fields changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepEvent {
    pub session_key: String,
    pub node: Node,
    /// Step counter after this node
    pub step: u32,
    /// State fields written by the node
    pub produced: Map<String, Value>,
}

/// Where the machine sends step events
#[derive(Debug, Clone, Default)]
pub struct StepSink {
    tx: Option<mpsc::UnboundedSender<StepEvent>>,
}

impl StepSink {
    /// Discard every event
    pub fn none() -> Self {
        Self { tx: None }
    }

    /// Sink paired with the receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StepEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub(crate) fn emit(&self, event: StepEvent) {
        if let Some(tx) = &self.tx {
            // Receiver gone means nobody is listening any more
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(step: u32) -> StepEvent {
        StepEvent {
            session_key: "s".into(),
            node: Node::Translate,
            step,
            produced: Map::new(),
        }
    }

    #[tokio::test]
    async fn test_channel_preserves_order() {
        let (sink, mut rx) = StepSink::channel();
        sink.emit(event(1));
        sink.emit(event(2));
        assert_eq!(rx.recv().await.unwrap().step, 1);
        assert_eq!(rx.recv().await.unwrap().step, 2);
    }

    #[test]
    fn test_emit_after_receiver_dropped() {
        let (sink, rx) = StepSink::channel();
        drop(rx);
        sink.emit(event(1));
        StepSink::none().emit(event(2));
    }
}
