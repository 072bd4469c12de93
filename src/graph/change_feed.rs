//! Ordered feed of authoritative-graph mutations.

use tokio::sync::mpsc;

use super::element::GraphElement;

/// One committed mutation: `(before, current, is_vertex)`
///
/// An addition has no `before`, a removal has no `current`.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphChange {
    pub before: Option<GraphElement>,
    pub current: Option<GraphElement>,
    pub is_vertex: bool,
}

/// Receiving side of an authoritative graph's change notifications
#[derive(Debug)]
pub struct GraphChangeFeed {
    receiver: mpsc::UnboundedReceiver<GraphChange>,
}

impl GraphChangeFeed {
    pub(crate) fn new(receiver: mpsc::UnboundedReceiver<GraphChange>) -> Self {
        Self { receiver }
    }

    /// Next change in commit order, or `None` once the graph is dropped
    pub async fn next_change(&mut self) -> Option<GraphChange> {
        self.receiver.recv().await
    }

    /// Non-blocking variant of [`next_change`](Self::next_change)
    pub fn try_next_change(&mut self) -> Option<GraphChange> {
        self.receiver.try_recv().ok()
    }
}
