use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::error::ChatError;
use crate::server_types::BroadcastEvent;

// Unbounded on purpose: a session's publish never waits on the distributor,
// slow recipients are handled at write time instead
pub fn channel() -> (Publisher, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel::<BroadcastEvent>();
    (Publisher { tx }, EventReceiver { rx })
}

/// Producer side, one clone per session
#[derive(Debug, Clone)]
pub struct Publisher {
    tx: UnboundedSender<BroadcastEvent>,
}

impl Publisher {
    pub fn publish(&self, event: BroadcastEvent) -> Result<(), ChatError> {
        self.tx.send(event).map_err(|_| ChatError::ChannelClosed)
    }
}

/// Consumer side, owned by the distributor
#[derive(Debug)]
pub struct EventReceiver {
    rx: UnboundedReceiver<BroadcastEvent>,
}

impl EventReceiver {
    // None once every publisher is dropped and the queue is drained
    pub async fn recv(&mut self) -> Option<BroadcastEvent> {
        self.rx.recv().await
    }
}
