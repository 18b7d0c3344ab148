use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::registry::Registry;
use crate::server_channel::EventReceiver;
use crate::server_types::BroadcastEvent;

/// Drains the broadcast channel and writes every event to each joined client.
pub struct Distributor {
    registry: Registry,
}

impl Distributor {
    pub fn new(clients: &Registry) -> Self {
        Distributor {
            registry: clients.clone(),
        }
    }

    pub fn spawn(self, events: EventReceiver) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }

    // Runs until every publisher has gone away
    pub async fn run(self, mut events: EventReceiver) {
        while let Some(event) = events.recv().await {
            debug!("distributing {:?}", &event);
            self.fan_out(&event).await;
        }
        info!("No more channel senders, distributor exiting");
    }

    // One write attempt per recipient; a failed recipient is logged and
    // skipped. Returns how many recipients got the line.
    pub async fn fan_out(&self, event: &BroadcastEvent) -> usize {
        let recipients = self.registry.snapshot().await;
        let response = event.to_response();
        let mut delivered = 0;

        for entry in recipients.iter() {
            match entry.deliver(response.clone()).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!("Unable to write to {} ({}, {:?}): {}", entry.id, entry.addr, entry.name, e),
            }
        }

        delivered
    }
}
