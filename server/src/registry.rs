use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::server_types::{ClientEntry, ConnId, Connection};

/// Live set of joined clients keyed by connection id.
///
/// A single coarse lock covers add, remove and snapshot. Fan-out never
/// iterates the map itself, it works on a [`Registry::snapshot`] copy taken
/// under the lock, so no connection write ever happens while the lock is held.
#[derive(Clone, Default)]
pub struct Registry {
    clients: Arc<Mutex<HashMap<ConnId, ClientEntry>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    // Overwrites any entry already stored for this connection
    pub async fn add(&self, conn: &Connection, name: String) {
        let entry = conn.entry(name);
        let mut clients = self.clients.lock().await;
        if let Some(prev) = clients.insert(entry.id, entry) {
            debug!("registry entry for connection {} replaced (was {:?})", prev.id, prev.name);
        }
    }

    // Idempotent, removing an absent id is a no-op
    pub async fn remove(&self, id: ConnId) -> Option<ClientEntry> {
        self.clients.lock().await.remove(&id)
    }

    pub async fn snapshot(&self) -> Vec<ClientEntry> {
        self.clients.lock().await.values().cloned().collect()
    }

    pub async fn contains(&self, id: ConnId) -> bool {
        self.clients.lock().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
