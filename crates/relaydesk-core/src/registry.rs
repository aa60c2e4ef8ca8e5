//! Connection registry — which clients are live right now
//!
//! One entry per `ClientId`, last connection wins. Removal is guarded by
//! connection identity so a superseded socket closing late cannot evict
//! its replacement.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use crate::error::Result;
use crate::types::{ClientId, Connection};

/// Where a message ended up in [`Registry::deliver_or_else`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Live,
    Absent,
}

#[derive(Default)]
pub struct Registry {
    connections: DashMap<ClientId, Connection>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `conn` for its client id, replacing any previous connection.
    ///
    /// `on_install` runs while the slot for that id is held exclusively and
    /// before the connection becomes visible to lookups. Returns the
    /// superseded connection, if any.
    pub fn register<F>(&self, conn: Connection, on_install: F) -> Option<Connection>
    where
        F: FnOnce(&Connection),
    {
        let entry = self.connections.entry(conn.client_id().clone());
        on_install(&conn);

        let client_id = conn.client_id().clone();
        let previous = match entry {
            Entry::Occupied(mut slot) => Some(slot.insert(conn)),
            Entry::Vacant(slot) => {
                slot.insert(conn);
                None
            }
        };

        debug!(
            "Registered {} ({} live, superseded: {})",
            client_id,
            self.connections.len(),
            previous.is_some()
        );
        previous
    }

    /// Remove `conn` only if it is still the registered connection for its id
    pub fn deregister(&self, conn: &Connection) -> bool {
        let removed = self
            .connections
            .remove_if(conn.client_id(), |_, current| current.same_as(conn))
            .is_some();

        if removed {
            debug!("Deregistered {}", conn.client_id());
        } else {
            debug!(
                "Ignored close of superseded connection for {}",
                conn.client_id()
            );
        }
        removed
    }

    pub fn lookup(&self, client_id: &ClientId) -> Option<Connection> {
        self.connections.get(client_id).map(|c| c.value().clone())
    }

    /// Send `message` to the live connection for `client_id`, or hand it to
    /// `on_absent` while the slot is still held so a concurrent reconnect
    /// cannot slip in between the lookup and the fallback.
    pub fn deliver_or_else<F>(
        &self,
        client_id: &ClientId,
        message: String,
        on_absent: F,
    ) -> Result<Delivery>
    where
        F: FnOnce(String),
    {
        match self.connections.entry(client_id.clone()) {
            Entry::Occupied(slot) => {
                slot.get().send(message)?;
                Ok(Delivery::Live)
            }
            Entry::Vacant(_slot) => {
                on_absent(message);
                Ok(Delivery::Absent)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Connected client ids, sorted
    pub fn client_ids(&self) -> Vec<ClientId> {
        let mut ids: Vec<ClientId> = self.connections.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}
