//! Offline mailbox — per-client FIFO of replies awaiting a connection
//!
//! Queues are unbounded and live only as long as the process. A client that
//! never reconnects keeps its queue forever.

use dashmap::DashMap;
use std::collections::VecDeque;
use tracing::{debug, warn};

use crate::types::{ClientId, Connection};

#[derive(Default)]
pub struct Mailbox {
    queues: DashMap<ClientId, VecDeque<String>>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the client's queue, creating it if absent
    pub fn enqueue(&self, client_id: &ClientId, message: impl Into<String>) {
        let mut queue = self.queues.entry(client_id.clone()).or_default();
        queue.push_back(message.into());
        debug!("Queued message for {} ({} pending)", client_id, queue.len());
    }

    /// Send every queued message for `client_id` over `conn`, oldest first,
    /// then delete the queue. Returns how many were delivered.
    ///
    /// If the connection dies part-way the undelivered tail is put back so
    /// nothing is lost or sent twice.
    pub fn drain_and_deliver(&self, client_id: &ClientId, conn: &Connection) -> usize {
        let Some((_, mut queue)) = self.queues.remove(client_id) else {
            return 0;
        };

        let mut delivered = 0;
        while let Some(message) = queue.pop_front() {
            if conn.send(message.clone()).is_err() {
                queue.push_front(message);
                warn!(
                    "Connection for {} closed while draining, {} messages kept",
                    client_id,
                    queue.len()
                );
                self.restore(client_id, queue);
                return delivered;
            }
            delivered += 1;
        }

        debug!("Drained {} queued messages to {}", delivered, client_id);
        delivered
    }

    /// Put undelivered messages back ahead of anything queued meanwhile
    fn restore(&self, client_id: &ClientId, mut undelivered: VecDeque<String>) {
        let mut queue = self.queues.entry(client_id.clone()).or_default();
        undelivered.extend(queue.drain(..));
        *queue = undelivered;
    }

    /// Number of messages waiting for a client
    pub fn pending(&self, client_id: &ClientId) -> usize {
        self.queues.get(client_id).map(|q| q.len()).unwrap_or(0)
    }

    pub fn has_queue(&self, client_id: &ClientId) -> bool {
        self.queues.contains_key(client_id)
    }

    /// Snapshot of a client's queue, oldest first
    pub fn peek(&self, client_id: &ClientId) -> Vec<String> {
        self.queues
            .get(client_id)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn total_pending(&self) -> usize {
        self.queues.iter().map(|q| q.len()).sum()
    }
}
