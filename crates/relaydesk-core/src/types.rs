//! Identifiers and the live connection handle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{RelayError, Result};

/// Prefix prepended to every operator reply delivered to a client
pub const OPERATOR_PREFIX: &str = "Operator: ";

/// Opaque identifier of one end-user session, supplied by the client
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Used when a client connects without naming itself
    pub const UNKNOWN: &'static str = "unknown_client";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ClientId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A human operator, stable across their interactions (Telegram user id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatorId(pub i64);

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where acknowledgements for an operator go (Telegram chat id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sender half feeding a client's socket writer
pub type FrameSender = mpsc::UnboundedSender<String>;

/// A live, writable channel to exactly one client.
///
/// Clones share the same identity. Two connections for the same `ClientId`
/// are told apart by their `key`, which is what deregistration compares.
#[derive(Debug, Clone)]
pub struct Connection {
    key: Uuid,
    client_id: ClientId,
    connected_at: DateTime<Utc>,
    tx: FrameSender,
}

impl Connection {
    pub fn new(client_id: ClientId, tx: FrameSender) -> Self {
        Self {
            key: Uuid::new_v4(),
            client_id,
            connected_at: Utc::now(),
            tx,
        }
    }

    pub fn key(&self) -> Uuid {
        self.key
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn uptime(&self) -> std::time::Duration {
        (Utc::now() - self.connected_at).to_std().unwrap_or_default()
    }

    /// Identity comparison, not id comparison
    pub fn same_as(&self, other: &Connection) -> bool {
        self.key == other.key
    }

    /// Queue a text frame for the socket writer. Never blocks.
    pub fn send(&self, text: impl Into<String>) -> Result<()> {
        self.tx
            .send(text.into())
            .map_err(|_| RelayError::ConnectionClosed(self.client_id.clone()))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_client_id() {
        assert_eq!(ClientId::unknown().as_str(), "unknown_client");
    }

    #[test]
    fn test_connection_identity() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let a = Connection::new(ClientId::from("u1"), tx.clone());
        let b = Connection::new(ClientId::from("u1"), tx);
        assert!(a.same_as(&a.clone()));
        assert!(!a.same_as(&b));
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Connection::new(ClientId::from("u1"), tx);
        drop(rx);
        assert!(conn.is_closed());
        let err = conn.send("hello").unwrap_err();
        assert!(matches!(err, RelayError::ConnectionClosed(id) if id.as_str() == "u1"));
    }

    #[test]
    fn test_send_delivers_frame() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = Connection::new(ClientId::from("u1"), tx);
        conn.send("hi").unwrap();
        assert_eq!(rx.try_recv().unwrap(), "hi");
    }
}
