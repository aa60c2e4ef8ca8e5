//! Router — ties connections, the mailbox and reply context together
//!
//! Client side: `connect` registers a socket and flushes its mailbox,
//! `disconnect` removes it again (identity-guarded).
//!
//! Operator side: `handle` takes an inbound event from the bot platform,
//! resolves which client it is for, delivers or queues the reply and
//! acknowledges back to the operator. Acknowledgement failures never undo
//! routing state; they are reported in the returned outcome.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::Result;
use crate::mailbox::Mailbox;
use crate::notifier::{NotifyOutcome, OperatorNotifier};
use crate::registry::{Delivery, Registry};
use crate::tracker::Tracker;
use crate::types::{ChatId, ClientId, Connection, FrameSender, OPERATOR_PREFIX, OperatorId};

/// Event delivered by the bot platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Operator pressed "Reply" for a specific client
    Selection {
        operator: OperatorId,
        chat: ChatId,
        client_id: ClientId,
    },
    /// Operator typed a message
    FreeText {
        operator: OperatorId,
        chat: ChatId,
        text: String,
    },
}

/// What the router did with an inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Selection stored, operator asked to type their reply
    Prompted {
        client_id: ClientId,
        notify: NotifyOutcome,
    },
    /// Reply written to the client's live connection
    Delivered {
        client_id: ClientId,
        notify: NotifyOutcome,
    },
    /// Client offline, reply waiting in the mailbox
    Queued {
        client_id: ClientId,
        notify: NotifyOutcome,
    },
    /// No target could be resolved; nothing changed
    Ignored,
}

/// Counters exposed by the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct RouterStats {
    pub connected_clients: usize,
    pub queued_messages: usize,
    pub pending_replies: usize,
}

pub struct Router {
    registry: Registry,
    mailbox: Mailbox,
    tracker: Tracker,
    notifier: Arc<dyn OperatorNotifier>,
    operator_chat: Option<ChatId>,
}

impl Router {
    pub fn new(notifier: Arc<dyn OperatorNotifier>) -> Self {
        Self {
            registry: Registry::new(),
            mailbox: Mailbox::new(),
            tracker: Tracker::new(),
            notifier,
            operator_chat: None,
        }
    }

    /// Forward client-originated messages to this chat with a reply button
    pub fn with_operator_chat(mut self, chat: Option<ChatId>) -> Self {
        self.operator_chat = chat;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn stats(&self) -> RouterStats {
        RouterStats {
            connected_clients: self.registry.len(),
            queued_messages: self.mailbox.total_pending(),
            pending_replies: self.tracker.len(),
        }
    }

    // ── Client lifecycle ──

    /// A client finished its handshake. Queued replies are written to the
    /// new connection before it becomes reachable for live delivery.
    pub fn connect(&self, client_id: ClientId, tx: FrameSender) -> Connection {
        let conn = Connection::new(client_id.clone(), tx);
        let mut flushed = 0;

        let superseded = self.registry.register(conn.clone(), |c| {
            flushed = self.mailbox.drain_and_deliver(&client_id, c);
        });

        info!(
            "Client {} connected (flushed {} queued, replaced existing: {})",
            client_id,
            flushed,
            superseded.is_some()
        );
        conn
    }

    /// The transport for `conn` closed. Returns false when a newer
    /// connection for the same client has already taken its place.
    pub fn disconnect(&self, conn: &Connection) -> bool {
        let removed = self.registry.deregister(conn);
        info!(
            "Client {} disconnected{}",
            conn.client_id(),
            if removed { "" } else { " (superseded, entry kept)" }
        );
        removed
    }

    /// Text a client sent over its socket
    pub async fn client_message(&self, conn: &Connection, text: &str) -> Option<NotifyOutcome> {
        info!("Message from {}: {}", conn.client_id(), text);

        let chat = self.operator_chat?;
        let body = format!("Message from client {}:\n{}", conn.client_id(), text);
        let result = self
            .notifier
            .send_reply_prompt(chat, &body, conn.client_id())
            .await;
        Some(NotifyOutcome::from_result(chat, result))
    }

    // ── Operator events ──

    pub async fn handle(&self, event: InboundEvent) -> Result<RouteOutcome> {
        match event {
            InboundEvent::Selection {
                operator,
                chat,
                client_id,
            } => Ok(self.select(operator, chat, client_id).await),
            InboundEvent::FreeText {
                operator,
                chat,
                text,
            } => self.reply(operator, chat, &text).await,
        }
    }

    async fn select(&self, operator: OperatorId, chat: ChatId, client_id: ClientId) -> RouteOutcome {
        info!("Operator {} selected client {}", operator, client_id);
        if let Some(previous) = self.tracker.set_pending(operator, client_id.clone()) {
            debug!("Operator {} dropped pending reply to {}", operator, previous);
        }

        let prompt = format!("Type your message for client {}:", client_id);
        let notify = self.notify(chat, &prompt).await;
        RouteOutcome::Prompted { client_id, notify }
    }

    async fn reply(&self, operator: OperatorId, chat: ChatId, text: &str) -> Result<RouteOutcome> {
        let Some((client_id, payload)) = self.resolve_target(operator, text) else {
            debug!("Operator {} sent text with no reply target, ignoring", operator);
            return Ok(RouteOutcome::Ignored);
        };

        let message = format!("{}{}", OPERATOR_PREFIX, payload);
        let delivery = self
            .registry
            .deliver_or_else(&client_id, message, |m| self.mailbox.enqueue(&client_id, m))?;

        match delivery {
            Delivery::Live => {
                info!("Reply from operator {} delivered to {}", operator, client_id);
                let ack = format!("Reply sent to user {} ✔️", client_id);
                let notify = self.notify(chat, &ack).await;
                Ok(RouteOutcome::Delivered { client_id, notify })
            }
            Delivery::Absent => {
                info!(
                    "Client {} offline, queued reply from operator {} ({} pending)",
                    client_id,
                    operator,
                    self.mailbox.pending(&client_id)
                );
                let ack = format!(
                    "User {} is offline. The reply will be delivered when they reconnect. 📬",
                    client_id
                );
                let notify = self.notify(chat, &ack).await;
                Ok(RouteOutcome::Queued { client_id, notify })
            }
        }
    }

    /// Pending selection first, then the inline `client_id: text` form
    fn resolve_target(&self, operator: OperatorId, text: &str) -> Option<(ClientId, String)> {
        if let Some(client_id) = self.tracker.take_pending(operator) {
            return Some((client_id, text.trim().to_string()));
        }
        parse_inline(text)
    }

    async fn notify(&self, chat: ChatId, text: &str) -> NotifyOutcome {
        let result = self.notifier.send_message(chat, text).await;
        NotifyOutcome::from_result(chat, result)
    }
}

/// Split `"abc123: hi there"` on the first colon into target and payload.
/// Only text without a colon has no target; `": hi"` targets the empty id.
pub fn parse_inline(text: &str) -> Option<(ClientId, String)> {
    let (raw_id, raw_text) = text.split_once(':')?;
    Some((ClientId::new(raw_id.trim()), raw_text.trim().to_string()))
}
