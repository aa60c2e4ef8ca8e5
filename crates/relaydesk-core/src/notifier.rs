//! Outbound seam to the operators' chat platform

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use crate::types::{ChatId, ClientId};

/// Sends text into an operator chat
#[async_trait]
pub trait OperatorNotifier: Send + Sync {
    /// Plain message to an operator chat
    async fn send_message(&self, chat: ChatId, text: &str) -> Result<()>;

    /// Message carrying a "Reply" control that, when pressed, selects
    /// `client_id` as the operator's next reply target
    async fn send_reply_prompt(&self, chat: ChatId, text: &str, client_id: &ClientId)
    -> Result<()>;
}

/// Result of an acknowledgement call. Failures are logged and kept here
/// instead of being propagated; routing state is already settled by then.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent,
    Failed(String),
}

impl NotifyOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, NotifyOutcome::Sent)
    }

    pub(crate) fn from_result(chat: ChatId, result: Result<()>) -> Self {
        match result {
            Ok(()) => NotifyOutcome::Sent,
            Err(e) => {
                warn!("Failed to notify operator chat {}: {:#}", chat, e);
                NotifyOutcome::Failed(format!("{:#}", e))
            }
        }
    }
}
