//! relaydesk-core — routing state for the operator relay
//!
//! Tracks which clients are connected, buffers operator replies for clients
//! that are away, and resolves which client an operator is answering.

pub mod config;
pub mod error;
pub mod mailbox;
pub mod notifier;
pub mod registry;
pub mod router;
pub mod tracker;
pub mod types;

pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use mailbox::Mailbox;
pub use notifier::{NotifyOutcome, OperatorNotifier};
pub use registry::Registry;
pub use router::{InboundEvent, RouteOutcome, Router};
pub use tracker::Tracker;
pub use types::{ChatId, ClientId, Connection, OPERATOR_PREFIX, OperatorId};
