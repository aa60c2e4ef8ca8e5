//! relaydesk-gateway — HTTP and WebSocket front door
//!
//! One listener serves the client WebSocket endpoint, the Telegram webhook
//! and a health endpoint, all backed by a shared [`relaydesk_core::Router`].

pub mod server;
pub mod webhook;
pub mod ws;

pub use server::{GatewayServer, app, app_with_keepalive};
pub use ws::Keepalive;
