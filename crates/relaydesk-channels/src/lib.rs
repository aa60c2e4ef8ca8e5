//! Bot platform adapters for relaydesk
//!
//! Decodes Telegram webhook updates into router events and sends operator
//! acknowledgements back through the Bot API.

pub mod telegram;
pub mod updates;

pub use telegram::TelegramNotifier;
pub use updates::Update;
