//! Telegram webhook update — the subset the relay reads
//!
//! Only two shapes matter: an inline-button press (`callback_query`) whose
//! data is a client id, and a plain text `message`. Anything else, or
//! either shape with fields missing, decodes to no event.

use relaydesk_core::{ChatId, ClientId, InboundEvent, OperatorId};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

impl Update {
    /// Button presses take precedence over messages in the same update
    pub fn into_event(self) -> Option<InboundEvent> {
        if let Some(query) = self.callback_query {
            let chat = query.message?.chat.id;
            let data = query.data?;
            return Some(InboundEvent::Selection {
                operator: OperatorId(query.from.id),
                chat: ChatId(chat),
                client_id: ClientId::new(data),
            });
        }

        let message = self.message?;
        Some(InboundEvent::FreeText {
            operator: OperatorId(message.from?.id),
            chat: ChatId(message.chat.id),
            text: message.text?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(json: &str) -> Option<InboundEvent> {
        serde_json::from_str::<Update>(json).unwrap().into_event()
    }

    #[test]
    fn test_callback_query() {
        let json = r#"{
            "update_id": 1,
            "callback_query": {
                "id": "q1",
                "from": {"id": 42, "is_bot": false, "first_name": "Ann"},
                "message": {"message_id": 9, "chat": {"id": -100, "type": "group"}, "text": "Message from client u1"},
                "data": "u1"
            }
        }"#;
        assert_eq!(
            decode(json),
            Some(InboundEvent::Selection {
                operator: OperatorId(42),
                chat: ChatId(-100),
                client_id: ClientId::from("u1"),
            })
        );
    }

    #[test]
    fn test_text_message() {
        let json = r#"{
            "update_id": 2,
            "message": {
                "message_id": 10,
                "from": {"id": 42, "is_bot": false, "first_name": "Ann"},
                "chat": {"id": 42, "type": "private"},
                "date": 1700000000,
                "text": "u1: hello"
            }
        }"#;
        assert_eq!(
            decode(json),
            Some(InboundEvent::FreeText {
                operator: OperatorId(42),
                chat: ChatId(42),
                text: "u1: hello".to_string(),
            })
        );
    }

    #[test]
    fn test_message_without_text_is_ignored() {
        let json = r#"{"update_id": 3, "message": {"from": {"id": 1}, "chat": {"id": 1}, "sticker": {}}}"#;
        assert_eq!(decode(json), None);
    }

    #[test]
    fn test_callback_without_data_is_ignored() {
        let json = r#"{"update_id": 4, "callback_query": {"from": {"id": 1}, "message": {"chat": {"id": 1}}}}"#;
        assert_eq!(decode(json), None);
    }

    #[test]
    fn test_unrelated_update_is_ignored() {
        assert_eq!(decode(r#"{"update_id": 5, "edited_message": {}}"#), None);
    }
}
