//! Telegram Bot API client used for operator acknowledgements

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use relaydesk_core::config::TelegramConfig;
use relaydesk_core::{ChatId, ClientId, OperatorNotifier};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Telegram rejects callback data longer than this
const MAX_CALLBACK_DATA_LEN: usize = 64;

const REPLY_BUTTON_LABEL: &str = "Reply";

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
struct InlineKeyboardMarkup {
    inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Serialize)]
struct InlineKeyboardButton {
    text: String,
    callback_data: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sends messages through `{api_base}/bot{token}/sendMessage`
#[derive(Clone)]
pub struct TelegramNotifier {
    http: Client,
    api_base: String,
    token: String,
}

impl TelegramNotifier {
    pub fn new(api_base: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub fn from_config(config: &TelegramConfig) -> Result<Self> {
        Self::new(&config.api_base, &config.bot_token)
    }

    async fn post_message(&self, request: &SendMessageRequest<'_>) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.token);
        debug!("Telegram sendMessage to chat {}", request.chat_id);

        // reqwest errors embed the URL, which carries the bot token
        let resp = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| e.without_url())
            .context("Telegram sendMessage request failed")?;

        let status = resp.status();
        let body: Option<ApiResponse> = resp.json().await.ok();

        match body {
            Some(ApiResponse { ok: true, .. }) if status.is_success() => Ok(()),
            Some(ApiResponse { description, .. }) => Err(anyhow!(
                "Telegram sendMessage failed: HTTP {} — {}",
                status,
                description.unwrap_or_else(|| "no description".to_string())
            )),
            None => Err(anyhow!(
                "Telegram sendMessage failed: HTTP {} with unreadable body",
                status
            )),
        }
    }
}

#[async_trait]
impl OperatorNotifier for TelegramNotifier {
    async fn send_message(&self, chat: ChatId, text: &str) -> Result<()> {
        self.post_message(&SendMessageRequest {
            chat_id: chat.0,
            text,
            reply_markup: None,
        })
        .await
    }

    async fn send_reply_prompt(&self, chat: ChatId, text: &str, client_id: &ClientId) -> Result<()> {
        let reply_markup = if client_id.as_str().len() <= MAX_CALLBACK_DATA_LEN {
            Some(InlineKeyboardMarkup {
                inline_keyboard: vec![vec![InlineKeyboardButton {
                    text: REPLY_BUTTON_LABEL.to_string(),
                    callback_data: client_id.to_string(),
                }]],
            })
        } else {
            warn!(
                "Client id {} too long for a reply button, operator must use the inline form",
                client_id
            );
            None
        };

        self.post_message(&SendMessageRequest {
            chat_id: chat.0,
            text,
            reply_markup,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Vec<Value>>>;

    /// Fake Bot API answering `ok` unless the chat id is negative
    async fn spawn_fake_api() -> (String, Captured) {
        let captured: Captured = Arc::new(Mutex::new(Vec::new()));

        async fn send_message(
            State(captured): State<Captured>,
            Json(body): Json<Value>,
        ) -> (StatusCode, Json<Value>) {
            let chat_id = body["chat_id"].as_i64().unwrap_or_default();
            captured.lock().unwrap().push(body);
            if chat_id < 0 {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"ok": false, "description": "Bad Request: chat not found"})),
                )
            } else {
                (StatusCode::OK, Json(json!({"ok": true, "result": {}})))
            }
        }

        let app = Router::new()
            .route("/bottest-token/sendMessage", post(send_message))
            .with_state(captured.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), captured)
    }

    #[tokio::test]
    async fn test_send_message() {
        let (base, captured) = spawn_fake_api().await;
        let notifier = TelegramNotifier::new(base, "test-token").unwrap();

        notifier.send_message(ChatId(7), "hello").await.unwrap();

        let bodies = captured.lock().unwrap().clone();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["chat_id"], 7);
        assert_eq!(bodies[0]["text"], "hello");
        assert!(bodies[0].get("reply_markup").is_none());
    }

    #[tokio::test]
    async fn test_reply_prompt_has_button() {
        let (base, captured) = spawn_fake_api().await;
        let notifier = TelegramNotifier::new(format!("{}/", base), "test-token").unwrap();

        notifier
            .send_reply_prompt(ChatId(7), "Message from client u1", &ClientId::from("u1"))
            .await
            .unwrap();

        let bodies = captured.lock().unwrap().clone();
        let button = &bodies[0]["reply_markup"]["inline_keyboard"][0][0];
        assert_eq!(button["text"], "Reply");
        assert_eq!(button["callback_data"], "u1");
    }

    #[tokio::test]
    async fn test_long_client_id_sends_without_button() {
        let (base, captured) = spawn_fake_api().await;
        let notifier = TelegramNotifier::new(base, "test-token").unwrap();
        let long_id = ClientId::new("x".repeat(MAX_CALLBACK_DATA_LEN + 1));

        notifier
            .send_reply_prompt(ChatId(7), "hi", &long_id)
            .await
            .unwrap();
        assert!(captured.lock().unwrap()[0].get("reply_markup").is_none());
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let (base, _captured) = spawn_fake_api().await;
        let notifier = TelegramNotifier::new(base, "test-token").unwrap();

        let err = notifier.send_message(ChatId(-1), "hello").await.unwrap_err();
        assert!(err.to_string().contains("chat not found"));
    }

    #[tokio::test]
    async fn test_unreachable_api_hides_token() {
        let notifier = TelegramNotifier::new("http://127.0.0.1:1", "secret-token").unwrap();
        let err = notifier.send_message(ChatId(1), "hello").await.unwrap_err();
        assert!(!format!("{:#}", err).contains("secret-token"));
    }
}
