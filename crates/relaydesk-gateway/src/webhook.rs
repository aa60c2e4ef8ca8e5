//! POST /telegram-webhook — operator events from the bot platform

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use relaydesk_channels::Update;
use relaydesk_core::Router;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};

/// Updates that do not fit the expected shape are acknowledged and dropped.
/// Only a routing failure answers 500; state changed before the failure
/// stays in place.
pub async fn telegram_webhook(
    State(router): State<Arc<Router>>,
    Json(body): Json<Value>,
) -> StatusCode {
    let update: Update = match serde_json::from_value(body) {
        Ok(u) => u,
        Err(e) => {
            debug!("Ignoring undecodable update: {}", e);
            return StatusCode::OK;
        }
    };

    let update_id = update.update_id;
    let Some(event) = update.into_event() else {
        debug!("Update {} carries nothing to route", update_id);
        return StatusCode::OK;
    };

    match router.handle(event).await {
        Ok(outcome) => {
            debug!("Update {} handled: {:?}", update_id, outcome);
            StatusCode::OK
        }
        Err(e) => {
            error!("Webhook update {} failed: {}", update_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
