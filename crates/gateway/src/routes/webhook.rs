//! Platform webhooks.
//!
//! POST handlers acknowledge with 200 as soon as the payload is normalized
//! and screened; all processing happens on background tasks. Malformed or
//! unroutable payloads are logged and acknowledged too, so platforms do
//! not redeliver them.

use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use database::{bot, DatabaseError};
use journey_engine::{normalize_telegram, normalize_whatsapp};
use platform_client::types::{Update, WebhookPayload};
use platform_client::{BotCredentials, TelegramClient, WhatsAppClient};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{GatewayError, Result};
use crate::state::AppState;

/// Header Telegram echoes the configured secret token in.
const TELEGRAM_SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// WhatsApp subscription handshake parameters.
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode", default)]
    pub mode: String,
    #[serde(rename = "hub.verify_token", default)]
    pub verify_token: String,
    #[serde(rename = "hub.challenge", default)]
    pub challenge: String,
}

async fn bot_credentials(state: &AppState, bot_id: i64) -> Result<BotCredentials> {
    let found = match bot::get_bot(state.db.pool(), bot_id).await {
        Ok(b) => b,
        Err(DatabaseError::NotFound { .. }) => return Err(GatewayError::NotFound(format!("bot {}", bot_id))),
        Err(e) => return Err(e.into()),
    };
    Ok(BotCredentials::from_value(&found.credentials)?)
}

/// `GET /webhook/whatsapp/:bot_id` - echo the challenge for a valid token.
pub async fn verify_whatsapp(
    State(state): State<AppState>,
    Path(bot_id): Path<i64>,
    Query(params): Query<VerifyParams>,
) -> Result<String> {
    let creds = bot_credentials(&state, bot_id).await?;
    let challenge = WhatsAppClient::verify_webhook(
        creds.whatsapp()?,
        &params.mode,
        &params.verify_token,
        &params.challenge,
    )
    .map_err(|_| {
        warn!(bot_id, "WhatsApp webhook verification failed");
        GatewayError::Forbidden
    })?;

    Ok(challenge)
}

/// `POST /webhook/whatsapp/:bot_id`
pub async fn receive_whatsapp(
    State(state): State<AppState>,
    Path(bot_id): Path<i64>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> StatusCode {
    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            warn!(bot_id, "Unreadable WhatsApp payload: {}", e);
            return StatusCode::OK;
        }
    };

    let source_ip = peer.ip().to_string();
    let events = normalize_whatsapp(
        bot_id,
        &payload,
        Some(&source_ip),
        state.engine.config().default_country_code.as_deref(),
    );
    debug!(bot_id, "WhatsApp webhook with {} events", events.len());

    for event in events {
        state.engine.dispatch(event).await;
    }

    StatusCode::OK
}

/// `POST /webhook/telegram/:bot_id`
pub async fn receive_telegram(
    State(state): State<AppState>,
    Path(bot_id): Path<i64>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode> {
    let creds = match bot_credentials(&state, bot_id).await {
        Ok(c) => c,
        Err(GatewayError::NotFound(_)) => {
            warn!(bot_id, "Telegram webhook for unknown bot");
            return Ok(StatusCode::OK);
        }
        Err(e) => return Err(e),
    };
    let telegram = creds.telegram()?.clone();

    let header = headers
        .get(TELEGRAM_SECRET_HEADER)
        .and_then(|v| v.to_str().ok());
    if TelegramClient::verify_secret(&telegram, header).is_err() {
        warn!(bot_id, "Telegram secret token mismatch");
        return Err(GatewayError::Forbidden);
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(u) => u,
        Err(e) => {
            warn!(bot_id, "Unreadable Telegram update: {}", e);
            return Ok(StatusCode::OK);
        }
    };

    if let Some(callback) = &update.callback_query {
        let platforms = state.platforms.clone();
        let callback_id = callback.id.clone();
        tokio::spawn(async move {
            if let Err(e) = platforms.telegram().answer_callback(&telegram, &callback_id).await {
                debug!("Failed to answer callback {}: {}", callback_id, e);
            }
        });
    }

    let source_ip = peer.ip().to_string();
    state
        .engine
        .dispatch(normalize_telegram(bot_id, &update, Some(&source_ip)))
        .await;

    Ok(StatusCode::OK)
}
