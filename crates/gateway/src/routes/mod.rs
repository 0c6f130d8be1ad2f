//! Route handlers for the gateway.

pub mod admin;
pub mod health;
pub mod webhook;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the router. Admin routes exist only when a token is configured.
pub fn router(admin_enabled: bool) -> Router<AppState> {
    let router = Router::new()
        .route("/health", get(health::health))
        .route(
            "/webhook/whatsapp/:bot_id",
            get(webhook::verify_whatsapp).post(webhook::receive_whatsapp),
        )
        .route("/webhook/telegram/:bot_id", post(webhook::receive_telegram));

    if !admin_enabled {
        return router;
    }

    router
        .route("/admin/messages/:id/retag", post(admin::retag_message))
        .route("/admin/bots/:id/retag", post(admin::retag_bot))
        .route("/admin/bots/:id/gaps", get(admin::content_gaps))
}
