//! Administrative endpoints, behind a bearer token.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use database::{bot, content, TagMerge};
use journey_engine::{tagging, RetagReport};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{GatewayError, Result};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RetagParams {
    /// Run the statistical pass again instead of reusing the stored result.
    #[serde(default)]
    pub reclassify: bool,
}

#[derive(Debug, Serialize)]
pub struct ContentGaps {
    pub bot_id: i64,
    pub journey_length_days: i64,
    pub missing_days: Vec<i64>,
}

/// Check the `Authorization: Bearer` header against the admin token.
pub fn authorize(expected: Option<&str>, headers: &HeaderMap) -> Result<()> {
    let Some(expected) = expected else {
        return Err(GatewayError::Unauthorized);
    };

    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v));

    match token {
        Some(token) if token == expected => Ok(()),
        _ => Err(GatewayError::Unauthorized),
    }
}

/// `POST /admin/messages/:id/retag`
pub async fn retag_message(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<RetagParams>,
    headers: HeaderMap,
) -> Result<Json<TagMerge>> {
    authorize(state.admin_token.as_deref(), &headers)?;

    let engine = &state.engine;
    let merge = tagging::retag_message(
        engine.pool(),
        engine.classifier(),
        engine.config().collaborator_timeout,
        id,
        params.reclassify,
        Utc::now(),
    )
    .await?;

    info!("Re-tagged message {}: {:?}", id, merge.tags);
    Ok(Json(merge))
}

/// `POST /admin/bots/:id/retag`
pub async fn retag_bot(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<RetagParams>,
    headers: HeaderMap,
) -> Result<Json<RetagReport>> {
    authorize(state.admin_token.as_deref(), &headers)?;

    let engine = &state.engine;
    let report = tagging::retag_bot(
        engine.pool(),
        engine.classifier(),
        engine.config().collaborator_timeout,
        id,
        params.reclassify,
        Utc::now(),
    )
    .await?;

    Ok(Json(report))
}

/// `GET /admin/bots/:id/gaps` - days with no active content.
pub async fn content_gaps(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<ContentGaps>> {
    authorize(state.admin_token.as_deref(), &headers)?;

    let found = bot::get_bot(state.db.pool(), id).await?;
    let missing_days = content::missing_days(state.db.pool(), found.id, found.journey_length_days).await?;

    Ok(Json(ContentGaps {
        bot_id: found.id,
        journey_length_days: found.journey_length_days,
        missing_days,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_authorize() {
        assert!(authorize(Some("secret"), &headers("Bearer secret")).is_ok());
        assert!(authorize(Some("secret"), &headers("Bearer wrong")).is_err());
        assert!(authorize(Some("secret"), &HeaderMap::new()).is_err());
        assert!(authorize(None, &headers("Bearer secret")).is_err());
    }
}
