//! JSON API handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::responses::StatusEnvelope;
use super::AppState;
use crate::models::{ResolvedStatus, API_EPOCH};

#[derive(Debug, Default, Deserialize)]
pub struct MockParams {
    pub mock: Option<String>,
}

fn status_code_for(status: &ResolvedStatus) -> StatusCode {
    if status.is_empty() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

/// Cached resolution of the current and past stream
pub async fn stream_info(State(state): State<AppState>, Query(params): Query<MockParams>) -> Response {
    if let Some(fixture) = state.resolver.mock_fixture(params.mock.as_deref()) {
        let code = status_code_for(&fixture);
        let envelope = if fixture.is_empty() {
            StatusEnvelope::failed()
        } else {
            StatusEnvelope::ok(fixture)
        };
        return envelope.into_response_with(code, false);
    }

    let resolved = state.resolver.resolve_at(Utc::now()).await;
    if resolved.is_empty() {
        debug!("All sources came up empty");
        return StatusEnvelope::<ResolvedStatus>::failed()
            .into_response_with(StatusCode::SERVICE_UNAVAILABLE, true);
    }
    StatusEnvelope::ok(resolved).into_response_with(StatusCode::OK, true)
}

/// Most recent completed stream on its own
pub async fn past_stream(State(state): State<AppState>) -> Response {
    match state.resolver.past_stream().await {
        Ok(past) => StatusEnvelope::ok_or_null(past).into_response_with(StatusCode::OK, true),
        Err(e) => {
            warn!("paststream poll returned error: {}", e);
            StatusEnvelope::<()>::failed().into_response_with(StatusCode::OK, false)
        }
    }
}

/// Uncached poll of the live page and past stream
pub async fn legacy_stream_info(
    State(state): State<AppState>,
    Query(params): Query<MockParams>,
) -> Response {
    if let Some(fixture) = state.resolver.mock_fixture(params.mock.as_deref()) {
        let envelope = StatusEnvelope {
            error: fixture.is_empty(),
            result: Some(fixture),
            server_version: API_EPOCH,
        };
        return envelope.into_response_with(StatusCode::OK, false);
    }

    let poll = state.resolver.poll_direct().await;

    let live_failed = poll.live.is_err();
    let live_stream = match poll.live {
        Ok(outcome) => outcome.into_descriptor(),
        Err(e) => {
            warn!("livestream poll returned error: {}", e);
            None
        }
    };

    let past_failed = poll.past.is_err();
    let past_stream = match poll.past {
        Ok(past) => past,
        Err(e) => {
            warn!("paststream poll returned error: {}", e);
            None
        }
    };

    let envelope = StatusEnvelope {
        error: live_failed && past_failed,
        result: Some(ResolvedStatus {
            live_stream,
            past_stream,
        }),
        server_version: API_EPOCH,
    };
    envelope.into_response_with(StatusCode::OK, false)
}

/// Aggregation service view of the channel
pub async fn discovery(State(state): State<AppState>) -> Response {
    match state.resolver.discover(Utc::now()).await {
        Ok(found) => StatusEnvelope::ok_or_null(found).into_response_with(StatusCode::OK, false),
        Err(e) => {
            warn!("discovery poll returned error: {}", e);
            StatusEnvelope::<()>::failed().into_response_with(StatusCode::SERVICE_UNAVAILABLE, false)
        }
    }
}

/// Liveness plus a cache round trip
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let timestamp = Utc::now().to_rfc3339();
    match state.resolver.cache().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "cache": "ok",
                "timestamp": timestamp,
            })),
        ),
        Err(e) => {
            warn!("Health check cache ping failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "cache": e.to_string(),
                    "timestamp": timestamp,
                })),
            )
        }
    }
}
