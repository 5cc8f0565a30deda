//! Control plane of the synthetic environment: reset the store, issue
//! sessions, accept client-side events and read the log back.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Query, State},
    http::HeaderMap,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use threadline_types::ActionError;
use threadline_types::api::{LogEventRequest, LogRecord, ResetResponse, SessionResponse};

use crate::error::ApiError;
use crate::session::{SESSION_COOKIE, SESSION_QUERY, resolve_session_id, session_header};
use crate::state::{AppState, run_blocking};

#[derive(Debug, Deserialize)]
pub struct SeedQuery {
    pub seed: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub session_id: Option<String>,
}

/// Wipe and reseed the store, drop every log record and forget the current
/// session.
async fn reset_all(state: &AppState, seed: Option<&str>) -> Result<(), ApiError> {
    let seed = seed.filter(|s| !s.is_empty()).unwrap_or(&state.default_seed).to_string();

    let db = state.db.clone();
    let summary = run_blocking(move || Ok(db.reset(&seed)?)).await?;
    let cleared = state.logger.clear()?;
    state.sessions.clear();

    info!("Environment reset: {:?}, {} log records cleared", summary, cleared);
    Ok(())
}

pub async fn reset(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<SeedQuery>, ApiError>,
) -> Result<Json<ResetResponse>, ApiError> {
    reset_all(&state, query.seed.as_deref()).await?;
    Ok(Json(ResetResponse {
        status: "ok".into(),
        seed: query.seed,
    }))
}

/// Reset the environment and start a fresh session, returned in the body
/// and as a `session_id` cookie readable by page scripts.
pub async fn new_session(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<SeedQuery>, ApiError>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    reset_all(&state, query.seed.as_deref()).await?;
    let session_id = state.sessions.create();
    info!("New session {}", session_id);

    let cookie = Cookie::build((SESSION_COOKIE, session_id.clone()))
        .path("/")
        .http_only(false)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(1));

    Ok((jar.add(cookie), Json(SessionResponse { session_id })))
}

/// Record a client-side event. The session comes from the `session_id`
/// query parameter, then the `x-session-id` header, then the usual cookie
/// and current-session fallback.
pub async fn log_event(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<BTreeMap<String, String>>, ApiError>,
    headers: HeaderMap,
    WithRejection(Json(req), _): WithRejection<Json<LogEventRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = query
        .get(SESSION_QUERY)
        .filter(|s| !s.is_empty())
        .cloned()
        .or_else(|| session_header(&headers))
        .unwrap_or_else(|| resolve_session_id(&headers, &query, &state.sessions));

    let kind = req
        .action_type
        .ok_or_else(|| ActionError::UnknownKind("None".into()))?;

    let record = state.logger.log_event(&session_id, &kind, req.payload)?;

    Ok(Json(json!({ "status": "logged", "id": record.id })))
}

pub async fn get_logs(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<SessionQuery>, ApiError>,
) -> Result<Json<Vec<LogRecord>>, ApiError> {
    let session = query.session_id.as_deref().filter(|s| !s.is_empty());
    Ok(Json(state.logger.query(session)?))
}
