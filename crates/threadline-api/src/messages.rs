use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use serde_json::json;

use threadline_db::models::MessageRow;
use threadline_types::LogPayload;
use threadline_types::actions::UpdateType;
use threadline_types::api::{MessageResponse, SendMessageRequest};

use crate::error::ApiError;
use crate::middleware::current_user;
use crate::session::SessionId;
use crate::state::{AppState, run_blocking};

#[derive(Debug, Deserialize)]
pub struct ThreadQuery {
    pub user1: String,
    pub user2: String,
}

fn message_response(row: MessageRow) -> MessageResponse {
    MessageResponse {
        id: row.id,
        sender_id: row.sender_id,
        receiver_id: row.receiver_id,
        content: row.content,
        timestamp: row.timestamp,
    }
}

fn responses(rows: Vec<MessageRow>) -> Json<Vec<MessageResponse>> {
    Json(rows.into_iter().map(message_response).collect())
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    WithRejection(Json(req), _): WithRejection<Json<SendMessageRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    if req.content.is_empty() {
        return Err(ApiError::Validation("Message content is required".into()));
    }

    let db = state.db.clone();
    let message = run_blocking(move || {
        if db.get_user_by_id(&req.sender_id)?.is_none() {
            return Err(ApiError::NotFound("Sender"));
        }
        if db.get_user_by_id(&req.receiver_id)?.is_none() {
            return Err(ApiError::NotFound("Receiver"));
        }
        Ok(db.insert_message(&req.sender_id, &req.receiver_id, &req.content)?)
    })
    .await?;

    state.logger.record(
        session.as_str(),
        LogPayload::db_update(
            "messages",
            UpdateType::Insert,
            format!(
                "Message {} sent from {} to {}, content {}",
                message.id, message.sender_id, message.receiver_id, message.content
            ),
            json!({
                "id": message.id,
                "sender_id": message.sender_id,
                "receiver_id": message.receiver_id,
                "content": message.content,
                "timestamp": message.timestamp,
            }),
        ),
    );

    Ok((StatusCode::CREATED, Json(message_response(message))))
}

/// Everything the caller sent or received.
pub async fn inbox(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<MessageResponse>>, ApiError> {
    let user = current_user(&state, &headers)?;
    Ok(responses(state.db.messages_for_user(&user.id)?))
}

pub async fn conversation_with(
    State(state): State<AppState>,
    Path(other_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<MessageResponse>>, ApiError> {
    let user = current_user(&state, &headers)?;
    Ok(responses(state.db.conversation(&user.id, &other_id)?))
}

/// Messages between two users in either direction, oldest first.
pub async fn thread(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<ThreadQuery>, ApiError>,
) -> Result<Json<Vec<MessageResponse>>, ApiError> {
    Ok(responses(state.db.conversation(&query.user1, &query.user2)?))
}
