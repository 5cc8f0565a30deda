use axum::{
    Extension, Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use serde_json::json;
use tracing::info;

use threadline_types::LogPayload;
use threadline_types::actions::UpdateType;
use threadline_types::api::{Credentials, LoginResponse, RegisterResponse, UserSummary};

use crate::error::ApiError;
use crate::middleware::current_user;
use crate::session::SessionId;
use crate::state::{AppState, run_blocking};

pub async fn register(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    WithRejection(Json(req), _): WithRejection<Json<Credentials>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation("Username and password are required".into()));
    }

    let user = state
        .db
        .create_user(&req.username, &req.password)?
        .ok_or_else(|| ApiError::Conflict("Username already exists".into()))?;

    info!("Registered user {} ({})", user.username, user.id);

    state.logger.record(
        session.as_str(),
        LogPayload::db_update(
            "users",
            UpdateType::Insert,
            format!(
                "User {} created in database with id {}, username {}, password {}",
                user.username, user.id, user.username, user.password
            ),
            json!({
                "id": user.id,
                "username": user.username,
                "password": user.password,
                "created_at": user.created_at,
                "updated_at": user.updated_at,
            }),
        ),
    );

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.id,
            username: user.username,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    WithRejection(Json(req), _): WithRejection<Json<Credentials>, ApiError>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = state
        .db
        .find_user_by_credentials(&req.username, &req.password)?
        .ok_or_else(|| ApiError::Unauthenticated("Invalid credentials".into()))?;

    state.logger.record(
        session.as_str(),
        LogPayload::custom(
            "login",
            format!("User {} logged in", user.username),
            json!({ "userId": user.id }),
        ),
    );

    Ok(Json(LoginResponse { user_id: user.id }))
}

/// Every user with the ids of their posts and notes.
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let db = state.db.clone();
    let users = run_blocking(move || {
        let mut summaries = Vec::new();
        for user in db.list_users()? {
            summaries.push(UserSummary {
                posts: db.post_ids_by_author(&user.id)?,
                notes: db.note_ids_by_owner(&user.id)?,
                id: user.id,
                username: user.username,
                password: user.password,
                created_at: user.created_at,
                updated_at: user.updated_at,
            });
        }
        Ok(summaries)
    })
    .await?;

    Ok(Json(users))
}

/// Only the user themself may delete their account. Posts, votes, saved
/// items and messages go with it; notes and comments stay behind.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let caller = current_user(&state, &headers)?;
    if caller.id != user_id {
        return Err(ApiError::Forbidden("Cannot delete another user".into()));
    }

    let db = state.db.clone();
    let id = user_id.clone();
    if !run_blocking(move || Ok(db.delete_user(&id)?)).await? {
        return Err(ApiError::NotFound("User"));
    }

    info!("Deleted user {} ({})", caller.username, caller.id);

    state.logger.record(
        session.as_str(),
        LogPayload::db_update(
            "users",
            UpdateType::Delete,
            format!("User {} deleted from database with id {}", caller.username, caller.id),
            json!({ "userId": caller.id }),
        ),
    );

    Ok(Json(json!({ "status": "deleted" })))
}
