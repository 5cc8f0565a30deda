use axum::{
    Extension, Json,
    extract::{Path, State},
    http::HeaderMap,
};
use serde_json::{Value, json};

use threadline_types::LogPayload;
use threadline_types::actions::UpdateType;
use threadline_types::api::SavedItems;

use crate::comment_tree::comment_node;
use crate::error::ApiError;
use crate::middleware::current_user;
use crate::posts::post_response;
use crate::session::SessionId;
use crate::state::{AppState, run_blocking};

fn log_save(state: &AppState, session: &SessionId, table: &str, update_type: UpdateType, values: Value, text: String) {
    state
        .logger
        .record(session.as_str(), LogPayload::db_update(table, update_type, text, values));
}

pub async fn save_post(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Path(post_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let user = current_user(&state, &headers)?;
    state.db.get_post(post_id)?.ok_or(ApiError::NotFound("Post"))?;

    let saved = state.db.save_post(&user.id, post_id)?;
    if saved {
        log_save(
            &state,
            &session,
            "saved_posts",
            UpdateType::Insert,
            json!({ "user_id": user.id, "post_id": post_id }),
            format!("User {} saved post {}", user.username, post_id),
        );
    }

    Ok(Json(json!({ "saved": true, "changed": saved })))
}

pub async fn unsave_post(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Path(post_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let user = current_user(&state, &headers)?;

    if !state.db.unsave_post(&user.id, post_id)? {
        return Err(ApiError::NotFound("Saved post"));
    }
    log_save(
        &state,
        &session,
        "saved_posts",
        UpdateType::Delete,
        json!({ "user_id": user.id, "post_id": post_id }),
        format!("User {} unsaved post {}", user.username, post_id),
    );

    Ok(Json(json!({ "saved": false })))
}

pub async fn save_comment(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Path(comment_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let user = current_user(&state, &headers)?;
    state.db.get_comment(comment_id)?.ok_or(ApiError::NotFound("Comment"))?;

    let saved = state.db.save_comment(&user.id, comment_id)?;
    if saved {
        log_save(
            &state,
            &session,
            "saved_comments",
            UpdateType::Insert,
            json!({ "user_id": user.id, "comment_id": comment_id }),
            format!("User {} saved comment {}", user.username, comment_id),
        );
    }

    Ok(Json(json!({ "saved": true, "changed": saved })))
}

pub async fn unsave_comment(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Path(comment_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let user = current_user(&state, &headers)?;

    if !state.db.unsave_comment(&user.id, comment_id)? {
        return Err(ApiError::NotFound("Saved comment"));
    }
    log_save(
        &state,
        &session,
        "saved_comments",
        UpdateType::Delete,
        json!({ "user_id": user.id, "comment_id": comment_id }),
        format!("User {} unsaved comment {}", user.username, comment_id),
    );

    Ok(Json(json!({ "saved": false })))
}

/// The caller's saved posts and comments, newest save first.
pub async fn list_saved(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SavedItems>, ApiError> {
    let user = current_user(&state, &headers)?;

    let db = state.db.clone();
    let items = run_blocking(move || {
        let posts = db.saved_posts(&user.id)?;
        let comments = db.saved_comments(&user.id)?;
        let ids: Vec<i64> = comments.iter().map(|c| c.id).collect();
        let totals = db.comment_vote_totals(&ids)?;

        Ok(SavedItems {
            posts: posts.into_iter().map(post_response).collect(),
            comments: comments
                .iter()
                .map(|c| comment_node(c, totals.get(&c.id).copied().unwrap_or(0)))
                .collect(),
        })
    })
    .await?;

    Ok(Json(items))
}
