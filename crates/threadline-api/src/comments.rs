use axum::{
    Extension, Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use serde_json::json;

use threadline_db::models::CommentRow;
use threadline_types::LogPayload;
use threadline_types::actions::UpdateType;
use threadline_types::api::{CommentNode, CreateCommentRequest, UpdateCommentRequest};

use crate::comment_tree::{build_comment_tree, comment_node};
use crate::error::ApiError;
use crate::middleware::current_user;
use crate::session::SessionId;
use crate::state::{AppState, run_blocking};

/// The reply forest of a post with live vote totals.
pub async fn get_post_comments(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<Json<Vec<CommentNode>>, ApiError> {
    let db = state.db.clone();
    let tree = run_blocking(move || {
        if db.get_post(post_id)?.is_none() {
            return Err(ApiError::NotFound("Post"));
        }
        let comments = db.comments_for_post(post_id)?;
        let totals = db.comment_vote_totals_for_post(post_id)?;
        Ok(build_comment_tree(&comments, |id| totals.get(&id).copied().unwrap_or(0)))
    })
    .await?;

    Ok(Json(tree))
}

pub async fn create_comment(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    WithRejection(Json(req), _): WithRejection<Json<CreateCommentRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    if req.content.trim().is_empty() {
        return Err(ApiError::Validation("Comment content is required".into()));
    }

    let db = state.db.clone();
    let comment = run_blocking(move || {
        if db.get_user_by_id(&req.author_id)?.is_none() {
            return Err(ApiError::NotFound("User"));
        }
        if db.get_post(req.post_id)?.is_none() {
            return Err(ApiError::NotFound("Post"));
        }
        if let Some(parent_id) = req.parent_id {
            let parent = db.get_comment(parent_id)?.ok_or(ApiError::NotFound("Parent comment"))?;
            if parent.post_id != req.post_id {
                return Err(ApiError::Validation("Parent comment belongs to a different post".into()));
            }
        }
        Ok(db.create_comment(req.post_id, &req.author_id, req.parent_id, &req.content)?)
    })
    .await?;

    state.logger.record(
        session.as_str(),
        LogPayload::db_update(
            "comments",
            UpdateType::Insert,
            format!(
                "Comment created in database with id {} on post {}, content {}",
                comment.id, comment.post_id, comment.content
            ),
            comment_values(&comment),
        ),
    );

    Ok((StatusCode::CREATED, Json(comment_node(&comment, 0))))
}

/// One comment. `children` is always empty here; use the post listing for
/// the subtree.
pub async fn get_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<i64>,
) -> Result<Json<CommentNode>, ApiError> {
    let comment = state.db.get_comment(comment_id)?.ok_or(ApiError::NotFound("Comment"))?;
    let votes = state.db.comment_vote_total(comment_id)?;
    Ok(Json(comment_node(&comment, votes)))
}

fn owned_comment(state: &AppState, comment_id: i64, user_id: &str) -> Result<CommentRow, ApiError> {
    let comment = state.db.get_comment(comment_id)?.ok_or(ApiError::NotFound("Comment"))?;
    if comment.author_id != user_id {
        return Err(ApiError::Forbidden("Not the author of this comment".into()));
    }
    Ok(comment)
}

pub async fn update_comment(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Path(comment_id): Path<i64>,
    headers: HeaderMap,
    WithRejection(Json(req), _): WithRejection<Json<UpdateCommentRequest>, ApiError>,
) -> Result<Json<CommentNode>, ApiError> {
    let user = current_user(&state, &headers)?;
    owned_comment(&state, comment_id, &user.id)?;

    let comment = state
        .db
        .update_comment(comment_id, &req.content)?
        .ok_or(ApiError::NotFound("Comment"))?;
    let votes = state.db.comment_vote_total(comment_id)?;

    state.logger.record(
        session.as_str(),
        LogPayload::db_update(
            "comments",
            UpdateType::Update,
            format!("Comment {} updated in database, content {}", comment.id, comment.content),
            comment_values(&comment),
        ),
    );

    Ok(Json(comment_node(&comment, votes)))
}

/// Replies go with their parent.
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Path(comment_id): Path<i64>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&state, &headers)?;
    owned_comment(&state, comment_id, &user.id)?;

    let comment = state
        .db
        .delete_comment(comment_id)?
        .ok_or(ApiError::NotFound("Comment"))?;

    state.logger.record(
        session.as_str(),
        LogPayload::db_update(
            "comments",
            UpdateType::Delete,
            format!("Comment {} deleted from database on post {}", comment.id, comment.post_id),
            json!({ "commentId": comment.id }),
        ),
    );

    Ok(Json(json!({ "status": "deleted" })))
}

/// A user's comments, newest first, flat.
pub async fn comments_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<CommentNode>>, ApiError> {
    let db = state.db.clone();
    let nodes = run_blocking(move || {
        let comments = db.comments_by_author(&user_id)?;
        let ids: Vec<i64> = comments.iter().map(|c| c.id).collect();
        let totals = db.comment_vote_totals(&ids)?;
        Ok(comments
            .iter()
            .map(|c| comment_node(c, totals.get(&c.id).copied().unwrap_or(0)))
            .collect::<Vec<_>>())
    })
    .await?;

    Ok(Json(nodes))
}

fn comment_values(comment: &CommentRow) -> serde_json::Value {
    json!({
        "id": comment.id,
        "content": comment.content,
        "post_id": comment.post_id,
        "author_id": comment.author_id,
        "parent_id": comment.parent_id,
        "created_at": comment.created_at,
    })
}
