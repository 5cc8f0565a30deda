use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use serde_json::json;

use threadline_db::models::PostRow;
use threadline_types::LogPayload;
use threadline_types::actions::UpdateType;
use threadline_types::api::{CreatePostRequest, PostResponse, PostSort, UpdatePostRequest};

use crate::comment_tree::author_name;
use crate::error::ApiError;
use crate::middleware::current_user;
use crate::session::SessionId;
use crate::state::AppState;

const SEARCH_LIMIT: u32 = 10;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub sort: Option<String>,
    pub subreddit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

pub(crate) fn post_response(post: PostRow) -> PostResponse {
    PostResponse {
        id: post.id,
        title: post.title,
        content: post.content,
        votes: post.votes,
        subreddit: post.subreddit,
        author: author_name(post.author_username.as_deref()),
        user_id: post.author_id,
    }
}

fn post_values(post: &PostRow) -> serde_json::Value {
    json!({
        "id": post.id,
        "title": post.title,
        "content": post.content,
        "subreddit": post.subreddit,
        "votes": post.votes,
        "author_id": post.author_id,
    })
}

pub async fn list_posts(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, ApiError>,
) -> Result<Json<Vec<PostResponse>>, ApiError> {
    let subreddit = query.subreddit.as_deref().filter(|s| !s.is_empty());
    let posts = state.db.list_posts(PostSort::from_query(query.sort.as_deref()), subreddit)?;
    Ok(Json(posts.into_iter().map(post_response).collect()))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    WithRejection(Json(req), _): WithRejection<Json<CreatePostRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .get_user_by_id(&req.user_id)?
        .ok_or(ApiError::NotFound("User"))?;

    if req.title.trim().is_empty() {
        return Err(ApiError::Validation("Title is required".into()));
    }

    let post = state.db.create_post(&user.id, &req.title, &req.content, &req.subreddit)?;

    state.logger.record(
        session.as_str(),
        LogPayload::db_update(
            "posts",
            UpdateType::Insert,
            format!(
                "Post {} created in database with id {} in subreddit {} by {}",
                post.title, post.id, post.subreddit, user.username
            ),
            post_values(&post),
        ),
    );

    Ok((StatusCode::CREATED, Json(post_response(post))))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<Json<PostResponse>, ApiError> {
    let post = state.db.get_post(post_id)?.ok_or(ApiError::NotFound("Post"))?;
    Ok(Json(post_response(post)))
}

fn owned_post(state: &AppState, post_id: i64, user_id: &str) -> Result<PostRow, ApiError> {
    let post = state.db.get_post(post_id)?.ok_or(ApiError::NotFound("Post"))?;
    if post.author_id != user_id {
        return Err(ApiError::Forbidden("Not the author of this post".into()));
    }
    Ok(post)
}

pub async fn update_post(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Path(post_id): Path<i64>,
    headers: HeaderMap,
    WithRejection(Json(req), _): WithRejection<Json<UpdatePostRequest>, ApiError>,
) -> Result<Json<PostResponse>, ApiError> {
    let user = current_user(&state, &headers)?;
    owned_post(&state, post_id, &user.id)?;

    let post = state
        .db
        .update_post(post_id, &req.title, &req.content)?
        .ok_or(ApiError::NotFound("Post"))?;

    state.logger.record(
        session.as_str(),
        LogPayload::db_update(
            "posts",
            UpdateType::Update,
            format!(
                "Post {} updated in database with id {}, title {}, content {}",
                post.title, post.id, post.title, post.content
            ),
            post_values(&post),
        ),
    );

    Ok(Json(post_response(post)))
}

/// Removes the post together with its votes, comments and saves.
pub async fn delete_post(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Path(post_id): Path<i64>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&state, &headers)?;
    owned_post(&state, post_id, &user.id)?;

    let post = state.db.delete_post(post_id)?.ok_or(ApiError::NotFound("Post"))?;

    state.logger.record(
        session.as_str(),
        LogPayload::db_update(
            "posts",
            UpdateType::Delete,
            format!("Post {} deleted from database with id {}", post.title, post.id),
            json!({ "postId": post.id }),
        ),
    );

    Ok(Json(json!({ "status": "deleted" })))
}

/// Posts whose title contains `q`.
pub async fn search_posts(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<SearchQuery>, ApiError>,
) -> Result<Json<Vec<PostResponse>>, ApiError> {
    let posts = state.db.search_posts(&query.q, SEARCH_LIMIT)?;
    Ok(Json(posts.into_iter().map(post_response).collect()))
}
