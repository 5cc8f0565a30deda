use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::actions::LogPayload;

// -- Users --

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(rename = "userId")]
    pub user_id: String,
}

/// Debug listing. Exposes the stored password on purpose: the synthetic
/// environment inspects it.
#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub password: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub posts: Vec<i64>,
    pub notes: Vec<i64>,
}

// -- Notes --

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NoteResponse {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

// -- Posts --

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostSort {
    /// `votes + id` descending.
    #[default]
    Hot,
    Top,
    New,
}

impl PostSort {
    /// Unknown or missing values fall back to `Hot`.
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some("top") => PostSort::Top,
            Some("new") => PostSort::New,
            _ => PostSort::Hot,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    #[serde(default = "default_subreddit")]
    pub subreddit: String,
    pub user_id: String,
}

pub fn default_subreddit() -> String {
    "general".to_string()
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub votes: i64,
    pub subreddit: String,
    pub author: String,
    pub user_id: String,
}

// -- Votes --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
    Neutral,
}

impl VoteDirection {
    /// Signed row value; neutral maps to 0, meaning "no row".
    pub fn value(self) -> i64 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
            Self::Neutral => 0,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PostVoteRequest {
    pub post_id: i64,
    pub user_id: String,
    pub vote: VoteDirection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostVoteResponse {
    pub message: String,
    pub new_votes: i64,
}

#[derive(Debug, Deserialize)]
pub struct CommentVoteRequest {
    pub user_id: String,
    pub value: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentVoteResponse {
    pub message: String,
    pub votes: i64,
}

// -- Comments --

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
    pub post_id: i64,
    pub author_id: String,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    pub content: String,
}

/// One comment with its replies and live vote total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentNode {
    pub id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub author_username: String,
    pub parent_id: Option<i64>,
    pub post_id: i64,
    pub children: Vec<CommentNode>,
    pub votes: i64,
}

// -- Saved --

#[derive(Debug, Serialize)]
pub struct SavedItems {
    pub posts: Vec<PostResponse>,
    pub comments: Vec<CommentNode>,
}

// -- Messages --

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

// -- Synthetic control plane --

#[derive(Debug, Deserialize)]
pub struct LogEventRequest {
    #[serde(rename = "actionType")]
    pub action_type: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetResponse {
    pub status: String,
    pub seed: Option<String>,
}

/// A persisted audit log record as returned by `GET /_synthetic/logs`.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    #[serde(flatten)]
    pub entry: LogPayload,
}
