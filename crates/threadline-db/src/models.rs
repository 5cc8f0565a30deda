//! Database row types. These map directly to SQLite rows.
//! Distinct from threadline-types API models to keep the DB layer independent.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NoteRow {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub user_id: String,
}

#[derive(Debug, Clone)]
pub struct PostRow {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub votes: i64,
    pub subreddit: String,
    pub author_id: String,
    /// `None` once the author row is gone.
    pub author_username: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CommentRow {
    pub id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub post_id: i64,
    pub author_id: String,
    pub author_username: Option<String>,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct LogRow {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub action_type: String,
    /// Raw JSON text.
    pub payload: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteChange {
    Inserted,
    Updated,
    Removed,
    Unchanged,
}

/// Result of one vote call against a post or comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteOutcome {
    pub change: VoteChange,
    /// Row value before the call, `None` when no row existed.
    pub previous: Option<i64>,
    /// Row value after the call, `None` when no row remains.
    pub current: Option<i64>,
    /// Net score of the target after the call.
    pub total: i64,
}

impl VoteOutcome {
    pub fn is_unchanged(&self) -> bool {
        self.change == VoteChange::Unchanged
    }
}
