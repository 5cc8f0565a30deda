mod comments;
mod logs;
mod messages;
mod notes;
mod posts;
mod saved;
mod users;
mod votes;

pub use votes::plan_vote;

pub(crate) use comments::insert_comment;
pub(crate) use messages::insert_message_row;
pub(crate) use notes::insert_note;
pub(crate) use posts::insert_post;
pub(crate) use users::insert_user;

use rusqlite::Row;

use crate::models::{CommentRow, PostRow};

// JOIN users so the author's name comes back in the same query (no N+1).
// LEFT JOIN because comment authors may have been deleted.

pub(crate) const POST_SELECT: &str = "SELECT p.id, p.title, p.content, p.votes, p.subreddit, p.author_id, u.username
     FROM posts p
     LEFT JOIN users u ON p.author_id = u.id";

pub(crate) const COMMENT_SELECT: &str = "SELECT c.id, c.content, c.created_at, c.post_id, c.author_id, u.username, c.parent_id
     FROM comments c
     LEFT JOIN users u ON c.author_id = u.id";

pub(crate) fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        votes: row.get(3)?,
        subreddit: row.get(4)?,
        author_id: row.get(5)?,
        author_username: row.get(6)?,
    })
}

pub(crate) fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        content: row.get(1)?,
        created_at: row.get(2)?,
        post_id: row.get(3)?,
        author_id: row.get(4)?,
        author_username: row.get(5)?,
        parent_id: row.get(6)?,
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::Database;
    use crate::models::{PostRow, UserRow};

    pub fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    pub fn user(db: &Database, username: &str) -> UserRow {
        db.create_user(username, "hunter2").unwrap().unwrap()
    }

    pub fn post(db: &Database, author: &UserRow) -> PostRow {
        db.create_post(&author.id, "A title", "Some content", "general")
            .unwrap()
    }
}
