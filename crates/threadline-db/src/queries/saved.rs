use anyhow::Result;
use chrono::Utc;

use super::{COMMENT_SELECT, POST_SELECT, comment_from_row, post_from_row};
use crate::Database;
use crate::models::{CommentRow, PostRow};

impl Database {
    // -- Saved posts & comments --

    /// Returns `false` when the post was already saved.
    pub fn save_post(&self, user_id: &str, post_id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO saved_posts (user_id, post_id, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![user_id, post_id, Utc::now()],
            )?;
            Ok(inserted > 0)
        })
    }

    pub fn unsave_post(&self, user_id: &str, post_id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute(
                "DELETE FROM saved_posts WHERE user_id = ?1 AND post_id = ?2",
                rusqlite::params![user_id, post_id],
            )?;
            Ok(deleted > 0)
        })
    }

    pub fn save_comment(&self, user_id: &str, comment_id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO saved_comments (user_id, comment_id, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![user_id, comment_id, Utc::now()],
            )?;
            Ok(inserted > 0)
        })
    }

    pub fn unsave_comment(&self, user_id: &str, comment_id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute(
                "DELETE FROM saved_comments WHERE user_id = ?1 AND comment_id = ?2",
                rusqlite::params![user_id, comment_id],
            )?;
            Ok(deleted > 0)
        })
    }

    /// Most recently saved first.
    pub fn saved_posts(&self, user_id: &str) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{POST_SELECT} JOIN saved_posts s ON s.post_id = p.id
                 WHERE s.user_id = ?1 ORDER BY s.created_at DESC, s.rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], post_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn saved_comments(&self, user_id: &str) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{COMMENT_SELECT} JOIN saved_comments s ON s.comment_id = c.id
                 WHERE s.user_id = ?1 ORDER BY s.created_at DESC, s.rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], comment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::queries::test_support::{db, post, user};

    #[test]
    fn test_save_is_idempotent_and_follows_deletes() {
        let db = db();
        let alice = user(&db, "alice");
        let post = post(&db, &alice);
        let comment = db.create_comment(post.id, &alice.id, None, "keep me").unwrap();

        assert!(db.save_post(&alice.id, post.id).unwrap());
        assert!(!db.save_post(&alice.id, post.id).unwrap());
        assert!(db.save_comment(&alice.id, comment.id).unwrap());

        assert_eq!(db.saved_posts(&alice.id).unwrap().len(), 1);
        assert_eq!(db.saved_comments(&alice.id).unwrap()[0].content, "keep me");

        assert!(db.unsave_post(&alice.id, post.id).unwrap());
        assert!(!db.unsave_post(&alice.id, post.id).unwrap());

        db.delete_post(post.id).unwrap();
        assert!(db.saved_comments(&alice.id).unwrap().is_empty());
    }
}
