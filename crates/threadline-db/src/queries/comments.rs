use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};

use super::{COMMENT_SELECT, comment_from_row};
use crate::Database;
use crate::models::CommentRow;

impl Database {
    // -- Comments --

    pub fn create_comment(
        &self,
        post_id: i64,
        author_id: &str,
        parent_id: Option<i64>,
        content: &str,
    ) -> Result<CommentRow> {
        self.with_conn_mut(|conn| {
            let id = insert_comment(conn, post_id, author_id, parent_id, content, Utc::now())?;
            query_comment(conn, id)?.ok_or_else(|| anyhow!("Comment {} missing after insert", id))
        })
    }

    pub fn get_comment(&self, id: i64) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| query_comment(conn, id))
    }

    /// Every comment on a post in insertion order, replies included.
    pub fn comments_for_post(&self, post_id: i64) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{COMMENT_SELECT} WHERE c.post_id = ?1 ORDER BY c.id"))?;
            let rows = stmt
                .query_map([post_id], comment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// A user's comments, newest first.
    pub fn comments_by_author(&self, author_id: &str) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{COMMENT_SELECT} WHERE c.author_id = ?1 ORDER BY c.created_at DESC, c.id DESC"
            ))?;
            let rows = stmt
                .query_map([author_id], comment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_comment(&self, id: i64, content: &str) -> Result<Option<CommentRow>> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE comments SET content = ?1 WHERE id = ?2",
                rusqlite::params![content, id],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            query_comment(conn, id)
        })
    }

    /// Delete a comment and, through the cascade, its whole reply subtree.
    pub fn delete_comment(&self, id: i64) -> Result<Option<CommentRow>> {
        self.with_conn_mut(|conn| {
            let Some(comment) = query_comment(conn, id)? else {
                return Ok(None);
            };
            conn.execute("DELETE FROM comments WHERE id = ?1", [id])?;
            Ok(Some(comment))
        })
    }
}

pub(crate) fn insert_comment(
    conn: &Connection,
    post_id: i64,
    author_id: &str,
    parent_id: Option<i64>,
    content: &str,
    created_at: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO comments (content, created_at, post_id, author_id, parent_id) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![content, created_at, post_id, author_id, parent_id],
    )?;
    Ok(conn.last_insert_rowid())
}

fn query_comment(conn: &Connection, id: i64) -> Result<Option<CommentRow>> {
    let row = conn
        .query_row(&format!("{COMMENT_SELECT} WHERE c.id = ?1"), [id], comment_from_row)
        .optional()?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use crate::queries::test_support::{db, post, user};

    #[test]
    fn test_comments_for_post_in_insertion_order() {
        let db = db();
        let alice = user(&db, "alice");
        let first = post(&db, &alice);
        let second = post(&db, &alice);

        let c1 = db.create_comment(first.id, &alice.id, None, "c1").unwrap();
        db.create_comment(second.id, &alice.id, None, "elsewhere").unwrap();
        let c2 = db.create_comment(first.id, &alice.id, None, "c2").unwrap();
        let c3 = db.create_comment(first.id, &alice.id, Some(c1.id), "c3").unwrap();

        let rows = db.comments_for_post(first.id).unwrap();
        let ids: Vec<i64> = rows.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![c1.id, c2.id, c3.id]);
        assert_eq!(rows[2].parent_id, Some(c1.id));
        assert_eq!(rows[0].author_username.as_deref(), Some("alice"));
    }

    #[test]
    fn test_delete_comment_removes_replies() {
        let db = db();
        let alice = user(&db, "alice");
        let post = post(&db, &alice);
        let root = db.create_comment(post.id, &alice.id, None, "root").unwrap();
        let reply = db.create_comment(post.id, &alice.id, Some(root.id), "reply").unwrap();
        let sibling = db.create_comment(post.id, &alice.id, None, "sibling").unwrap();

        assert!(db.delete_comment(root.id).unwrap().is_some());
        assert!(db.get_comment(reply.id).unwrap().is_none());
        assert_eq!(db.comments_for_post(post.id).unwrap().len(), 1);
        assert!(db.get_comment(sibling.id).unwrap().is_some());
    }
}
