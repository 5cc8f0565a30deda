use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension};

use threadline_types::api::PostSort;

use super::{POST_SELECT, post_from_row};
use crate::Database;
use crate::models::PostRow;

impl Database {
    // -- Posts --

    pub fn create_post(
        &self,
        author_id: &str,
        title: &str,
        content: &str,
        subreddit: &str,
    ) -> Result<PostRow> {
        self.with_conn_mut(|conn| {
            let id = insert_post(conn, author_id, title, content, subreddit, 0)?;
            query_post(conn, id)?.ok_or_else(|| anyhow!("Post {} missing after insert", id))
        })
    }

    pub fn get_post(&self, id: i64) -> Result<Option<PostRow>> {
        self.with_conn(|conn| query_post(conn, id))
    }

    /// List posts, optionally restricted to one subreddit.
    pub fn list_posts(&self, sort: PostSort, subreddit: Option<&str>) -> Result<Vec<PostRow>> {
        let order = match sort {
            PostSort::Top => "p.votes DESC, p.id DESC",
            PostSort::New => "p.id DESC",
            PostSort::Hot => "(p.votes + p.id) DESC, p.id DESC",
        };

        self.with_conn(|conn| {
            let sql = format!("{POST_SELECT} WHERE (?1 IS NULL OR p.subreddit = ?1) ORDER BY {order}");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([subreddit], post_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Title substring search.
    pub fn search_posts(&self, query: &str, limit: u32) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!("{POST_SELECT} WHERE p.title LIKE '%' || ?1 || '%' ORDER BY p.id LIMIT ?2");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![query, limit], post_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_post(&self, id: i64, title: &str, content: &str) -> Result<Option<PostRow>> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE posts SET title = ?1, content = ?2 WHERE id = ?3",
                rusqlite::params![title, content, id],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            query_post(conn, id)
        })
    }

    /// Delete a post together with its votes, comments and saves. Returns the
    /// removed row.
    pub fn delete_post(&self, id: i64) -> Result<Option<PostRow>> {
        self.with_conn_mut(|conn| {
            let Some(post) = query_post(conn, id)? else {
                return Ok(None);
            };
            conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
            Ok(Some(post))
        })
    }
}

pub(crate) fn insert_post(
    conn: &Connection,
    author_id: &str,
    title: &str,
    content: &str,
    subreddit: &str,
    votes: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO posts (title, content, votes, subreddit, author_id) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![title, content, votes, subreddit, author_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn query_post(conn: &Connection, id: i64) -> Result<Option<PostRow>> {
    let row = conn
        .query_row(&format!("{POST_SELECT} WHERE p.id = ?1"), [id], post_from_row)
        .optional()?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use threadline_types::api::PostSort;

    use crate::queries::test_support::{db, user};

    fn ids(rows: &[crate::models::PostRow]) -> Vec<i64> {
        rows.iter().map(|p| p.id).collect()
    }

    #[test]
    fn test_sort_orders() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let carol = user(&db, "carol");

        let p1 = db.create_post(&alice.id, "one", "c", "general").unwrap();
        let p2 = db.create_post(&alice.id, "two", "c", "tech").unwrap();
        let p3 = db.create_post(&alice.id, "three", "c", "general").unwrap();

        // p1: +3, p2: 0, p3: -1
        for voter in [&alice, &bob, &carol] {
            db.record_post_vote(p1.id, &voter.id, 1).unwrap();
        }
        db.record_post_vote(p3.id, &bob.id, -1).unwrap();

        let top = db.list_posts(PostSort::Top, None).unwrap();
        assert_eq!(ids(&top), vec![p1.id, p2.id, p3.id]);

        let new = db.list_posts(PostSort::New, None).unwrap();
        assert_eq!(ids(&new), vec![p3.id, p2.id, p1.id]);

        // votes + id: p1 = 4, p2 = 2, p3 = 2; ties broken by newest
        let hot = db.list_posts(PostSort::Hot, None).unwrap();
        assert_eq!(ids(&hot), vec![p1.id, p3.id, p2.id]);

        let general = db.list_posts(PostSort::New, Some("general")).unwrap();
        assert_eq!(ids(&general), vec![p3.id, p1.id]);
    }

    #[test]
    fn test_delete_post_cascades() {
        let db = db();
        let alice = user(&db, "alice");
        let post = db.create_post(&alice.id, "t", "c", "general").unwrap();
        let root = db.create_comment(post.id, &alice.id, None, "root").unwrap();
        let reply = db.create_comment(post.id, &alice.id, Some(root.id), "reply").unwrap();
        db.record_post_vote(post.id, &alice.id, 1).unwrap();
        db.record_comment_vote(reply.id, &alice.id, 1).unwrap();

        let removed = db.delete_post(post.id).unwrap().unwrap();
        assert_eq!(removed.author_username.as_deref(), Some("alice"));
        assert!(db.comments_for_post(post.id).unwrap().is_empty());
        assert_eq!(db.comment_vote_total(reply.id).unwrap(), 0);
        assert_eq!(db.post_vote_sum(post.id).unwrap(), 0);
    }

    #[test]
    fn test_search_matches_title() {
        let db = db();
        let alice = user(&db, "alice");
        db.create_post(&alice.id, "Rust async tips", "c", "tech").unwrap();
        db.create_post(&alice.id, "Cat pictures", "rust", "memes").unwrap();

        let hits = db.search_posts("async", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Rust async tips");
    }
}
