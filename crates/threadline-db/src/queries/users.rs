use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::Database;
use crate::models::UserRow;

impl Database {
    // -- Users --

    /// Insert a new user. Returns `None` when the username is already taken,
    /// in which case nothing is written.
    pub fn create_user(&self, username: &str, password: &str) -> Result<Option<UserRow>> {
        self.with_conn_mut(|conn| {
            let taken: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
                [username],
                |row| row.get(0),
            )?;
            if taken {
                return Ok(None);
            }

            let user = UserRow {
                id: Uuid::new_v4().to_string(),
                username: username.to_string(),
                password: password.to_string(),
                created_at: Utc::now(),
                updated_at: None,
            };
            insert_user(conn, &user)?;
            Ok(Some(user))
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username = ?1", &[username]))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", &[id]))
    }

    /// Plaintext comparison; credentials are not secured in this system.
    pub fn find_user_by_credentials(&self, username: &str, password: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username = ?1 AND password = ?2", &[username, password]))
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, username, password, created_at, updated_at FROM users ORDER BY created_at, id",
            )?;
            let rows = stmt
                .query_map([], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn post_ids_by_author(&self, author_id: &str) -> Result<Vec<i64>> {
        self.with_conn(|conn| ids(conn, "SELECT id FROM posts WHERE author_id = ?1 ORDER BY id", author_id))
    }

    pub fn note_ids_by_owner(&self, user_id: &str) -> Result<Vec<i64>> {
        self.with_conn(|conn| ids(conn, "SELECT id FROM notes WHERE user_id = ?1 ORDER BY id", user_id))
    }

    /// Delete a user. Posts, votes, saved items and messages go with it;
    /// notes and comments stay behind with a dangling owner id.
    pub fn delete_user(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            // Cascaded vote rows must come off the denormalized counters first.
            tx.execute(
                "UPDATE posts SET votes = votes - (
                     SELECT v.value FROM votes v WHERE v.post_id = posts.id AND v.user_id = ?1
                 )
                 WHERE id IN (SELECT post_id FROM votes WHERE user_id = ?1)",
                [id],
            )?;
            let deleted = tx.execute("DELETE FROM users WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(deleted > 0)
        })
    }
}

pub(crate) fn insert_user(conn: &Connection, user: &UserRow) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, username, password, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![user.id, user.username, user.password, user.created_at, user.updated_at],
    )?;
    Ok(())
}

fn query_user(conn: &Connection, filter: &str, params: &[&str]) -> Result<Option<UserRow>> {
    let sql = format!("SELECT id, username, password, created_at, updated_at FROM users WHERE {filter}");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt
        .query_row(rusqlite::params_from_iter(params), user_from_row)
        .optional()?;
    Ok(row)
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn ids(conn: &Connection, sql: &str, key: &str) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map([key], |row| row.get(0))?
        .collect::<std::result::Result<Vec<i64>, _>>()?;
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use crate::queries::test_support::{db, post, user};

    #[test]
    fn test_duplicate_username_writes_nothing() {
        let db = db();
        let first = user(&db, "alice");
        assert!(db.create_user("alice", "other").unwrap().is_none());

        let users = db.list_users().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, first.id);
        assert_eq!(users[0].password, "hunter2");
    }

    #[test]
    fn test_credentials_must_match() {
        let db = db();
        let alice = user(&db, "alice");
        assert_eq!(
            db.find_user_by_credentials("alice", "hunter2").unwrap().unwrap().id,
            alice.id
        );
        assert!(db.find_user_by_credentials("alice", "wrong").unwrap().is_none());
        assert!(db.find_user_by_credentials("bob", "hunter2").unwrap().is_none());
    }

    #[test]
    fn test_delete_user_keeps_notes_and_comments() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let alices_post = post(&db, &alice);
        let bobs_post = post(&db, &bob);

        db.record_post_vote(bobs_post.id, &alice.id, 1).unwrap();
        let note = db.create_note(&alice.id, "todo", "buy milk").unwrap();
        let comment = db.create_comment(bobs_post.id, &alice.id, None, "first").unwrap();
        db.insert_message(&alice.id, &bob.id, "hi bob").unwrap();
        db.insert_message(&bob.id, &alice.id, "hi alice").unwrap();

        assert!(db.delete_user(&alice.id).unwrap());
        assert!(db.messages_for_user(&bob.id).unwrap().is_empty());

        assert!(db.get_post(alices_post.id).unwrap().is_none());
        assert_eq!(db.post_vote_sum(bobs_post.id).unwrap(), 0);
        assert_eq!(db.get_post(bobs_post.id).unwrap().unwrap().votes, 0);
        assert!(db.get_note(note.id).unwrap().is_some());

        let orphan = db.get_comment(comment.id).unwrap().unwrap();
        assert_eq!(orphan.author_id, alice.id);
        assert!(orphan.author_username.is_none());
    }
}
