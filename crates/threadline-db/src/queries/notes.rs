use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};

use crate::Database;
use crate::models::NoteRow;

const NOTE_SELECT: &str = "SELECT id, title, content, created_at, updated_at, user_id FROM notes";

impl Database {
    // -- Notes --

    pub fn create_note(&self, user_id: &str, title: &str, content: &str) -> Result<NoteRow> {
        self.with_conn_mut(|conn| {
            let id = insert_note(conn, user_id, title, content, Utc::now())?;
            query_note(conn, id)?.ok_or_else(|| anyhow!("Note {} missing after insert", id))
        })
    }

    pub fn list_notes(&self) -> Result<Vec<NoteRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{NOTE_SELECT} ORDER BY id"))?;
            let rows = stmt
                .query_map([], note_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_note(&self, id: i64) -> Result<Option<NoteRow>> {
        self.with_conn(|conn| query_note(conn, id))
    }

    pub fn update_note(&self, id: i64, title: &str, content: &str) -> Result<Option<NoteRow>> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE notes SET title = ?1, content = ?2, updated_at = ?3 WHERE id = ?4",
                rusqlite::params![title, content, Utc::now(), id],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            query_note(conn, id)
        })
    }

    /// Returns the removed row.
    pub fn delete_note(&self, id: i64) -> Result<Option<NoteRow>> {
        self.with_conn_mut(|conn| {
            let Some(note) = query_note(conn, id)? else {
                return Ok(None);
            };
            conn.execute("DELETE FROM notes WHERE id = ?1", [id])?;
            Ok(Some(note))
        })
    }
}

pub(crate) fn insert_note(
    conn: &Connection,
    user_id: &str,
    title: &str,
    content: &str,
    created_at: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO notes (title, content, created_at, user_id) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![title, content, created_at, user_id],
    )?;
    Ok(conn.last_insert_rowid())
}

fn query_note(conn: &Connection, id: i64) -> Result<Option<NoteRow>> {
    let row = conn
        .query_row(&format!("{NOTE_SELECT} WHERE id = ?1"), [id], note_from_row)
        .optional()?;
    Ok(row)
}

fn note_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<NoteRow> {
    Ok(NoteRow {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
        user_id: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::queries::test_support::{db, user};

    #[test]
    fn test_update_sets_updated_at() {
        let db = db();
        let alice = user(&db, "alice");
        let note = db.create_note(&alice.id, "draft", "v1").unwrap();
        assert!(note.updated_at.is_none());

        let edited = db.update_note(note.id, "final", "v2").unwrap().unwrap();
        assert_eq!(edited.title, "final");
        assert_eq!(edited.content, "v2");
        assert!(edited.updated_at.is_some());
        assert_eq!(edited.created_at, note.created_at);
    }

    #[test]
    fn test_missing_note_operations_return_none() {
        let db = db();
        assert!(db.update_note(99, "t", "c").unwrap().is_none());
        assert!(db.delete_note(99).unwrap().is_none());
    }
}
