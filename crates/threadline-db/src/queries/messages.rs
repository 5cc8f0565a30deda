use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::Database;
use crate::models::MessageRow;

const MESSAGE_SELECT: &str = "SELECT id, sender_id, receiver_id, content, timestamp FROM messages";

impl Database {
    // -- Messages --

    pub fn insert_message(&self, sender_id: &str, receiver_id: &str, content: &str) -> Result<MessageRow> {
        let row = MessageRow {
            id: Uuid::new_v4().to_string(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
        };
        self.with_conn_mut(|conn| insert_message_row(conn, &row))?;
        Ok(row)
    }

    /// Both directions between two users, oldest first. Symmetric in its
    /// arguments.
    pub fn conversation(&self, user_a: &str, user_b: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            query_messages(
                conn,
                "(sender_id = ?1 AND receiver_id = ?2) OR (sender_id = ?2 AND receiver_id = ?1)",
                &[user_a, user_b],
            )
        })
    }

    /// Everything a user sent or received, oldest first.
    pub fn messages_for_user(&self, user_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_messages(conn, "sender_id = ?1 OR receiver_id = ?1", &[user_id]))
    }
}

pub(crate) fn insert_message_row(conn: &Connection, row: &MessageRow) -> Result<()> {
    conn.execute(
        "INSERT INTO messages (id, sender_id, receiver_id, content, timestamp) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![row.id, row.sender_id, row.receiver_id, row.content, row.timestamp],
    )?;
    Ok(())
}

fn query_messages(conn: &Connection, filter: &str, params: &[&str]) -> Result<Vec<MessageRow>> {
    // rowid breaks ties between messages stored within the same instant
    let sql = format!("{MESSAGE_SELECT} WHERE {filter} ORDER BY timestamp ASC, rowid ASC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params), |row| {
            Ok(MessageRow {
                id: row.get(0)?,
                sender_id: row.get(1)?,
                receiver_id: row.get(2)?,
                content: row.get(3)?,
                timestamp: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use crate::queries::test_support::{db, user};

    #[test]
    fn test_conversation_is_symmetric_and_ordered() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let carol = user(&db, "carol");

        db.insert_message(&alice.id, &bob.id, "hi bob").unwrap();
        db.insert_message(&bob.id, &alice.id, "hi alice").unwrap();
        db.insert_message(&carol.id, &alice.id, "unrelated").unwrap();
        db.insert_message(&alice.id, &bob.id, "how are you").unwrap();

        let ab = db.conversation(&alice.id, &bob.id).unwrap();
        let ba = db.conversation(&bob.id, &alice.id).unwrap();

        let contents: Vec<&str> = ab.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hi bob", "hi alice", "how are you"]);
        assert_eq!(
            ab.iter().map(|m| &m.id).collect::<Vec<_>>(),
            ba.iter().map(|m| &m.id).collect::<Vec<_>>()
        );
        assert!(ab.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

        assert_eq!(db.messages_for_user(&alice.id).unwrap().len(), 4);
        assert_eq!(db.messages_for_user(&carol.id).unwrap().len(), 1);
    }
}
