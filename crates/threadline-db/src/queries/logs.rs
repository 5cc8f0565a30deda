use anyhow::Result;
use chrono::Utc;

use crate::Database;
use crate::models::LogRow;

impl Database {
    // -- Audit log --

    /// Append one record. The timestamp is assigned here.
    pub fn insert_log(&self, session_id: &str, action_type: &str, payload: &str) -> Result<LogRow> {
        let timestamp = Utc::now();
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO logs (timestamp, session_id, action_type, payload) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![timestamp, session_id, action_type, payload],
            )?;
            Ok(LogRow {
                id: conn.last_insert_rowid(),
                timestamp,
                session_id: session_id.to_string(),
                action_type: action_type.to_string(),
                payload: payload.to_string(),
            })
        })
    }

    /// Records in insertion order, optionally for one session only.
    pub fn list_logs(&self, session_id: Option<&str>) -> Result<Vec<LogRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, timestamp, session_id, action_type, payload FROM logs
                 WHERE (?1 IS NULL OR session_id = ?1)
                 ORDER BY id",
            )?;
            let rows = stmt
                .query_map([session_id], |row| {
                    Ok(LogRow {
                        id: row.get(0)?,
                        timestamp: row.get(1)?,
                        session_id: row.get(2)?,
                        action_type: row.get(3)?,
                        payload: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_logs(&self) -> Result<i64> {
        self.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM logs", [], |row| row.get(0))?))
    }

    /// Remove every record. Returns how many were deleted.
    pub fn clear_logs(&self) -> Result<usize> {
        self.with_conn_mut(|conn| Ok(conn.execute("DELETE FROM logs", [])?))
    }
}

#[cfg(test)]
mod tests {
    use crate::queries::test_support::db;

    #[test]
    fn test_filter_and_clear() {
        let db = db();
        db.insert_log("s1", "click", "{}").unwrap();
        db.insert_log("s2", "click", "{}").unwrap();
        let third = db.insert_log("s1", "hover", "{}").unwrap();

        let s1 = db.list_logs(Some("s1")).unwrap();
        assert_eq!(s1.len(), 2);
        assert_eq!(s1[1].id, third.id);
        assert_eq!(db.list_logs(None).unwrap().len(), 3);

        assert_eq!(db.clear_logs().unwrap(), 3);
        assert_eq!(db.count_logs().unwrap(), 0);
    }
}
