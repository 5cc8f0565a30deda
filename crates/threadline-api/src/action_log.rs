use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, warn};

use threadline_db::Database;
use threadline_db::models::LogRow;
use threadline_types::api::LogRecord;
use threadline_types::{ActionError, ActionKind, LogPayload};

/// Append-only audit log of HTTP calls, store mutations and client-side UI
/// events, keyed by session id.
#[derive(Clone)]
pub struct ActionLogger {
    db: Arc<Database>,
}

impl ActionLogger {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Append a typed record.
    pub fn log(&self, session_id: &str, payload: LogPayload) -> Result<LogRecord> {
        let (kind, body) = payload.clone().into_parts()?;
        let row = self.db.insert_log(session_id, kind.as_str(), &serde_json::to_string(&body)?)?;
        debug!("Logged {} for session {}", kind, session_id);
        Ok(LogRecord {
            id: row.id,
            timestamp: row.timestamp,
            session_id: row.session_id,
            entry: payload,
        })
    }

    /// Append a record, logging rather than returning a failure. Handlers
    /// use this so a broken audit write never fails the request.
    pub fn record(&self, session_id: &str, payload: LogPayload) {
        let kind = payload.kind();
        if let Err(e) = self.log(session_id, payload) {
            warn!("Failed to write {} log for session {}: {:#}", kind, session_id, e);
        }
    }

    /// Validate a client-supplied event and append it. Nothing is written
    /// when the kind is unknown or the payload does not fit it.
    pub fn log_event(&self, session_id: &str, kind: &str, payload: Value) -> Result<LogRecord, LogEventError> {
        let payload = LogPayload::parse(kind, payload)?;
        Ok(self.log(session_id, payload)?)
    }

    /// Records in insertion order, optionally for one session.
    pub fn query(&self, session_id: Option<&str>) -> Result<Vec<LogRecord>> {
        let rows = self.db.list_logs(session_id)?;
        Ok(rows.into_iter().filter_map(decode_row).collect())
    }

    pub fn count(&self) -> Result<i64> {
        self.db.count_logs()
    }

    pub fn clear(&self) -> Result<usize> {
        self.db.clear_logs()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LogEventError {
    #[error(transparent)]
    Invalid(#[from] ActionError),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

fn decode_row(row: LogRow) -> Option<LogRecord> {
    let decoded = row
        .action_type
        .parse::<ActionKind>()
        .map_err(anyhow::Error::from)
        .and_then(|kind| {
            let payload: Value = serde_json::from_str(&row.payload)?;
            Ok(LogPayload::from_parts(kind, payload)?)
        });

    match decoded {
        Ok(entry) => Some(LogRecord {
            id: row.id,
            timestamp: row.timestamp,
            session_id: row.session_id,
            entry,
        }),
        Err(e) => {
            warn!("Skipping corrupt log record {}: {:#}", row.id, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use threadline_types::actions::UpdateType;

    fn logger() -> ActionLogger {
        ActionLogger::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    #[test]
    fn test_rejected_event_writes_nothing() {
        let logger = logger();
        logger
            .log_event("s1", "click", json!({
                "text": "clicked save", "page_url": "/notes",
                "element_identifier": "#save", "coordinates": { "x": 10, "y": 20 }
            }))
            .unwrap();

        let missing_table = logger.log_event(
            "s1",
            "db_update",
            json!({ "text": "t", "update_type": "insert", "values": {} }),
        );
        assert!(matches!(missing_table, Err(LogEventError::Invalid(_))));

        let unknown = logger.log_event("s1", "teleport", json!({}));
        assert!(matches!(unknown, Err(LogEventError::Invalid(ActionError::UnknownKind(_)))));

        assert_eq!(logger.count().unwrap(), 1);
    }

    #[test]
    fn test_query_filters_by_session_in_order() {
        let logger = logger();
        logger.record("a", LogPayload::custom("login", "first", json!({})));
        logger.record("b", LogPayload::custom("login", "other", json!({})));
        logger.record("a", LogPayload::db_update("notes", UpdateType::Insert, "second", json!({ "id": 1 })));

        let a = logger.query(Some("a")).unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(a[0].entry.kind(), ActionKind::Custom);
        assert_eq!(a[1].entry.kind(), ActionKind::DbUpdate);
        assert!(a[0].id < a[1].id);
        assert_eq!(logger.query(None).unwrap().len(), 3);

        let json = serde_json::to_value(&a[1]).unwrap();
        assert_eq!(json["action_type"], "db_update");
        assert_eq!(json["payload"]["table_name"], "notes");
        assert_eq!(json["session_id"], "a");

        assert_eq!(logger.clear().unwrap(), 3);
        assert!(logger.query(None).unwrap().is_empty());
    }
}
