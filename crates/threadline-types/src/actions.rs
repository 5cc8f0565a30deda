use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Discriminator stored alongside every audit log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    HttpRequest,
    DbUpdate,
    Click,
    Scroll,
    Hover,
    KeyPress,
    GoBack,
    GoForward,
    GoToUrl,
    SetStorage,
    Custom,
}

impl ActionKind {
    pub const ALL: [ActionKind; 11] = [
        ActionKind::HttpRequest,
        ActionKind::DbUpdate,
        ActionKind::Click,
        ActionKind::Scroll,
        ActionKind::Hover,
        ActionKind::KeyPress,
        ActionKind::GoBack,
        ActionKind::GoForward,
        ActionKind::GoToUrl,
        ActionKind::SetStorage,
        ActionKind::Custom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HttpRequest => "http_request",
            Self::DbUpdate => "db_update",
            Self::Click => "click",
            Self::Scroll => "scroll",
            Self::Hover => "hover",
            Self::KeyPress => "key_press",
            Self::GoBack => "go_back",
            Self::GoForward => "go_forward",
            Self::GoToUrl => "go_to_url",
            Self::SetStorage => "set_storage",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ActionError::UnknownKind(s.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Invalid action type: {0}")]
    UnknownKind(String),

    #[error("Invalid payload for action type {kind}: {reason}")]
    InvalidPayload { kind: ActionKind, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateType {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Local,
    Session,
}

// -- Payloads --
// Every payload carries `text`, a one-line natural language description.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpRequestPayload {
    pub text: String,
    pub method: String,
    pub url: String,
    pub query_params: BTreeMap<String, String>,
    pub request_body: Map<String, Value>,
    pub status_code: u16,
    /// Seconds.
    pub response_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbUpdatePayload {
    pub text: String,
    pub table_name: String,
    pub update_type: UpdateType,
    pub values: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickPayload {
    pub text: String,
    pub page_url: String,
    pub element_identifier: String,
    pub coordinates: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollPayload {
    pub text: String,
    pub page_url: String,
    pub scroll_x: i64,
    pub scroll_y: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoverPayload {
    pub text: String,
    pub page_url: String,
    pub element_identifier: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPressPayload {
    pub text: String,
    pub page_url: String,
    pub element_identifier: String,
    pub key: String,
}

/// Shared by `go_back` and `go_forward`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigatePayload {
    pub text: String,
    pub page_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoToUrlPayload {
    pub text: String,
    pub page_url: String,
    pub target_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetStoragePayload {
    pub text: String,
    pub page_url: String,
    pub storage_type: StorageType,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomPayload {
    pub text: String,
    pub custom_action: String,
    pub data: Map<String, Value>,
}

/// A log payload together with its kind. The variant decides the required
/// field set, so a record can never carry a payload of the wrong shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action_type", content = "payload", rename_all = "snake_case")]
pub enum LogPayload {
    HttpRequest(HttpRequestPayload),
    DbUpdate(DbUpdatePayload),
    Click(ClickPayload),
    Scroll(ScrollPayload),
    Hover(HoverPayload),
    KeyPress(KeyPressPayload),
    GoBack(NavigatePayload),
    GoForward(NavigatePayload),
    GoToUrl(GoToUrlPayload),
    SetStorage(SetStoragePayload),
    Custom(CustomPayload),
}

impl LogPayload {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::HttpRequest(_) => ActionKind::HttpRequest,
            Self::DbUpdate(_) => ActionKind::DbUpdate,
            Self::Click(_) => ActionKind::Click,
            Self::Scroll(_) => ActionKind::Scroll,
            Self::Hover(_) => ActionKind::Hover,
            Self::KeyPress(_) => ActionKind::KeyPress,
            Self::GoBack(_) => ActionKind::GoBack,
            Self::GoForward(_) => ActionKind::GoForward,
            Self::GoToUrl(_) => ActionKind::GoToUrl,
            Self::SetStorage(_) => ActionKind::SetStorage,
            Self::Custom(_) => ActionKind::Custom,
        }
    }

    /// Validate an untyped payload against the field set of `kind`.
    pub fn from_parts(kind: ActionKind, payload: Value) -> Result<Self, ActionError> {
        let parsed = match kind {
            ActionKind::HttpRequest => serde_json::from_value(payload).map(Self::HttpRequest),
            ActionKind::DbUpdate => serde_json::from_value(payload).map(Self::DbUpdate),
            ActionKind::Click => serde_json::from_value(payload).map(Self::Click),
            ActionKind::Scroll => serde_json::from_value(payload).map(Self::Scroll),
            ActionKind::Hover => serde_json::from_value(payload).map(Self::Hover),
            ActionKind::KeyPress => serde_json::from_value(payload).map(Self::KeyPress),
            ActionKind::GoBack => serde_json::from_value(payload).map(Self::GoBack),
            ActionKind::GoForward => serde_json::from_value(payload).map(Self::GoForward),
            ActionKind::GoToUrl => serde_json::from_value(payload).map(Self::GoToUrl),
            ActionKind::SetStorage => serde_json::from_value(payload).map(Self::SetStorage),
            ActionKind::Custom => serde_json::from_value(payload).map(Self::Custom),
        };

        parsed.map_err(|e| ActionError::InvalidPayload {
            kind,
            reason: e.to_string(),
        })
    }

    /// Parse both the kind tag and the payload.
    pub fn parse(kind: &str, payload: Value) -> Result<Self, ActionError> {
        Self::from_parts(kind.parse()?, payload)
    }

    /// Split into the kind tag and the bare payload object, the shape the
    /// store persists.
    pub fn into_parts(self) -> Result<(ActionKind, Value), serde_json::Error> {
        let kind = self.kind();
        let mut tagged = serde_json::to_value(self)?;
        let payload = tagged
            .get_mut("payload")
            .map(Value::take)
            .unwrap_or(Value::Null);
        Ok((kind, payload))
    }

    pub fn db_update(
        table_name: &str,
        update_type: UpdateType,
        text: impl Into<String>,
        values: Value,
    ) -> Self {
        Self::DbUpdate(DbUpdatePayload {
            text: text.into(),
            table_name: table_name.to_string(),
            update_type,
            values: into_object(values),
        })
    }

    pub fn custom(custom_action: &str, text: impl Into<String>, data: Value) -> Self {
        Self::Custom(CustomPayload {
            text: text.into(),
            custom_action: custom_action.to_string(),
            data: into_object(data),
        })
    }
}

fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in ActionKind::ALL {
            assert_eq!(kind.as_str().parse::<ActionKind>().unwrap(), kind);
        }
        assert_eq!(
            serde_json::to_value(ActionKind::GoToUrl).unwrap(),
            json!("go_to_url")
        );
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let err = LogPayload::parse("teleport", json!({ "text": "x" })).unwrap_err();
        assert!(matches!(err, ActionError::UnknownKind(ref k) if k == "teleport"));
        assert_eq!(err.to_string(), "Invalid action type: teleport");
    }

    #[test]
    fn test_db_update_missing_table_name_rejected() {
        let err = LogPayload::parse(
            "db_update",
            json!({ "text": "inserted", "update_type": "insert", "values": {} }),
        )
        .unwrap_err();
        match err {
            ActionError::InvalidPayload { kind, reason } => {
                assert_eq!(kind, ActionKind::DbUpdate);
                assert!(reason.contains("table_name"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_payload_of_other_kind_rejected() {
        // A valid scroll payload is not a valid click payload.
        let scroll = json!({ "text": "s", "page_url": "/", "scroll_x": 0, "scroll_y": 120 });
        assert!(LogPayload::parse("scroll", scroll.clone()).is_ok());
        assert!(LogPayload::parse("click", scroll).is_err());
    }

    #[test]
    fn test_bad_enum_field_rejected() {
        let err = LogPayload::parse(
            "set_storage",
            json!({
                "text": "t", "page_url": "/", "storage_type": "cookie",
                "key": "k", "value": "v"
            }),
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_into_parts_strips_tag() {
        let payload = LogPayload::custom("login", "User a logged in", json!({ "userId": "u1" }));
        let (kind, value) = payload.into_parts().unwrap();
        assert_eq!(kind, ActionKind::Custom);
        assert_eq!(
            value,
            json!({ "text": "User a logged in", "custom_action": "login", "data": { "userId": "u1" } })
        );
        assert_eq!(LogPayload::from_parts(kind, value).unwrap().kind(), ActionKind::Custom);
    }

    #[test]
    fn test_db_update_non_object_values_become_empty() {
        let payload = LogPayload::db_update("notes", UpdateType::Delete, "gone", json!(42));
        match payload {
            LogPayload::DbUpdate(p) => assert!(p.values.is_empty()),
            _ => unreachable!(),
        }
    }
}
