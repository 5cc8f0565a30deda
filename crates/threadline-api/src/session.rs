use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use axum::http::HeaderMap;
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

pub const NO_SESSION: &str = "no_session";
pub const SESSION_COOKIE: &str = "session_id";
pub const SESSION_QUERY: &str = "session_id";
pub const SESSION_HEADER: &str = "x-session-id";

/// The session id resolved for one request, attached as a request
/// extension by the logging middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The "current" session of the synthetic environment: a fallback key for
/// requests that carry no session id of their own. Holds at most one id.
#[derive(Debug, Default)]
pub struct SessionManager {
    current: RwLock<Option<String>>,
}

impl SessionManager {
    /// Issue a fresh id and make it current.
    pub fn create(&self) -> String {
        let id = Uuid::new_v4().to_string();
        self.set(id.clone());
        id
    }

    pub fn set(&self, session_id: impl Into<String>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(session_id.into());
    }

    pub fn get(&self) -> Option<String> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn clear(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Cookie, then query parameter, then the current session, then
/// `no_session`.
pub fn resolve_session_id(
    headers: &HeaderMap,
    query_params: &BTreeMap<String, String>,
    sessions: &SessionManager,
) -> String {
    let jar = CookieJar::from_headers(headers);
    jar.get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| query_params.get(SESSION_QUERY).filter(|s| !s.is_empty()).cloned())
        .or_else(|| sessions.get())
        .unwrap_or_else(|| NO_SESSION.to_string())
}

/// The `x-session-id` header, if present and non-empty.
pub fn session_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, header};

    fn query(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_manager_lifecycle() {
        let sessions = SessionManager::default();
        assert_eq!(sessions.get(), None);

        let id = sessions.create();
        assert_eq!(sessions.get().as_deref(), Some(id.as_str()));

        sessions.set("manual");
        assert_eq!(sessions.get().as_deref(), Some("manual"));

        sessions.clear();
        assert_eq!(sessions.get(), None);
    }

    #[test]
    fn test_resolution_precedence() {
        let sessions = SessionManager::default();
        let mut headers = HeaderMap::new();

        assert_eq!(resolve_session_id(&headers, &query(&[]), &sessions), NO_SESSION);

        sessions.set("fallback");
        assert_eq!(resolve_session_id(&headers, &query(&[]), &sessions), "fallback");
        assert_eq!(
            resolve_session_id(&headers, &query(&[("session_id", "from-query")]), &sessions),
            "from-query"
        );

        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; session_id=from-cookie"));
        assert_eq!(
            resolve_session_id(&headers, &query(&[("session_id", "from-query")]), &sessions),
            "from-cookie"
        );
    }

    #[test]
    fn test_session_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_header(&headers), None);
        headers.insert(SESSION_HEADER, HeaderValue::from_static("abc"));
        assert_eq!(session_header(&headers).as_deref(), Some("abc"));
    }
}
