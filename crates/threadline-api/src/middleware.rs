use std::collections::BTreeMap;
use std::time::Instant;

use axum::{
    body::{Body, HttpBody},
    extract::{Query, Request, State},
    http::{HeaderMap, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde_json::{Map, Value};
use tracing::warn;

use threadline_db::models::UserRow;
use threadline_types::LogPayload;
use threadline_types::actions::HttpRequestPayload;

use crate::error::ApiError;
use crate::session::{SessionId, resolve_session_id};
use crate::state::AppState;

/// Requests under this prefix drive the synthetic environment and are never
/// logged.
pub const SYNTHETIC_PREFIX: &str = "/_synthetic";

/// Header naming the calling user.
pub const USER_HEADER: &str = "x-user-id";

/// Largest request body buffered for logging. Anything bigger, or of unknown
/// size, reaches the handler untouched and is logged with an empty body.
const MAX_LOGGED_BODY: usize = 2 * 1024 * 1024;

/// Log one `http_request` entry per call and attach the resolved
/// [`SessionId`] to the request.
pub async fn log_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if req.uri().path().starts_with(SYNTHETIC_PREFIX) {
        return next.run(req).await;
    }

    let start = Instant::now();
    let method = req.method().clone();
    let url = request_url(&req);
    let query_params = query_params(&req);

    // Resolved before the handler runs: a handler that switches the current
    // session still has this request logged under the old one.
    let session_id = resolve_session_id(req.headers(), &query_params, &state.sessions);

    let mut request_body = Map::new();
    let prepared = if !wants_body_logged(&req) {
        Ok(req)
    } else if fits_log_limit(&req) {
        buffer_json_body(req, &mut request_body).await
    } else {
        warn!("Request body on {} too large to log", url);
        Ok(req)
    };

    let response = match prepared {
        Ok(mut req) => {
            req.extensions_mut().insert(SessionId(session_id.clone()));
            next.run(req).await
        }
        Err(response) => response,
    };
    let response_time = start.elapsed().as_secs_f64();
    let status_code = response.status().as_u16();

    let text = describe(&method, &url, &query_params, &request_body, status_code);
    state.logger.record(
        &session_id,
        LogPayload::HttpRequest(HttpRequestPayload {
            text,
            method: method.to_string(),
            url,
            query_params,
            request_body,
            status_code,
            response_time,
        }),
    );

    response
}

/// The caller named by `x-user-id`; it must be a stored user.
pub fn current_user(state: &AppState, headers: &HeaderMap) -> Result<UserRow, ApiError> {
    let user_id = headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Unauthenticated("Not authenticated".into()))?;

    state
        .db
        .get_user_by_id(user_id)?
        .ok_or_else(|| ApiError::Unauthenticated("User not found".into()))
}

fn query_params(req: &Request) -> BTreeMap<String, String> {
    match Query::<BTreeMap<String, String>>::try_from_uri(req.uri()) {
        Ok(Query(params)) => params,
        Err(e) => {
            warn!("Unparseable query string on {}: {}", req.uri(), e);
            BTreeMap::new()
        }
    }
}

fn request_url(req: &Request) -> String {
    let uri = req.uri();
    if uri.scheme().is_some() {
        return uri.to_string();
    }

    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    format!("http://{host}{path}")
}

fn wants_body_logged(req: &Request) -> bool {
    let body_method = matches!(*req.method(), Method::POST | Method::PUT | Method::PATCH);
    let json = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    body_method && json
}

/// Whether the body declares a size, through its size hint or
/// `Content-Length`, no larger than [`MAX_LOGGED_BODY`].
fn fits_log_limit(req: &Request) -> bool {
    let declared = req.body().size_hint().upper().or_else(|| {
        req.headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
    });
    declared.is_some_and(|len| len <= MAX_LOGGED_BODY as u64)
}

/// Read the whole body, parse it as a JSON object into `logged`, and put the
/// same bytes back. A body that cannot be read is answered here, since it is
/// already consumed; a body that is not a JSON object logs as empty.
async fn buffer_json_body(req: Request, logged: &mut Map<String, Value>) -> Result<Request, Response> {
    let (parts, body) = req.into_parts();

    let bytes: Bytes = match axum::body::to_bytes(body, MAX_LOGGED_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Error reading request body: {}", e);
            return Err(ApiError::Rejected(StatusCode::BAD_REQUEST, "Failed to read request body".into()).into_response());
        }
    };

    *logged = match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => map,
        Ok(_) => Map::new(),
        Err(e) => {
            warn!("Error parsing request body: {}", e);
            Map::new()
        }
    };

    Ok(Request::from_parts(parts, Body::from(bytes)))
}

fn describe(
    method: &Method,
    url: &str,
    query_params: &BTreeMap<String, String>,
    body: &Map<String, Value>,
    status_code: u16,
) -> String {
    let mut text = format!("{method} request sent to {url}");

    if query_params.is_empty() {
        text.push_str(" with no query params");
    } else {
        let params = serde_json::to_string(query_params).unwrap_or_default();
        text.push_str(&format!(" with query params {params}"));
    }

    if body.is_empty() {
        text.push_str(" with no body");
    } else {
        let body = serde_json::to_string(body).unwrap_or_default();
        text.push_str(&format!(" with body {body}"));
    }

    text.push_str(&format!(" with status code {status_code}"));
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_describe_without_extras() {
        let text = describe(&Method::GET, "http://localhost/posts", &BTreeMap::new(), &Map::new(), 200);
        assert_eq!(
            text,
            "GET request sent to http://localhost/posts with no query params with no body with status code 200"
        );
    }

    #[test]
    fn test_describe_with_params_and_body() {
        let params: BTreeMap<String, String> = [("sort".to_string(), "top".to_string())].into_iter().collect();
        let Value::Object(body) = json!({ "title": "hi" }) else { unreachable!() };

        let text = describe(&Method::POST, "http://localhost/posts/create", &params, &body, 201);
        assert!(text.contains(r#"with query params {"sort":"top"}"#));
        assert!(text.contains(r#"with body {"title":"hi"}"#));
        assert!(text.ends_with("with status code 201"));
    }

    #[test]
    fn test_request_url_uses_host() {
        let req = Request::builder()
            .uri("/posts?sort=new")
            .header(header::HOST, "example.test:8000")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_url(&req), "http://example.test:8000/posts?sort=new");
    }

    #[test]
    fn test_only_json_writes_are_buffered() {
        let json_post = Request::builder()
            .method(Method::POST)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::empty())
            .unwrap();
        let form_post = Request::builder()
            .method(Method::POST)
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::empty())
            .unwrap();
        let json_get = Request::builder()
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::empty())
            .unwrap();

        assert!(wants_body_logged(&json_post));
        assert!(!wants_body_logged(&form_post));
        assert!(!wants_body_logged(&json_get));
    }

    #[test]
    fn test_oversized_body_skips_capture() {
        let small = Request::builder().body(Body::from(vec![b' '; 1024])).unwrap();
        let exact = Request::builder().body(Body::from(vec![b' '; MAX_LOGGED_BODY])).unwrap();
        let big = Request::builder().body(Body::from(vec![b' '; MAX_LOGGED_BODY + 1])).unwrap();

        assert!(fits_log_limit(&small));
        assert!(fits_log_limit(&exact));
        assert!(!fits_log_limit(&big));
    }

    #[tokio::test]
    async fn test_buffered_body_is_put_back() {
        let req = Request::builder()
            .method(Method::POST)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"title":"hi"}"#))
            .unwrap();

        let mut logged = Map::new();
        let req = buffer_json_body(req, &mut logged).await.unwrap();
        assert_eq!(logged.get("title"), Some(&json!("hi")));

        let bytes = axum::body::to_bytes(req.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], br#"{"title":"hi"}"#);
    }
}
