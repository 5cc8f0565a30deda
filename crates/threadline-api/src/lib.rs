pub mod action_log;
pub mod auth;
pub mod comment_tree;
pub mod comments;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod notes;
pub mod posts;
pub mod saved;
pub mod session;
pub mod state;
pub mod synthetic;
pub mod votes;

use axum::{
    Json, Router,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};
use serde_json::{Value, json};

pub use error::ApiError;
pub use state::{AppState, AppStateInner};

/// Every route, wrapped in the request-logging middleware. CORS and tracing
/// layers are added by the binary.
pub fn router(state: AppState) -> Router {
    let user_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/debug/users", get(auth::list_users))
        .route("/users/{id}", delete(auth::delete_user))
        .route("/users/{id}/comments", get(comments::comments_by_user));

    let note_routes = Router::new()
        .route("/notes", get(notes::list_notes).post(notes::create_note))
        .route(
            "/notes/{id}",
            get(notes::get_note).put(notes::update_note).delete(notes::delete_note),
        );

    let post_routes = Router::new()
        .route("/posts", get(posts::list_posts))
        .route("/posts/create", post(posts::create_post))
        .route(
            "/posts/{id}",
            get(posts::get_post).put(posts::update_post).delete(posts::delete_post),
        )
        .route("/posts/{id}/comments", get(comments::get_post_comments))
        .route("/posts/{id}/save", post(saved::save_post).delete(saved::unsave_post))
        .route("/search", get(posts::search_posts))
        .route("/vote", post(votes::vote_on_post));

    let comment_routes = Router::new()
        .route("/comments", post(comments::create_comment))
        .route(
            "/comments/{id}",
            get(comments::get_comment)
                .put(comments::update_comment)
                .delete(comments::delete_comment),
        )
        .route("/comments/{id}/vote", post(votes::vote_on_comment))
        .route("/comments/{id}/save", post(saved::save_comment).delete(saved::unsave_comment))
        .route("/saved", get(saved::list_saved));

    let message_routes = Router::new()
        .route("/messages", get(messages::inbox).post(messages::send_message))
        .route("/messages/thread", get(messages::thread))
        .route("/messages/{user_id}", get(messages::conversation_with));

    let synthetic_routes = Router::new()
        .route("/_synthetic/reset", post(synthetic::reset))
        .route("/_synthetic/new_session", post(synthetic::new_session))
        .route("/_synthetic/log_event", post(synthetic::log_event))
        .route("/_synthetic/logs", get(synthetic::get_logs));

    Router::new()
        .route("/", get(health))
        .merge(user_routes)
        .merge(note_routes)
        .merge(post_routes)
        .merge(comment_routes)
        .merge(message_routes)
        .merge(synthetic_routes)
        .layer(from_fn_with_state(state.clone(), middleware::log_requests))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "message": "Threadline API is running" }))
}
