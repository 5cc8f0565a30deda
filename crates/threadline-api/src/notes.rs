use axum::{
    Extension, Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use serde_json::json;

use threadline_db::models::NoteRow;
use threadline_types::LogPayload;
use threadline_types::actions::UpdateType;
use threadline_types::api::{NoteRequest, NoteResponse};

use crate::error::ApiError;
use crate::middleware::current_user;
use crate::session::SessionId;
use crate::state::AppState;

fn note_response(note: NoteRow) -> NoteResponse {
    NoteResponse {
        id: note.id,
        title: note.title,
        content: note.content,
        user_id: note.user_id,
        created_at: note.created_at,
        updated_at: note.updated_at,
    }
}

fn note_values(note: &NoteRow) -> serde_json::Value {
    json!({
        "id": note.id,
        "title": note.title,
        "content": note.content,
        "created_at": note.created_at,
        "updated_at": note.updated_at,
    })
}

pub async fn list_notes(State(state): State<AppState>) -> Result<Json<Vec<NoteResponse>>, ApiError> {
    let notes = state.db.list_notes()?;
    Ok(Json(notes.into_iter().map(note_response).collect()))
}

pub async fn get_note(
    State(state): State<AppState>,
    Path(note_id): Path<i64>,
) -> Result<Json<NoteResponse>, ApiError> {
    let note = state.db.get_note(note_id)?.ok_or(ApiError::NotFound("Note"))?;
    Ok(Json(note_response(note)))
}

pub async fn create_note(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    headers: HeaderMap,
    WithRejection(Json(req), _): WithRejection<Json<NoteRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&state, &headers)?;
    let note = state.db.create_note(&user.id, &req.title, &req.content)?;

    state.logger.record(
        session.as_str(),
        LogPayload::db_update(
            "notes",
            UpdateType::Insert,
            format!(
                "Note {} created in database with id {}, title {}, content {}",
                note.title, note.id, note.title, note.content
            ),
            note_values(&note),
        ),
    );

    Ok((StatusCode::CREATED, Json(note_response(note))))
}

/// Fetch a note and check the caller owns it.
fn owned_note(state: &AppState, note_id: i64, user_id: &str) -> Result<NoteRow, ApiError> {
    let note = state.db.get_note(note_id)?.ok_or(ApiError::NotFound("Note"))?;
    if note.user_id != user_id {
        return Err(ApiError::Forbidden("Not the owner of this note".into()));
    }
    Ok(note)
}

pub async fn update_note(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Path(note_id): Path<i64>,
    headers: HeaderMap,
    WithRejection(Json(req), _): WithRejection<Json<NoteRequest>, ApiError>,
) -> Result<Json<NoteResponse>, ApiError> {
    let user = current_user(&state, &headers)?;
    owned_note(&state, note_id, &user.id)?;

    let note = state
        .db
        .update_note(note_id, &req.title, &req.content)?
        .ok_or(ApiError::NotFound("Note"))?;

    state.logger.record(
        session.as_str(),
        LogPayload::db_update(
            "notes",
            UpdateType::Update,
            format!(
                "Note {} updated in database with id {}, title {}, content {}",
                note.title, note.id, note.title, note.content
            ),
            note_values(&note),
        ),
    );

    Ok(Json(note_response(note)))
}

pub async fn delete_note(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Path(note_id): Path<i64>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&state, &headers)?;
    owned_note(&state, note_id, &user.id)?;

    let note = state.db.delete_note(note_id)?.ok_or(ApiError::NotFound("Note"))?;

    state.logger.record(
        session.as_str(),
        LogPayload::db_update(
            "notes",
            UpdateType::Delete,
            format!("Note {} deleted from database with id {}", note.title, note.id),
            json!({ "noteId": note.id }),
        ),
    );

    Ok(Json(json!({ "status": "deleted" })))
}
