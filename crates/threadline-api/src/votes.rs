use axum::{
    Extension, Json,
    extract::{Path, State},
};
use axum_extra::extract::WithRejection;
use serde_json::json;
use tracing::debug;

use threadline_db::models::{VoteChange, VoteOutcome};
use threadline_types::LogPayload;
use threadline_types::actions::UpdateType;
use threadline_types::api::{CommentVoteRequest, CommentVoteResponse, PostVoteRequest, PostVoteResponse};

use crate::error::ApiError;
use crate::session::SessionId;
use crate::state::{AppState, run_blocking};

const VOTE_RECORDED: &str = "Vote recorded";
const VOTE_UNCHANGED: &str = "Vote unchanged";

fn outcome_message(outcome: &VoteOutcome) -> &'static str {
    if outcome.is_unchanged() { VOTE_UNCHANGED } else { VOTE_RECORDED }
}

fn update_type(change: VoteChange) -> UpdateType {
    match change {
        VoteChange::Inserted => UpdateType::Insert,
        VoteChange::Removed => UpdateType::Delete,
        VoteChange::Updated | VoteChange::Unchanged => UpdateType::Update,
    }
}

/// Log a vote that changed something. Unchanged votes leave no trace.
fn log_vote(
    state: &AppState,
    session: &SessionId,
    table: &str,
    target: (&str, i64),
    user_id: &str,
    outcome: &VoteOutcome,
) {
    if outcome.is_unchanged() {
        return;
    }

    let (target_column, target_id) = target;
    state.logger.record(
        session.as_str(),
        LogPayload::db_update(
            table,
            update_type(outcome.change),
            format!(
                "Vote by user {} on {} {} changed from {:?} to {:?}, total now {}",
                user_id, target_column, target_id, outcome.previous, outcome.current, outcome.total
            ),
            json!({
                target_column: target_id,
                "user_id": user_id,
                "old_value": outcome.previous,
                "new_value": outcome.current,
                "total": outcome.total,
            }),
        ),
    );
}

pub async fn vote_on_post(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    WithRejection(Json(req), _): WithRejection<Json<PostVoteRequest>, ApiError>,
) -> Result<Json<PostVoteResponse>, ApiError> {
    let db = state.db.clone();
    let user_id = req.user_id.clone();
    let value = req.vote.value();

    let outcome = run_blocking(move || {
        if db.get_user_by_id(&user_id)?.is_none() {
            return Err(ApiError::NotFound("User"));
        }
        db.record_post_vote(req.post_id, &user_id, value)?
            .ok_or(ApiError::NotFound("Post"))
    })
    .await?;

    debug!("Post {} vote by {}: {:?}", req.post_id, req.user_id, outcome.change);
    log_vote(&state, &session, "votes", ("post_id", req.post_id), &req.user_id, &outcome);

    Ok(Json(PostVoteResponse {
        message: outcome_message(&outcome).to_string(),
        new_votes: outcome.total,
    }))
}

pub async fn vote_on_comment(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Path(comment_id): Path<i64>,
    WithRejection(Json(req), _): WithRejection<Json<CommentVoteRequest>, ApiError>,
) -> Result<Json<CommentVoteResponse>, ApiError> {
    if !matches!(req.value, -1..=1) {
        return Err(ApiError::Validation("Vote value must be 1, -1 or 0".into()));
    }

    let db = state.db.clone();
    let user_id = req.user_id.clone();
    let value = req.value;

    let outcome = run_blocking(move || {
        if db.get_user_by_id(&user_id)?.is_none() {
            return Err(ApiError::NotFound("User"));
        }
        db.record_comment_vote(comment_id, &user_id, value)?
            .ok_or(ApiError::NotFound("Comment"))
    })
    .await?;

    debug!("Comment {} vote by {}: {:?}", comment_id, req.user_id, outcome.change);
    log_vote(&state, &session, "comment_votes", ("comment_id", comment_id), &req.user_id, &outcome);

    Ok(Json(CommentVoteResponse {
        message: outcome_message(&outcome).to_string(),
        votes: outcome.total,
    }))
}
