use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::core::time::now_utc;
use crate::model::types::AttemptKind;
use crate::schemas::attempt::{
    AttemptStateQuery, AttemptStateResponse, QuestionEntryResponse, QuestionListQuery,
    QuestionListResponse, SubmitRequest, TestResultResponse,
};
use crate::services::{aggregate, answered::AnsweredState, answers, lifecycle, question_groups};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/:kind/:owner_id/state", get(attempt_state))
        .route("/submissions/:submission_id/questions", get(question_list))
        .route("/submissions/:submission_id/submit", post(submit))
}

/// Resolve the caller's attempt for a test or competition, creating the
/// submission row when the window is open and none exists yet.
async fn attempt_state(
    State(state): State<AppState>,
    Path((kind, owner_id)): Path<(String, String)>,
    Query(query): Query<AttemptStateQuery>,
) -> Result<Json<AttemptStateResponse>, ApiError> {
    let kind = parse_kind(&kind)?;

    let resolved =
        lifecycle::resolve_attempt(state.backend(), kind, &owner_id, &query.user_id, now_utc())
            .await
            .map_err(|err| ApiError::upstream(err, "Failed to resolve attempt state"))?;

    Ok(Json(AttemptStateResponse::from(&resolved)))
}

/// Flat ordered question list across all sections, annotated with the
/// answered flag for navigation.
async fn question_list(
    State(state): State<AppState>,
    Path(submission_id): Path<String>,
    Query(query): Query<QuestionListQuery>,
) -> Result<Json<QuestionListResponse>, ApiError> {
    let api = state.backend();

    let submission = api
        .get_submission(&submission_id)
        .await
        .map_err(|err| ApiError::upstream(err, "Failed to fetch submission"))?
        .ok_or_else(|| ApiError::NotFound(format!("Submission {submission_id} not found")))?;

    let test = api
        .get_test(&query.test_id)
        .await
        .map_err(|err| ApiError::upstream(err, "Failed to fetch test definition"))?;

    let mut sections = Vec::new();
    let mut answered = AnsweredState::new();
    for part in test.ordered_parts() {
        let section = question_groups::collect_section_questions(api, part)
            .await
            .map_err(|err| ApiError::upstream(err, "Failed to resolve section questions"))?;
        if section.is_empty() {
            continue;
        }

        let section_answers = answers::resolve_section_answers(api, &submission.id, &section)
            .await
            .map_err(|err| ApiError::upstream(err, "Failed to resolve section answers"))?;
        answered.absorb(section_answers.answered_question_ids().iter().map(String::as_str));

        sections.push(section);
    }

    let questions = question_groups::flatten(&sections)
        .iter()
        .map(|question| QuestionEntryResponse::new(question, answered.is_answered(&question.id)))
        .collect();

    Ok(Json(QuestionListResponse { submission_id: submission.id, questions }))
}

/// Score the attempt and finalize the submission. Returns the full result
/// object for the summary dialog.
async fn submit(
    State(state): State<AppState>,
    Path(submission_id): Path<String>,
    Json(payload): Json<SubmitRequest>,
) -> Result<Json<TestResultResponse>, ApiError> {
    payload.validate().map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let api = state.backend();

    let submission = api
        .get_submission(&submission_id)
        .await
        .map_err(|err| ApiError::upstream(err, "Failed to fetch submission"))?
        .ok_or_else(|| ApiError::NotFound(format!("Submission {submission_id} not found")))?;

    if submission.finalized {
        return Err(ApiError::Conflict("Submission is already finalized".to_string()));
    }

    let test = api
        .get_test(&payload.test_id)
        .await
        .map_err(|err| ApiError::upstream(err, "Failed to fetch test definition"))?;

    let eval_timeout = Duration::from_secs(state.settings().scoring().eval_timeout_seconds);
    let result = aggregate::submit_attempt(api, state.evaluator(), eval_timeout, &submission, &test)
        .await
        .map_err(|err| ApiError::internal(err, "Failed to score submission"))?;

    Ok(Json(TestResultResponse::from(&result)))
}

fn parse_kind(raw: &str) -> Result<AttemptKind, ApiError> {
    match raw {
        "test" => Ok(AttemptKind::Test),
        "competition" => Ok(AttemptKind::Competition),
        other => Err(ApiError::BadRequest(format!("Unknown attempt kind: {other}"))),
    }
}
