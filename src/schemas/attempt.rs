use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::model::types::SectionKind;
use crate::model::{SectionResult, Submission, TestResult};
use crate::services::lifecycle::AttemptState;
use crate::services::question_groups::QuestionRef;

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionResponse {
    pub(crate) id: String,
    pub(crate) owner_id: String,
    pub(crate) user_id: String,
    pub(crate) score: f64,
    pub(crate) finalized: bool,
    pub(crate) comment: Option<String>,
    pub(crate) strengths: Vec<String>,
    pub(crate) areas_to_improve: Vec<String>,
}

impl From<&Submission> for SubmissionResponse {
    fn from(submission: &Submission) -> Self {
        Self {
            id: submission.id.clone(),
            owner_id: submission.owner_id.clone(),
            user_id: submission.user_id.clone(),
            score: submission.score,
            finalized: submission.finalized,
            comment: submission.comment.clone(),
            strengths: submission.strengths.clone(),
            areas_to_improve: submission.areas_to_improve.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptStateResponse {
    pub(crate) state: &'static str,
    pub(crate) submission: Option<SubmissionResponse>,
}

impl From<&AttemptState> for AttemptStateResponse {
    fn from(state: &AttemptState) -> Self {
        Self { state: state.as_str(), submission: state.submission().map(SubmissionResponse::from) }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionEntryResponse {
    pub(crate) id: String,
    pub(crate) section: SectionKind,
    pub(crate) order: usize,
    pub(crate) answered: bool,
}

impl QuestionEntryResponse {
    pub(crate) fn new(question: &QuestionRef, answered: bool) -> Self {
        Self { id: question.id.clone(), section: question.kind, order: question.order, answered }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionListResponse {
    pub(crate) submission_id: String,
    pub(crate) questions: Vec<QuestionEntryResponse>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SubmitRequest {
    #[validate(length(min = 1, message = "test_id must not be empty"))]
    pub(crate) test_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AttemptStateQuery {
    pub(crate) user_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuestionListQuery {
    pub(crate) test_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SectionResultResponse {
    pub(crate) section: SectionKind,
    pub(crate) correct: u32,
    pub(crate) total: u32,
    pub(crate) score: f64,
    pub(crate) weighted: f64,
    pub(crate) degraded: bool,
}

impl From<&SectionResult> for SectionResultResponse {
    fn from(result: &SectionResult) -> Self {
        Self {
            section: result.kind,
            correct: result.correct,
            total: result.total,
            score: result.score,
            weighted: result.weighted,
            degraded: result.degraded,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TestResultResponse {
    pub(crate) submission_id: String,
    pub(crate) overall: f64,
    pub(crate) parts: Vec<SectionResultResponse>,
    pub(crate) comment: Option<String>,
    pub(crate) strengths: Vec<String>,
    pub(crate) areas_to_improve: Vec<String>,
}

impl From<&TestResult> for TestResultResponse {
    fn from(result: &TestResult) -> Self {
        Self {
            submission_id: result.submission_id.clone(),
            overall: result.overall,
            parts: result.parts.iter().map(SectionResultResponse::from).collect(),
            comment: result.comment.clone(),
            strengths: result.strengths.clone(),
            areas_to_improve: result.areas_to_improve.clone(),
        }
    }
}
