pub(crate) mod types;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::model::types::SectionKind;

/// A user's attempt record for a test or competition. Created by the
/// lifecycle controller, mutated only by the aggregator at submit time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Submission {
    pub(crate) id: String,
    pub(crate) owner_id: String,
    pub(crate) user_id: String,
    pub(crate) score: f64,
    pub(crate) finalized: bool,
    #[serde(default)]
    pub(crate) comment: Option<String>,
    #[serde(default)]
    pub(crate) strengths: Vec<String>,
    #[serde(default)]
    pub(crate) areas_to_improve: Vec<String>,
}

/// Partial update applied to a submission row. Safe to send twice with the
/// same payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct SubmissionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) finalized: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) strengths: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) areas_to_improve: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TestDefinition {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) parts: Vec<TestPart>,
}

impl TestDefinition {
    /// Parts in the fixed navigation order, regardless of storage order.
    pub(crate) fn ordered_parts(&self) -> Vec<&TestPart> {
        let mut parts: Vec<&TestPart> = self.parts.iter().collect();
        parts.sort_by_key(|part| part.kind.order());
        parts
    }
}

/// A named section of a test. `item_ids` are terminal question ids for
/// vocabulary/grammar/writing and container ids for the compound kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TestPart {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) kind: SectionKind,
    pub(crate) item_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Competition {
    pub(crate) id: String,
    pub(crate) test_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) ends_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AnswerOption {
    pub(crate) id: String,
    pub(crate) content: String,
    pub(crate) correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ChoiceQuestion {
    pub(crate) id: String,
    pub(crate) content: String,
    pub(crate) options: Vec<AnswerOption>,
    pub(crate) active: bool,
}

/// Reading passage, listening exercise or speaking part holding child
/// question ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ItemContainer {
    pub(crate) id: String,
    pub(crate) active: bool,
    pub(crate) question_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SpeakingQuestion {
    pub(crate) id: String,
    pub(crate) prompt: String,
    pub(crate) active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct WritingQuestion {
    pub(crate) id: String,
    pub(crate) topic: String,
    pub(crate) active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ChoiceAnswer {
    pub(crate) id: String,
    pub(crate) submission_id: String,
    pub(crate) question_id: String,
    pub(crate) option_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SpeakingAnswer {
    pub(crate) id: String,
    pub(crate) submission_id: String,
    pub(crate) question_id: String,
    pub(crate) audio_url: Option<String>,
    #[serde(default)]
    pub(crate) transcript: Option<String>,
    #[serde(default)]
    pub(crate) score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct WritingAnswer {
    pub(crate) id: String,
    pub(crate) submission_id: String,
    pub(crate) question_id: String,
    pub(crate) content: Option<String>,
    #[serde(default)]
    pub(crate) score: Option<f64>,
}

/// Derived per-section outcome. Never persisted as its own row.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct SectionResult {
    pub(crate) kind: SectionKind,
    /// Correctly answered (choice) or successfully evaluated
    /// (speaking/writing) question count.
    pub(crate) correct: u32,
    pub(crate) total: u32,
    /// Raw section percentage in [0, 100].
    pub(crate) score: f64,
    /// This section's share of the overall scale: `score / 100 * (100 / 6)`.
    pub(crate) weighted: f64,
    /// Set when the section could not be scored and fell back to zero.
    pub(crate) degraded: bool,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct TestResult {
    pub(crate) submission_id: String,
    pub(crate) overall: f64,
    pub(crate) parts: Vec<SectionResult>,
    pub(crate) comment: Option<String>,
    pub(crate) strengths: Vec<String>,
    pub(crate) areas_to_improve: Vec<String>,
}
