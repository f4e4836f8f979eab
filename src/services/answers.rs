use anyhow::{Context, Result};

use crate::clients::backend::StudyApi;
use crate::model::{ChoiceAnswer, SpeakingAnswer, WritingAnswer};
use crate::services::question_groups::{SectionItems, SectionQuestions};

/// The answer records that exist for one section. A question with no record
/// is simply unanswered; resolvers never invent placeholder rows.
#[derive(Debug, Clone)]
pub(crate) enum SectionAnswers {
    Choice(Vec<ChoiceAnswer>),
    Speaking(Vec<SpeakingAnswer>),
    Writing(Vec<WritingAnswer>),
}

impl SectionAnswers {
    /// Question ids that carry an actual answer payload. An empty selection,
    /// a blank audio url or empty essay content does not count as answered.
    pub(crate) fn answered_question_ids(&self) -> Vec<String> {
        match self {
            SectionAnswers::Choice(answers) => answers
                .iter()
                .filter(|answer| answer.option_id.is_some())
                .map(|answer| answer.question_id.clone())
                .collect(),
            SectionAnswers::Speaking(answers) => answers
                .iter()
                .filter(|answer| {
                    answer.audio_url.as_deref().is_some_and(|url| !url.trim().is_empty())
                })
                .map(|answer| answer.question_id.clone())
                .collect(),
            SectionAnswers::Writing(answers) => answers
                .iter()
                .filter(|answer| {
                    answer.content.as_deref().is_some_and(|content| !content.trim().is_empty())
                })
                .map(|answer| answer.question_id.clone())
                .collect(),
        }
    }
}

/// Fetch the submitted answers for a resolved section, shaped per kind.
pub(crate) async fn resolve_section_answers(
    api: &dyn StudyApi,
    submission_id: &str,
    section: &SectionQuestions,
) -> Result<SectionAnswers> {
    let question_ids = section.question_ids();

    let answers = match &section.items {
        SectionItems::Choice(_) => SectionAnswers::Choice(
            api.choice_answers(submission_id, &question_ids)
                .await
                .with_context(|| format!("Failed to fetch {} answers", section.kind.as_str()))?,
        ),
        SectionItems::Speaking(_) => SectionAnswers::Speaking(
            api.speaking_answers(submission_id, &question_ids)
                .await
                .context("Failed to fetch speaking answers")?,
        ),
        SectionItems::Writing(_) => SectionAnswers::Writing(
            api.writing_answers(submission_id, &question_ids)
                .await
                .context("Failed to fetch writing answers")?,
        ),
    };

    Ok(answers)
}
