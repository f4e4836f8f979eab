use std::collections::HashMap;
use std::time::Duration;

use futures::future::join_all;

use crate::clients::backend::StudyApi;
use crate::clients::evaluation::Evaluator;
use crate::model::types::SectionKind;
use crate::model::{
    ChoiceAnswer, ChoiceQuestion, SectionResult, SpeakingAnswer, SpeakingQuestion, WritingAnswer,
    WritingQuestion,
};

/// Each of the six section kinds owns an equal share of the 100-point scale.
pub(crate) const SECTION_WEIGHT: f64 = 100.0 / 6.0;

fn make_result(kind: SectionKind, correct: u32, total: u32, score: f64) -> SectionResult {
    SectionResult {
        kind,
        correct,
        total,
        score,
        weighted: score / 100.0 * SECTION_WEIGHT,
        degraded: false,
    }
}

/// Zero-score placeholder for a section whose evaluation failed outright.
pub(crate) fn degraded_result(kind: SectionKind, total: u32) -> SectionResult {
    SectionResult { kind, correct: 0, total, score: 0.0, weighted: 0.0, degraded: true }
}

/// `score = 100 × correct / total`; a zero-question section produces no
/// result at all.
pub(crate) fn score_choice_section(
    kind: SectionKind,
    questions: &[ChoiceQuestion],
    answers: &[ChoiceAnswer],
) -> Option<SectionResult> {
    let total = questions.len() as u32;
    if total == 0 {
        return None;
    }

    let by_question: HashMap<&str, &ChoiceQuestion> =
        questions.iter().map(|question| (question.id.as_str(), question)).collect();

    let correct = answers
        .iter()
        .filter(|answer| {
            let Some(option_id) = answer.option_id.as_deref() else {
                return false;
            };
            by_question
                .get(answer.question_id.as_str())
                .map(|question| {
                    question.options.iter().any(|option| option.id == option_id && option.correct)
                })
                .unwrap_or(false)
        })
        .count() as u32;

    let score = f64::from(correct) / f64::from(total) * 100.0;
    Some(make_result(kind, correct, total, score))
}

/// Each answered prompt is fetched as audio and evaluated remotely under a
/// hard timeout; a failed or timed-out answer contributes zero. Section
/// percentage is the score sum over the total question count.
pub(crate) async fn score_speaking_section(
    api: &dyn StudyApi,
    evaluator: &dyn Evaluator,
    eval_timeout: Duration,
    questions: &[SpeakingQuestion],
    answers: &[SpeakingAnswer],
) -> Option<SectionResult> {
    let total = questions.len() as u32;
    if total == 0 {
        return None;
    }

    let prompts: HashMap<&str, &str> = questions
        .iter()
        .map(|question| (question.id.as_str(), question.prompt.as_str()))
        .collect();

    let evaluations = answers.iter().filter_map(|answer| {
        let prompt = *prompts.get(answer.question_id.as_str())?;
        let audio_url = answer.audio_url.as_deref()?.trim();
        if audio_url.is_empty() {
            return None;
        }
        Some(evaluate_speaking_answer(api, evaluator, eval_timeout, answer, audio_url, prompt))
    });

    let scores: Vec<Option<f64>> = join_all(evaluations).await;

    let evaluated = scores.iter().flatten().count() as u32;
    let sum: f64 = scores.iter().flatten().sum();
    let score = (sum / f64::from(total)).clamp(0.0, 100.0);

    Some(make_result(SectionKind::Speaking, evaluated, total, score))
}

async fn evaluate_speaking_answer(
    api: &dyn StudyApi,
    evaluator: &dyn Evaluator,
    eval_timeout: Duration,
    answer: &SpeakingAnswer,
    audio_url: &str,
    prompt: &str,
) -> Option<f64> {
    let audio = match api.fetch_audio(audio_url).await {
        Ok(audio) => audio,
        Err(err) => {
            tracing::warn!(question_id = %answer.question_id, error = %err, "Failed to fetch speaking audio");
            return None;
        }
    };

    let evaluation =
        match tokio::time::timeout(eval_timeout, evaluator.evaluate_speech(&audio, prompt)).await {
            Ok(Ok(evaluation)) => evaluation,
            Ok(Err(err)) => {
                tracing::warn!(question_id = %answer.question_id, error = %err, "Speech evaluation failed");
                return None;
            }
            Err(_) => {
                tracing::warn!(
                    question_id = %answer.question_id,
                    timeout_seconds = eval_timeout.as_secs(),
                    "Speech evaluation timed out"
                );
                return None;
            }
        };

    let score = evaluation.score.clamp(0.0, 100.0);

    // Best effort: a failed write-back must not void a finished evaluation.
    if let Err(err) =
        api.patch_speaking_answer(&answer.id, score, &evaluation.transcript).await
    {
        tracing::warn!(answer_id = %answer.id, error = %err, "Failed to persist speaking score");
    }

    Some(score)
}

/// Like speaking, with the essay content and topic sent to the remote
/// scorer. Blank essays are never sent.
pub(crate) async fn score_writing_section(
    api: &dyn StudyApi,
    evaluator: &dyn Evaluator,
    eval_timeout: Duration,
    questions: &[WritingQuestion],
    answers: &[WritingAnswer],
) -> Option<SectionResult> {
    let total = questions.len() as u32;
    if total == 0 {
        return None;
    }

    let topics: HashMap<&str, &str> = questions
        .iter()
        .map(|question| (question.id.as_str(), question.topic.as_str()))
        .collect();

    let evaluations = answers.iter().filter_map(|answer| {
        let topic = *topics.get(answer.question_id.as_str())?;
        let content = answer.content.as_deref()?.trim();
        if content.is_empty() {
            return None;
        }
        Some(evaluate_writing_answer(api, evaluator, eval_timeout, answer, content, topic))
    });

    let scores: Vec<Option<f64>> = join_all(evaluations).await;

    let evaluated = scores.iter().flatten().count() as u32;
    let sum: f64 = scores.iter().flatten().sum();
    let score = (sum / f64::from(total)).clamp(0.0, 100.0);

    Some(make_result(SectionKind::Writing, evaluated, total, score))
}

async fn evaluate_writing_answer(
    api: &dyn StudyApi,
    evaluator: &dyn Evaluator,
    eval_timeout: Duration,
    answer: &WritingAnswer,
    content: &str,
    topic: &str,
) -> Option<f64> {
    let evaluation =
        match tokio::time::timeout(eval_timeout, evaluator.score_writing(content, topic)).await {
            Ok(Ok(evaluation)) => evaluation,
            Ok(Err(err)) => {
                tracing::warn!(question_id = %answer.question_id, error = %err, "Writing evaluation failed");
                return None;
            }
            Err(_) => {
                tracing::warn!(
                    question_id = %answer.question_id,
                    timeout_seconds = eval_timeout.as_secs(),
                    "Writing evaluation timed out"
                );
                return None;
            }
        };

    let score = evaluation.score.clamp(0.0, 100.0);

    if let Err(err) =
        api.patch_writing_answer(&answer.id, score, evaluation.feedback.as_deref()).await
    {
        tracing::warn!(answer_id = %answer.id, error = %err, "Failed to persist writing score");
    }

    Some(score)
}
