use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use futures::future::join_all;
use serde_json::json;

use crate::clients::backend::StudyApi;
use crate::clients::evaluation::{Evaluator, TestFeedback};
use crate::model::{SectionResult, Submission, SubmissionPatch, TestDefinition, TestResult};
use crate::services::answers::{self, SectionAnswers};
use crate::services::question_groups::{self, SectionItems};
use crate::services::scoring;

/// Score every defined section of the test concurrently, combine the
/// weighted contributions into one overall score and finalize the
/// submission. One section failing degrades that section to a zero-score
/// entry; it never aborts the sibling sections or the aggregation.
pub(crate) async fn submit_attempt(
    api: &dyn StudyApi,
    evaluator: &dyn Evaluator,
    eval_timeout: Duration,
    submission: &Submission,
    test: &TestDefinition,
) -> Result<TestResult> {
    let timer = Instant::now();
    tracing::info!(submission_id = %submission.id, test_id = %test.id, "Scoring submission");

    let parts = test.ordered_parts();
    let outcomes = join_all(
        parts.iter().map(|part| score_section(api, evaluator, eval_timeout, &submission.id, part)),
    )
    .await;

    let mut results: Vec<SectionResult> = Vec::new();
    for (part, outcome) in parts.iter().zip(outcomes) {
        match outcome {
            Ok(Some(result)) => results.push(result),
            // No active questions: the section is absent from the breakdown.
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(
                    submission_id = %submission.id,
                    section = part.kind.as_str(),
                    error = %err,
                    "Section scoring failed; degrading to zero"
                );
                metrics::counter!("section_scoring_failures_total", "section" => part.kind.as_str())
                    .increment(1);
                results.push(scoring::degraded_result(part.kind, 0));
            }
        }
    }

    let overall: f64 =
        results.iter().map(|result| result.weighted).sum::<f64>().clamp(0.0, 100.0);

    let feedback = request_feedback(evaluator, eval_timeout, &results, overall).await;

    let patch = SubmissionPatch {
        score: Some(overall),
        finalized: Some(true),
        comment: feedback.feedback.clone(),
        strengths: Some(feedback.strengths.clone()),
        areas_to_improve: Some(feedback.areas_to_improve.clone()),
    };
    api.patch_submission(&submission.id, &patch)
        .await
        .context("Failed to finalize submission")?;

    let duration = timer.elapsed().as_secs_f64();
    metrics::counter!("scoring_jobs_total", "status" => "success").increment(1);
    metrics::histogram!("scoring_duration_seconds").record(duration);
    tracing::info!(
        submission_id = %submission.id,
        overall,
        sections = results.len(),
        duration_seconds = duration,
        "Submission scored"
    );

    Ok(TestResult {
        submission_id: submission.id.clone(),
        overall,
        parts: results,
        comment: feedback.feedback,
        strengths: feedback.strengths,
        areas_to_improve: feedback.areas_to_improve,
    })
}

/// Resolve and score one test part. `Ok(None)` means the section has no
/// active questions and is excluded from the breakdown entirely.
async fn score_section(
    api: &dyn StudyApi,
    evaluator: &dyn Evaluator,
    eval_timeout: Duration,
    submission_id: &str,
    part: &crate::model::TestPart,
) -> Result<Option<SectionResult>> {
    let section = question_groups::collect_section_questions(api, part).await?;
    if section.is_empty() {
        return Ok(None);
    }

    let answers = answers::resolve_section_answers(api, submission_id, &section).await?;

    let result = match (&section.items, &answers) {
        (SectionItems::Choice(questions), SectionAnswers::Choice(answers)) => {
            scoring::score_choice_section(part.kind, questions, answers)
        }
        (SectionItems::Speaking(questions), SectionAnswers::Speaking(answers)) => {
            scoring::score_speaking_section(api, evaluator, eval_timeout, questions, answers).await
        }
        (SectionItems::Writing(questions), SectionAnswers::Writing(answers)) => {
            scoring::score_writing_section(api, evaluator, eval_timeout, questions, answers).await
        }
        _ => anyhow::bail!("mismatched section items and answers for {}", part.kind.as_str()),
    };

    Ok(result)
}

/// Holistic feedback is a nicety, not a gate: any failure leaves the result
/// without comment rather than failing the submit.
async fn request_feedback(
    evaluator: &dyn Evaluator,
    eval_timeout: Duration,
    results: &[SectionResult],
    overall: f64,
) -> TestFeedback {
    let summary = json!({
        "overall": overall,
        "sections": results
            .iter()
            .map(|result| {
                json!({
                    "section": result.kind.as_str(),
                    "correct": result.correct,
                    "total": result.total,
                    "score": result.score,
                })
            })
            .collect::<Vec<_>>(),
    });

    match tokio::time::timeout(eval_timeout, evaluator.comment_test(&summary)).await {
        Ok(Ok(feedback)) => feedback,
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "Test feedback request failed");
            TestFeedback::default()
        }
        Err(_) => {
            tracing::warn!(
                timeout_seconds = eval_timeout.as_secs(),
                "Test feedback request timed out"
            );
            TestFeedback::default()
        }
    }
}
