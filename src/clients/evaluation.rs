use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::config::Settings;

#[derive(Debug, Clone)]
pub(crate) struct SpeechEvaluation {
    pub(crate) score: f64,
    pub(crate) transcript: String,
}

#[derive(Debug, Clone)]
pub(crate) struct WritingEvaluation {
    pub(crate) score: f64,
    pub(crate) feedback: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct TestFeedback {
    pub(crate) feedback: Option<String>,
    pub(crate) strengths: Vec<String>,
    pub(crate) areas_to_improve: Vec<String>,
}

/// Remote speech/essay evaluators. Opaque: this service only defines the
/// request shape it sends and the fields it reads back.
#[async_trait]
pub(crate) trait Evaluator: Send + Sync {
    async fn evaluate_speech(&self, audio: &[u8], expected_text: &str)
        -> Result<SpeechEvaluation>;
    async fn score_writing(&self, content: &str, topic: &str) -> Result<WritingEvaluation>;
    async fn comment_test(&self, summary: &Value) -> Result<TestFeedback>;
}

#[derive(Debug, Clone)]
pub(crate) struct HttpEvaluator {
    client: Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
}

impl HttpEvaluator {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.evaluation().request_timeout);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .build()
            .context("Failed to build evaluation HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.evaluation().base_url.trim_end_matches('/').to_string(),
            api_key: settings.evaluation().api_key.clone(),
            max_retries: settings.evaluation().max_retries,
        })
    }

    /// POST with exponential backoff. Evaluation calls are idempotent on the
    /// remote side, so retrying a failed or 5xx response is safe.
    async fn post_with_retry(&self, path: &str, payload: &Value) -> Result<Value> {
        let url = format!("{}{path}", self.base_url);
        let timer = Instant::now();
        let mut last_error = None;
        let mut body = Value::Null;

        for attempt in 0..=self.max_retries {
            let response =
                self.client.post(&url).bearer_auth(&self.api_key).json(payload).send().await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    body = resp.json().await.unwrap_or(Value::Null);
                    if status.is_success() {
                        last_error = None;
                        break;
                    }
                    last_error = Some(anyhow::anyhow!("evaluation API error ({status}): {body}"));
                    if status.is_client_error() {
                        break;
                    }
                }
                Err(err) => {
                    last_error =
                        Some(anyhow::anyhow!(err).context("Failed to call evaluation API"));
                }
            }

            if attempt < self.max_retries {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }
        }

        if let Some(err) = last_error {
            return Err(err);
        }

        tracing::debug!(
            path,
            duration_seconds = timer.elapsed().as_secs_f64(),
            "evaluation call completed"
        );

        Ok(body)
    }
}

#[async_trait]
impl Evaluator for HttpEvaluator {
    async fn evaluate_speech(
        &self,
        audio: &[u8],
        expected_text: &str,
    ) -> Result<SpeechEvaluation> {
        let payload = json!({
            "audio": format!("data:audio/mpeg;base64,{}", STANDARD.encode(audio)),
            "expected_text": expected_text,
        });

        let body = self.post_with_retry("/speech/evaluations", &payload).await?;

        let score = body
            .get("score")
            .and_then(|value| value.as_f64())
            .context("Missing score in speech evaluation response")?;
        let transcript = body
            .get("transcript")
            .and_then(|value| value.as_str())
            .unwrap_or_default()
            .to_string();

        Ok(SpeechEvaluation { score, transcript })
    }

    async fn score_writing(&self, content: &str, topic: &str) -> Result<WritingEvaluation> {
        let payload = json!({ "content": content, "topic": topic });

        let body = self.post_with_retry("/writing/scores", &payload).await?;

        let score = body
            .get("score")
            .and_then(|value| value.as_f64())
            .context("Missing score in writing evaluation response")?;
        let feedback =
            body.get("feedback").and_then(|value| value.as_str()).map(|value| value.to_string());

        Ok(WritingEvaluation { score, feedback })
    }

    async fn comment_test(&self, summary: &Value) -> Result<TestFeedback> {
        let payload = json!({ "answers": summary });

        let body = self.post_with_retry("/test-comments", &payload).await?;

        let feedback =
            body.get("feedback").and_then(|value| value.as_str()).map(|value| value.to_string());
        let strengths = string_list(body.get("strengths"));
        let areas_to_improve = string_list(body.get("areas_to_improve"));

        Ok(TestFeedback { feedback, strengths, areas_to_improve })
    }
}

/// Exponential backoff capped at 64s; a misconfigured retry count must not
/// overflow the exponent or sleep for hours.
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2_u64.pow(attempt.min(6)))
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(|value| value.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str())
                .map(|item| item.to_string())
                .collect()
        })
        .unwrap_or_default()
}
