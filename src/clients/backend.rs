use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use uuid::Uuid;

use crate::core::config::Settings;
use crate::model::types::SectionKind;
use crate::model::{
    ChoiceAnswer, ChoiceQuestion, Competition, ItemContainer, SpeakingAnswer, SpeakingQuestion,
    Submission, SubmissionPatch, TestDefinition, WritingAnswer, WritingQuestion,
};

/// Seam to the study-platform CRUD backend. Everything the orchestration
/// core reads or writes goes through here; tests swap in a mock.
#[async_trait]
pub(crate) trait StudyApi: Send + Sync {
    async fn get_test(&self, test_id: &str) -> Result<TestDefinition>;
    async fn get_competition(&self, competition_id: &str) -> Result<Competition>;

    async fn get_submission(&self, submission_id: &str) -> Result<Option<Submission>>;
    async fn find_submission(
        &self,
        owner_id: &str,
        user_id: &str,
        finalized: bool,
    ) -> Result<Option<Submission>>;
    async fn create_submission(&self, owner_id: &str, user_id: &str) -> Result<Submission>;
    async fn patch_submission(&self, submission_id: &str, patch: &SubmissionPatch) -> Result<()>;

    async fn choice_questions(&self, ids: &[String]) -> Result<Vec<ChoiceQuestion>>;
    async fn containers(&self, kind: SectionKind, ids: &[String]) -> Result<Vec<ItemContainer>>;
    async fn speaking_questions(&self, ids: &[String]) -> Result<Vec<SpeakingQuestion>>;
    async fn writing_questions(&self, ids: &[String]) -> Result<Vec<WritingQuestion>>;

    async fn choice_answers(
        &self,
        submission_id: &str,
        question_ids: &[String],
    ) -> Result<Vec<ChoiceAnswer>>;
    async fn speaking_answers(
        &self,
        submission_id: &str,
        question_ids: &[String],
    ) -> Result<Vec<SpeakingAnswer>>;
    async fn writing_answers(
        &self,
        submission_id: &str,
        question_ids: &[String],
    ) -> Result<Vec<WritingAnswer>>;

    async fn patch_speaking_answer(
        &self,
        answer_id: &str,
        score: f64,
        transcript: &str,
    ) -> Result<()>;
    async fn patch_writing_answer(
        &self,
        answer_id: &str,
        score: f64,
        feedback: Option<&str>,
    ) -> Result<()>;

    async fn fetch_audio(&self, url: &str) -> Result<Vec<u8>>;

    async fn health(&self) -> Result<()>;
}

#[derive(Debug, Clone)]
pub(crate) struct HttpStudyApi {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpStudyApi {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.backend().request_timeout);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .context("Failed to build backend HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.backend().base_url.clone(),
            api_key: settings.backend().api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.api_key)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to call backend GET {path}"))?
            .error_for_status()
            .with_context(|| format!("Backend GET {path} returned an error status"))?;

        response.json().await.with_context(|| format!("Failed to decode backend GET {path}"))
    }

    /// Batched id lookups; returns empty without a network round-trip for an
    /// empty id list.
    async fn list_by_ids<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        ids: &[String],
        active_only: bool,
    ) -> Result<Vec<T>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = vec![("ids", ids.join(","))];
        if active_only {
            query.push(("active", "true".to_string()));
        }
        self.get_json(path, &query).await
    }

    async fn answers_for<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        submission_id: &str,
        question_ids: &[String],
    ) -> Result<Vec<T>> {
        if question_ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = vec![
            ("submission_id", submission_id.to_string()),
            ("question_ids", question_ids.join(",")),
        ];
        self.get_json(path, &query).await
    }

    async fn patch_json(&self, path: &str, body: serde_json::Value) -> Result<()> {
        self.client
            .patch(self.url(path))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to call backend PATCH {path}"))?
            .error_for_status()
            .with_context(|| format!("Backend PATCH {path} returned an error status"))?;

        Ok(())
    }
}

#[async_trait]
impl StudyApi for HttpStudyApi {
    async fn get_test(&self, test_id: &str) -> Result<TestDefinition> {
        self.get_json(&format!("/tests/{test_id}"), &[]).await
    }

    async fn get_competition(&self, competition_id: &str) -> Result<Competition> {
        self.get_json(&format!("/competitions/{competition_id}"), &[]).await
    }

    async fn get_submission(&self, submission_id: &str) -> Result<Option<Submission>> {
        let response = self
            .client
            .get(self.url(&format!("/submissions/{submission_id}")))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("Failed to call backend GET /submissions/{id}")?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let submission = response
            .error_for_status()
            .context("Backend GET /submissions/{id} returned an error status")?
            .json()
            .await
            .context("Failed to decode submission")?;
        Ok(Some(submission))
    }

    async fn find_submission(
        &self,
        owner_id: &str,
        user_id: &str,
        finalized: bool,
    ) -> Result<Option<Submission>> {
        let query = vec![
            ("owner_id", owner_id.to_string()),
            ("user_id", user_id.to_string()),
            ("finalized", finalized.to_string()),
        ];
        let mut matches: Vec<Submission> = self.get_json("/submissions", &query).await?;
        Ok(if matches.is_empty() { None } else { Some(matches.remove(0)) })
    }

    async fn create_submission(&self, owner_id: &str, user_id: &str) -> Result<Submission> {
        let body = json!({
            "id": Uuid::new_v4().to_string(),
            "owner_id": owner_id,
            "user_id": user_id,
            "score": 0.0,
            "finalized": false,
        });

        let submission = self
            .client
            .post(self.url("/submissions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to call backend POST /submissions")?
            .error_for_status()
            .context("Backend POST /submissions returned an error status")?
            .json()
            .await
            .context("Failed to decode created submission")?;

        Ok(submission)
    }

    async fn patch_submission(&self, submission_id: &str, patch: &SubmissionPatch) -> Result<()> {
        let body = serde_json::to_value(patch).context("Failed to serialize submission patch")?;
        self.patch_json(&format!("/submissions/{submission_id}"), body).await
    }

    async fn choice_questions(&self, ids: &[String]) -> Result<Vec<ChoiceQuestion>> {
        self.list_by_ids("/questions", ids, true).await
    }

    async fn containers(&self, kind: SectionKind, ids: &[String]) -> Result<Vec<ItemContainer>> {
        let path = match kind {
            SectionKind::Reading => "/reading-passages",
            SectionKind::Listening => "/listening-exercises",
            SectionKind::Speaking => "/speaking-parts",
            _ => anyhow::bail!("section kind {} has no containers", kind.as_str()),
        };
        self.list_by_ids(path, ids, true).await
    }

    async fn speaking_questions(&self, ids: &[String]) -> Result<Vec<SpeakingQuestion>> {
        self.list_by_ids("/speaking-questions", ids, true).await
    }

    async fn writing_questions(&self, ids: &[String]) -> Result<Vec<WritingQuestion>> {
        self.list_by_ids("/writing-questions", ids, true).await
    }

    async fn choice_answers(
        &self,
        submission_id: &str,
        question_ids: &[String],
    ) -> Result<Vec<ChoiceAnswer>> {
        self.answers_for("/choice-answers", submission_id, question_ids).await
    }

    async fn speaking_answers(
        &self,
        submission_id: &str,
        question_ids: &[String],
    ) -> Result<Vec<SpeakingAnswer>> {
        self.answers_for("/speaking-answers", submission_id, question_ids).await
    }

    async fn writing_answers(
        &self,
        submission_id: &str,
        question_ids: &[String],
    ) -> Result<Vec<WritingAnswer>> {
        self.answers_for("/writing-answers", submission_id, question_ids).await
    }

    async fn patch_speaking_answer(
        &self,
        answer_id: &str,
        score: f64,
        transcript: &str,
    ) -> Result<()> {
        let body = json!({ "score": score, "transcript": transcript });
        self.patch_json(&format!("/speaking-answers/{answer_id}"), body).await
    }

    async fn patch_writing_answer(
        &self,
        answer_id: &str,
        score: f64,
        feedback: Option<&str>,
    ) -> Result<()> {
        let mut body = json!({ "score": score });
        if let Some(feedback) = feedback {
            body["comment"] = json!(feedback);
        }
        self.patch_json(&format!("/writing-answers/{answer_id}"), body).await
    }

    async fn fetch_audio(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch audio from {url}"))?
            .error_for_status()
            .with_context(|| format!("Audio fetch from {url} returned an error status"))?;

        let bytes = response.bytes().await.context("Failed to read audio body")?;
        Ok(bytes.to_vec())
    }

    async fn health(&self) -> Result<()> {
        self.client
            .get(self.url("/healthz"))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("Backend unreachable")?
            .error_for_status()
            .context("Backend health check failed")?;
        Ok(())
    }
}
