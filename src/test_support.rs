use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use serde_json::Value;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::api;
use crate::clients::backend::StudyApi;
use crate::clients::evaluation::{
    Evaluator, SpeechEvaluation, TestFeedback, WritingEvaluation,
};
use crate::core::{config::Settings, state::AppState};
use crate::model::types::SectionKind;
use crate::model::{
    AnswerOption, ChoiceAnswer, ChoiceQuestion, Competition, ItemContainer, SpeakingAnswer,
    SpeakingQuestion, Submission, SubmissionPatch, TestDefinition, WritingAnswer, WritingQuestion,
};

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: Router,
    pub(crate) api: Arc<MockStudyApi>,
    #[allow(dead_code)]
    pub(crate) evaluator: Arc<MockEvaluator>,
    _guard: OwnedMutexGuard<()>,
}

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<tokio::sync::Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(tokio::sync::Mutex::new(()))).clone();
    lock.lock_owned().await
}

fn set_test_env() {
    std::env::set_var("ENGLIFT_ENV", "test");
    std::env::set_var("ENGLIFT_STRICT_CONFIG", "0");
    std::env::set_var("STUDY_BACKEND_URL", "http://localhost:3000/api");
    std::env::set_var("EVALUATION_BASE_URL", "http://localhost:9100");
    std::env::set_var("SCORING_EVAL_TIMEOUT_SECONDS", "5");
    std::env::remove_var("PROMETHEUS_ENABLED");
}

pub(crate) async fn setup_test_context(api: MockStudyApi, evaluator: MockEvaluator) -> TestContext {
    setup_test_context_with_env(api, evaluator, &[]).await
}

pub(crate) async fn setup_test_context_with_env(
    api: MockStudyApi,
    evaluator: MockEvaluator,
    overrides: &[(&str, &str)],
) -> TestContext {
    let guard = env_lock().await;
    set_test_env();
    for (key, value) in overrides {
        std::env::set_var(key, value);
    }

    let settings = Settings::load().expect("settings");
    let api = Arc::new(api);
    let evaluator = Arc::new(evaluator);
    let state = AppState::new(settings, api.clone(), evaluator.clone());
    let app = api::router::router(state.clone());

    TestContext { state, app, api, evaluator, _guard: guard }
}

pub(crate) fn json_request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}

/// In-memory stand-in for the study backend. Fixtures go in through the
/// `add_*` helpers; mutation calls are recorded for assertions.
#[derive(Default)]
pub(crate) struct MockStudyApi {
    inner: Mutex<MockData>,
    find_submission_calls: AtomicU32,
}

#[derive(Default)]
struct MockData {
    tests: HashMap<String, TestDefinition>,
    competitions: HashMap<String, Competition>,
    submissions: Vec<Submission>,
    choice_questions: HashMap<String, ChoiceQuestion>,
    containers: HashMap<String, ItemContainer>,
    speaking_questions: HashMap<String, SpeakingQuestion>,
    writing_questions: HashMap<String, WritingQuestion>,
    choice_answers: Vec<ChoiceAnswer>,
    speaking_answers: Vec<SpeakingAnswer>,
    writing_answers: Vec<WritingAnswer>,
    audio: HashMap<String, Vec<u8>>,
    submission_patches: Vec<(String, SubmissionPatch)>,
    speaking_answer_patches: Vec<(String, f64, String)>,
    writing_answer_patches: Vec<(String, f64, Option<String>)>,
    created_submissions: u32,
    fail_choice_questions: bool,
}

impl MockStudyApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_test(&self, test: TestDefinition) {
        let mut data = self.inner.lock().expect("mock lock");
        data.tests.insert(test.id.clone(), test);
    }

    pub(crate) fn add_competition(
        &self,
        id: &str,
        test_id: &str,
        ends_at: time::OffsetDateTime,
    ) {
        let mut data = self.inner.lock().expect("mock lock");
        data.competitions.insert(
            id.to_string(),
            Competition { id: id.to_string(), test_id: test_id.to_string(), ends_at },
        );
    }

    pub(crate) fn add_submission(
        &self,
        id: &str,
        owner_id: &str,
        user_id: &str,
        score: f64,
        finalized: bool,
    ) {
        let mut data = self.inner.lock().expect("mock lock");
        data.submissions.push(Submission {
            id: id.to_string(),
            owner_id: owner_id.to_string(),
            user_id: user_id.to_string(),
            score,
            finalized,
            comment: None,
            strengths: Vec::new(),
            areas_to_improve: Vec::new(),
        });
    }

    /// Two options per question, `<id>-a` and `<id>-b`; `correct_option`
    /// names the correct suffix.
    pub(crate) fn add_choice_question(&self, id: &str, correct_option: &str, active: bool) {
        let mut data = self.inner.lock().expect("mock lock");
        data.choice_questions.insert(
            id.to_string(),
            ChoiceQuestion {
                id: id.to_string(),
                content: format!("question {id}"),
                options: vec![
                    AnswerOption {
                        id: format!("{id}-a"),
                        content: "a".to_string(),
                        correct: correct_option == "a",
                    },
                    AnswerOption {
                        id: format!("{id}-b"),
                        content: "b".to_string(),
                        correct: correct_option == "b",
                    },
                ],
                active,
            },
        );
    }

    pub(crate) fn add_container(&self, id: &str, active: bool, question_ids: &[&str]) {
        let mut data = self.inner.lock().expect("mock lock");
        data.containers.insert(
            id.to_string(),
            ItemContainer {
                id: id.to_string(),
                active,
                question_ids: question_ids.iter().map(|id| id.to_string()).collect(),
            },
        );
    }

    pub(crate) fn add_speaking_question(&self, id: &str, prompt: &str) {
        let mut data = self.inner.lock().expect("mock lock");
        data.speaking_questions.insert(
            id.to_string(),
            SpeakingQuestion { id: id.to_string(), prompt: prompt.to_string(), active: true },
        );
    }

    pub(crate) fn add_writing_question(&self, id: &str, topic: &str) {
        let mut data = self.inner.lock().expect("mock lock");
        data.writing_questions.insert(
            id.to_string(),
            WritingQuestion { id: id.to_string(), topic: topic.to_string(), active: true },
        );
    }

    pub(crate) fn add_choice_answer(
        &self,
        submission_id: &str,
        question_id: &str,
        option_id: Option<&str>,
    ) {
        let mut data = self.inner.lock().expect("mock lock");
        data.choice_answers.push(ChoiceAnswer {
            id: Uuid::new_v4().to_string(),
            submission_id: submission_id.to_string(),
            question_id: question_id.to_string(),
            option_id: option_id.map(|id| id.to_string()),
        });
    }

    pub(crate) fn add_speaking_answer(
        &self,
        submission_id: &str,
        question_id: &str,
        audio_url: Option<&str>,
    ) {
        let mut data = self.inner.lock().expect("mock lock");
        data.speaking_answers.push(SpeakingAnswer {
            id: Uuid::new_v4().to_string(),
            submission_id: submission_id.to_string(),
            question_id: question_id.to_string(),
            audio_url: audio_url.map(|url| url.to_string()),
            transcript: None,
            score: None,
        });
    }

    pub(crate) fn add_writing_answer(
        &self,
        submission_id: &str,
        question_id: &str,
        content: Option<&str>,
    ) {
        let mut data = self.inner.lock().expect("mock lock");
        data.writing_answers.push(WritingAnswer {
            id: Uuid::new_v4().to_string(),
            submission_id: submission_id.to_string(),
            question_id: question_id.to_string(),
            content: content.map(|content| content.to_string()),
            score: None,
        });
    }

    pub(crate) fn add_audio(&self, url: &str, bytes: &[u8]) {
        let mut data = self.inner.lock().expect("mock lock");
        data.audio.insert(url.to_string(), bytes.to_vec());
    }

    pub(crate) fn fail_choice_questions(&self) {
        let mut data = self.inner.lock().expect("mock lock");
        data.fail_choice_questions = true;
    }

    pub(crate) fn submission_patches(&self) -> Vec<(String, SubmissionPatch)> {
        self.inner.lock().expect("mock lock").submission_patches.clone()
    }

    pub(crate) fn speaking_answer_patches(&self) -> Vec<(String, f64, String)> {
        self.inner.lock().expect("mock lock").speaking_answer_patches.clone()
    }

    pub(crate) fn writing_answer_patches(&self) -> Vec<(String, f64, Option<String>)> {
        self.inner.lock().expect("mock lock").writing_answer_patches.clone()
    }

    pub(crate) fn created_submission_count(&self) -> u32 {
        self.inner.lock().expect("mock lock").created_submissions
    }

    pub(crate) fn find_submission_calls(&self) -> u32 {
        self.find_submission_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StudyApi for MockStudyApi {
    async fn get_test(&self, test_id: &str) -> Result<TestDefinition> {
        self.inner
            .lock()
            .expect("mock lock")
            .tests
            .get(test_id)
            .cloned()
            .ok_or_else(|| anyhow!("test {test_id} not found"))
    }

    async fn get_competition(&self, competition_id: &str) -> Result<Competition> {
        self.inner
            .lock()
            .expect("mock lock")
            .competitions
            .get(competition_id)
            .cloned()
            .ok_or_else(|| anyhow!("competition {competition_id} not found"))
    }

    async fn get_submission(&self, submission_id: &str) -> Result<Option<Submission>> {
        Ok(self
            .inner
            .lock()
            .expect("mock lock")
            .submissions
            .iter()
            .find(|submission| submission.id == submission_id)
            .cloned())
    }

    async fn find_submission(
        &self,
        owner_id: &str,
        user_id: &str,
        finalized: bool,
    ) -> Result<Option<Submission>> {
        self.find_submission_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .inner
            .lock()
            .expect("mock lock")
            .submissions
            .iter()
            .find(|submission| {
                submission.owner_id == owner_id
                    && submission.user_id == user_id
                    && submission.finalized == finalized
            })
            .cloned())
    }

    async fn create_submission(&self, owner_id: &str, user_id: &str) -> Result<Submission> {
        let submission = Submission {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            user_id: user_id.to_string(),
            score: 0.0,
            finalized: false,
            comment: None,
            strengths: Vec::new(),
            areas_to_improve: Vec::new(),
        };

        let mut data = self.inner.lock().expect("mock lock");
        data.created_submissions += 1;
        data.submissions.push(submission.clone());
        Ok(submission)
    }

    async fn patch_submission(&self, submission_id: &str, patch: &SubmissionPatch) -> Result<()> {
        let mut data = self.inner.lock().expect("mock lock");
        data.submission_patches.push((submission_id.to_string(), patch.clone()));

        if let Some(submission) =
            data.submissions.iter_mut().find(|submission| submission.id == submission_id)
        {
            if let Some(score) = patch.score {
                submission.score = score;
            }
            if let Some(finalized) = patch.finalized {
                submission.finalized = finalized;
            }
            if let Some(comment) = &patch.comment {
                submission.comment = Some(comment.clone());
            }
        }

        Ok(())
    }

    async fn choice_questions(&self, ids: &[String]) -> Result<Vec<ChoiceQuestion>> {
        let data = self.inner.lock().expect("mock lock");
        if data.fail_choice_questions {
            anyhow::bail!("simulated backend failure");
        }
        Ok(ids.iter().filter_map(|id| data.choice_questions.get(id).cloned()).collect())
    }

    async fn containers(&self, _kind: SectionKind, ids: &[String]) -> Result<Vec<ItemContainer>> {
        let data = self.inner.lock().expect("mock lock");
        Ok(ids.iter().filter_map(|id| data.containers.get(id).cloned()).collect())
    }

    async fn speaking_questions(&self, ids: &[String]) -> Result<Vec<SpeakingQuestion>> {
        let data = self.inner.lock().expect("mock lock");
        Ok(ids.iter().filter_map(|id| data.speaking_questions.get(id).cloned()).collect())
    }

    async fn writing_questions(&self, ids: &[String]) -> Result<Vec<WritingQuestion>> {
        let data = self.inner.lock().expect("mock lock");
        Ok(ids.iter().filter_map(|id| data.writing_questions.get(id).cloned()).collect())
    }

    async fn choice_answers(
        &self,
        submission_id: &str,
        question_ids: &[String],
    ) -> Result<Vec<ChoiceAnswer>> {
        let data = self.inner.lock().expect("mock lock");
        Ok(data
            .choice_answers
            .iter()
            .filter(|answer| {
                answer.submission_id == submission_id
                    && question_ids.contains(&answer.question_id)
            })
            .cloned()
            .collect())
    }

    async fn speaking_answers(
        &self,
        submission_id: &str,
        question_ids: &[String],
    ) -> Result<Vec<SpeakingAnswer>> {
        let data = self.inner.lock().expect("mock lock");
        Ok(data
            .speaking_answers
            .iter()
            .filter(|answer| {
                answer.submission_id == submission_id
                    && question_ids.contains(&answer.question_id)
            })
            .cloned()
            .collect())
    }

    async fn writing_answers(
        &self,
        submission_id: &str,
        question_ids: &[String],
    ) -> Result<Vec<WritingAnswer>> {
        let data = self.inner.lock().expect("mock lock");
        Ok(data
            .writing_answers
            .iter()
            .filter(|answer| {
                answer.submission_id == submission_id
                    && question_ids.contains(&answer.question_id)
            })
            .cloned()
            .collect())
    }

    async fn patch_speaking_answer(
        &self,
        answer_id: &str,
        score: f64,
        transcript: &str,
    ) -> Result<()> {
        let mut data = self.inner.lock().expect("mock lock");
        data.speaking_answer_patches.push((answer_id.to_string(), score, transcript.to_string()));
        Ok(())
    }

    async fn patch_writing_answer(
        &self,
        answer_id: &str,
        score: f64,
        feedback: Option<&str>,
    ) -> Result<()> {
        let mut data = self.inner.lock().expect("mock lock");
        data.writing_answer_patches.push((
            answer_id.to_string(),
            score,
            feedback.map(|feedback| feedback.to_string()),
        ));
        Ok(())
    }

    async fn fetch_audio(&self, url: &str) -> Result<Vec<u8>> {
        self.inner
            .lock()
            .expect("mock lock")
            .audio
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("audio {url} not found"))
    }

    async fn health(&self) -> Result<()> {
        Ok(())
    }
}

/// Scripted evaluator: fixed scores, optional failures, call counting.
#[derive(Default)]
pub(crate) struct MockEvaluator {
    speech_score: Option<f64>,
    writing_score: Option<f64>,
    failing_feedback: bool,
    speech_calls: AtomicU32,
    writing_calls: AtomicU32,
}

impl MockEvaluator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_speech_score(mut self, score: f64) -> Self {
        self.speech_score = Some(score);
        self
    }

    pub(crate) fn with_writing_score(mut self, score: f64) -> Self {
        self.writing_score = Some(score);
        self
    }

    pub(crate) fn with_failing_feedback(mut self) -> Self {
        self.failing_feedback = true;
        self
    }

    pub(crate) fn speech_calls(&self) -> u32 {
        self.speech_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn writing_calls(&self) -> u32 {
        self.writing_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Evaluator for MockEvaluator {
    async fn evaluate_speech(
        &self,
        _audio: &[u8],
        expected_text: &str,
    ) -> Result<SpeechEvaluation> {
        self.speech_calls.fetch_add(1, Ordering::SeqCst);
        match self.speech_score {
            Some(score) => {
                Ok(SpeechEvaluation { score, transcript: expected_text.to_string() })
            }
            None => Err(anyhow!("speech evaluation not scripted")),
        }
    }

    async fn score_writing(&self, _content: &str, _topic: &str) -> Result<WritingEvaluation> {
        self.writing_calls.fetch_add(1, Ordering::SeqCst);
        match self.writing_score {
            Some(score) => Ok(WritingEvaluation { score, feedback: Some("ok".to_string()) }),
            None => Err(anyhow!("writing evaluation not scripted")),
        }
    }

    async fn comment_test(&self, _summary: &Value) -> Result<TestFeedback> {
        if self.failing_feedback {
            return Err(anyhow!("feedback service unavailable"));
        }
        Ok(TestFeedback::default())
    }
}
