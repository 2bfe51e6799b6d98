use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::api;
use crate::core::{config::Settings, redis::RedisHandle, security, state::AppState};
use crate::exam::models::{StudentIdentity, ViolationEvent};
use crate::registry::SessionStore;
use crate::schemas::upstream::{ScoredDetailDto, ScoredResultDto, SubmissionPayload, TestDto};
use crate::services::scoring::ScoringBackend;
use crate::services::testbank::TestSource;
use crate::services::violations::ViolationSink;
use crate::services::UpstreamError;

const TEST_SECRET_KEY: &str = "test-secret";

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: Router,
    pub(crate) testbank: Arc<ScriptedTestBank>,
    pub(crate) scoring: Arc<RecordingScorer>,
    pub(crate) violations: Arc<RecordingSink>,
    _guard: OwnedMutexGuard<()>,
}

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    std::env::set_var("EXAMHALL_ENV", "test");
    std::env::set_var("EXAMHALL_STRICT_CONFIG", "0");
    std::env::set_var("SECRET_KEY", TEST_SECRET_KEY);
    std::env::set_var("TAB_WARNING_SECONDS", "3");
    std::env::remove_var("PROMETHEUS_ENABLED");
    std::env::remove_var("MAX_CONCURRENT_SESSIONS");
    std::env::remove_var("BACKEND_CORS_ORIGINS");
}

/// Everything a handler needs, with no network behind it: scripted test
/// bank, recording scorer, recording violation sink and a Redis handle that
/// never connects.
pub(crate) async fn setup_test_context() -> TestContext {
    setup_test_context_with_env(&[]).await
}

pub(crate) async fn setup_test_context_with_env(vars: &[(&str, &str)]) -> TestContext {
    let guard = env_lock().await;
    set_test_env();
    for (key, value) in vars {
        std::env::set_var(key, value);
    }

    let settings = Settings::load().expect("settings");
    let redis = RedisHandle::new(settings.redis().redis_url());

    let testbank = Arc::new(ScriptedTestBank::default());
    let scoring = Arc::new(RecordingScorer::default());
    let violations = Arc::new(RecordingSink::default());

    let state = AppState::new(
        settings,
        redis,
        SessionStore::new(),
        testbank.clone(),
        scoring.clone(),
        violations.clone(),
    );
    let app = api::router::router(state.clone());

    TestContext { state, app, testbank, scoring, violations, _guard: guard }
}

/// State with fresh stubs for tests that do not need to script them.
pub(crate) fn build_state(settings: Settings) -> AppState {
    let redis = RedisHandle::new(settings.redis().redis_url());
    AppState::new(
        settings,
        redis,
        SessionStore::new(),
        Arc::new(ScriptedTestBank::default()),
        Arc::new(RecordingScorer::default()),
        Arc::new(RecordingSink::default()),
    )
}

#[derive(Default)]
pub(crate) struct ScriptedTestBank {
    tests: StdMutex<HashMap<String, TestDto>>,
}

impl ScriptedTestBank {
    pub(crate) fn add(&self, dto: TestDto) {
        self.tests.lock().expect("testbank lock").insert(dto.id.clone(), dto);
    }
}

#[async_trait]
impl TestSource for ScriptedTestBank {
    async fn fetch_test(&self, test_id: &str) -> Result<TestDto, UpstreamError> {
        self.tests
            .lock()
            .expect("testbank lock")
            .get(test_id)
            .cloned()
            .ok_or_else(|| UpstreamError::TestNotFound(test_id.to_string()))
    }
}

/// Scores one point per question whose submitted option ids match the
/// scripted answer key, and records every payload it receives.
#[derive(Default)]
pub(crate) struct RecordingScorer {
    calls: StdMutex<Vec<SubmissionPayload>>,
    answer_key: StdMutex<HashMap<String, String>>,
    fail_next: AtomicBool,
}

impl RecordingScorer {
    pub(crate) fn set_answer(&self, question_id: &str, option_ids: &str) {
        self.answer_key
            .lock()
            .expect("answer key lock")
            .insert(question_id.to_string(), option_ids.to_string());
    }

    pub(crate) fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock").len()
    }

    pub(crate) fn calls(&self) -> Vec<SubmissionPayload> {
        self.calls.lock().expect("calls lock").clone()
    }
}

fn normalize_ids(raw: &str) -> Vec<String> {
    let mut ids: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    ids.sort();
    ids
}

#[async_trait]
impl ScoringBackend for RecordingScorer {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<ScoredResultDto, UpstreamError> {
        self.calls.lock().expect("calls lock").push(payload.clone());

        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(UpstreamError::Status(502));
        }

        let key = self.answer_key.lock().expect("answer key lock");
        let mut score = 0.0;
        let details = payload
            .details
            .iter()
            .map(|detail| {
                let correct = key
                    .get(&detail.question_id)
                    .is_some_and(|expected| {
                        !detail.option_ids.is_empty()
                            && normalize_ids(expected) == normalize_ids(&detail.option_ids)
                    });
                let point = if correct { 1.0 } else { 0.0 };
                score += point;
                ScoredDetailDto {
                    question_id: detail.question_id.clone(),
                    option_ids: detail.option_ids.clone(),
                    correct,
                    point,
                }
            })
            .collect();

        Ok(ScoredResultDto { score, details })
    }
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    events: StdMutex<Vec<ViolationEvent>>,
}

impl RecordingSink {
    pub(crate) fn count(&self) -> usize {
        self.events.lock().expect("events lock").len()
    }

    pub(crate) fn events(&self) -> Vec<ViolationEvent> {
        self.events.lock().expect("events lock").clone()
    }
}

#[async_trait]
impl ViolationSink for RecordingSink {
    async fn record(&self, event: ViolationEvent) {
        self.events.lock().expect("events lock").push(event);
    }
}

pub(crate) fn student_identity(id: &str, name: &str) -> StudentIdentity {
    StudentIdentity {
        id: id.to_string(),
        name: name.to_string(),
        email: format!("{id}@example.com"),
        student_no: id.to_uppercase(),
    }
}

pub(crate) fn bearer_token(student: &StudentIdentity, settings: &Settings) -> String {
    security::create_access_token(student, settings, None).expect("token")
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

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

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("invalid json response: {err}: {body_text}")
    })
}
