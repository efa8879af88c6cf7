use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use attempt_core::model::{
    AttemptId, EncodedSnapshot, ProgressSnapshot, QuestionDetailId, QuestionId, QuestionKind,
    QuestionRef, SubmissionKey, TestAttempt, TestId,
};

use super::{AttemptRemote, StartedAttempt, SubmitReceipt};
use crate::error::{RemoteConfigError, RemoteError};

const METHOD_PATH: &str = "api/method/test_attempt.test_attempt";
const IDEMPOTENCY_KEY: &str = "Idempotency-Key";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_ERROR_BODY: usize = 512;

#[derive(Clone, Debug)]
pub struct RemoteConfig {
    pub base_url: Url,
    pub api_token: Option<String>,
    pub timeout: Duration,
}

impl RemoteConfig {
    /// # Errors
    ///
    /// Returns `RemoteConfigError` if the url cannot be parsed or is not http(s).
    pub fn new(base_url: &str) -> Result<Self, RemoteConfigError> {
        let base_url = Url::parse(base_url.trim())?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(RemoteConfigError::UnsupportedScheme(
                base_url.scheme().to_string(),
            ));
        }
        Ok(Self {
            base_url,
            api_token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Read `ATTEMPT_API_BASE_URL`, `ATTEMPT_API_TOKEN` and `ATTEMPT_API_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// Returns `RemoteConfigError` when the base url is missing or any value is invalid.
    pub fn from_env() -> Result<Self, RemoteConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, RemoteConfigError> {
        let base_url = lookup("ATTEMPT_API_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(RemoteConfigError::Missing("ATTEMPT_API_BASE_URL"))?;
        let mut config = Self::new(&base_url)?;
        config.api_token = lookup("ATTEMPT_API_TOKEN").filter(|v| !v.trim().is_empty());
        if let Some(raw) = lookup("ATTEMPT_API_TIMEOUT_SECS") {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|_| RemoteConfigError::InvalidTimeout(raw.clone()))?;
            if secs == 0 {
                return Err(RemoteConfigError::InvalidTimeout(raw));
            }
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/{METHOD_PATH}.{method}",
            self.base_url.as_str().trim_end_matches('/')
        )
    }
}

/// `AttemptRemote` over the grading service's HTTP API.
#[derive(Clone)]
pub struct HttpAttemptRemote {
    client: Client,
    config: RemoteConfig,
}

impl HttpAttemptRemote {
    /// # Errors
    ///
    /// Returns `RemoteError::Http` if the HTTP client cannot be built.
    pub fn new(config: RemoteConfig) -> Result<Self, RemoteError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// # Errors
    ///
    /// Returns `RemoteError::Config` when the environment is incomplete, or
    /// `RemoteError::Http` if the client cannot be built.
    pub fn from_env() -> Result<Self, RemoteError> {
        Self::new(RemoteConfig::from_env()?)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_token {
            Some(token) => request.header(AUTHORIZATION, format!("token {token}")),
            None => request,
        }
    }
}

#[async_trait]
impl AttemptRemote for HttpAttemptRemote {
    async fn start_attempt(&self, test_id: &TestId) -> Result<StartedAttempt, RemoteError> {
        let request = self
            .client
            .post(self.config.method_url("start_test_attempt"))
            .json(&StartRequest { test_id });
        let body = read_body(self.authorize(request).send().await?).await?;
        decode_start(&body)
    }

    async fn save_progress(
        &self,
        attempt_id: &AttemptId,
        snapshot: &EncodedSnapshot,
    ) -> Result<(), RemoteError> {
        let request = self
            .client
            .patch(self.config.method_url("save_attempt_progress"))
            .json(&SaveRequest {
                attempt_id,
                progress_data: snapshot.as_str(),
            });
        let body = read_body(self.authorize(request).send().await?).await?;
        decode_save(&body)
    }

    async fn submit_attempt(
        &self,
        attempt_id: &AttemptId,
        snapshot: &EncodedSnapshot,
        key: &SubmissionKey,
    ) -> Result<SubmitReceipt, RemoteError> {
        let request = self
            .client
            .post(self.config.method_url("submit_test_attempt"))
            .header(IDEMPOTENCY_KEY, key.to_string())
            .json(&SubmitRequest {
                attempt_id,
                submission_data: snapshot.as_str(),
            });
        let body = read_body(self.authorize(request).send().await?).await?;
        decode_submit(&body)
    }
}

async fn read_body(response: Response) -> Result<String, RemoteError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        let mut body = body;
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        return Err(RemoteError::HttpStatus { status, body });
    }
    Ok(body)
}

//
// ─── WIRE FORMAT ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Serialize)]
struct StartRequest<'a> {
    test_id: &'a TestId,
}

#[derive(Debug, Serialize)]
struct SaveRequest<'a> {
    attempt_id: &'a AttemptId,
    progress_data: &'a str,
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    attempt_id: &'a AttemptId,
    submission_data: &'a str,
}

/// Every response is wrapped as `{"message": ...}`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    message: T,
}

#[derive(Debug, Deserialize)]
struct StartMessage {
    attempt_id: AttemptId,
    test_id: TestId,
    #[serde(default)]
    remaining_time_seconds: u32,
    #[serde(default)]
    status: WireAttemptStatus,
    questions: Vec<WireQuestion>,
    /// JSON-encoded `ProgressSnapshot` from the last save.
    #[serde(default)]
    saved_progress: Option<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
enum WireAttemptStatus {
    #[default]
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Completed")]
    Completed,
    #[serde(rename = "Timed Out")]
    TimedOut,
}

#[derive(Debug, Deserialize)]
struct WireQuestion {
    test_question_detail_id: QuestionDetailId,
    question_id: QuestionId,
    question_type: QuestionKind,
}

#[derive(Debug, Deserialize)]
struct SaveMessage {
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmitMessage {
    #[serde(rename = "attemptId", default)]
    attempt_id: Option<AttemptId>,
}

fn decode_envelope<T: DeserializeOwned>(body: &str) -> Result<T, RemoteError> {
    serde_json::from_str::<Envelope<T>>(body)
        .map(|envelope| envelope.message)
        .map_err(|e| RemoteError::InvalidResponse(e.to_string()))
}

pub(crate) fn decode_start(body: &str) -> Result<StartedAttempt, RemoteError> {
    let message: StartMessage = decode_envelope(body)?;
    let questions = message
        .questions
        .into_iter()
        .map(|q| QuestionRef::new(q.test_question_detail_id, q.question_id, q.question_type))
        .collect();
    let attempt = TestAttempt::new(
        message.attempt_id,
        message.test_id,
        questions,
        message.remaining_time_seconds,
    )?
    .with_terminal(message.status != WireAttemptStatus::InProgress);

    let initial_draft = message
        .saved_progress
        .filter(|raw| !raw.trim().is_empty())
        .and_then(|raw| match serde_json::from_str::<ProgressSnapshot>(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!(attempt = %attempt.attempt_id(), error = %err, "discarding unreadable saved progress");
                None
            }
        });

    debug!(
        attempt = %attempt.attempt_id(),
        questions = attempt.questions().len(),
        resumed = initial_draft.is_some(),
        "decoded started attempt"
    );
    Ok(StartedAttempt {
        attempt,
        initial_draft,
    })
}

pub(crate) fn decode_save(body: &str) -> Result<(), RemoteError> {
    let message: SaveMessage = decode_envelope(body)?;
    if message.success {
        Ok(())
    } else {
        Err(RemoteError::Rejected(
            message.message.unwrap_or_else(|| "save was not accepted".into()),
        ))
    }
}

pub(crate) fn decode_submit(body: &str) -> Result<SubmitReceipt, RemoteError> {
    let message: SubmitMessage = decode_envelope(body)?;
    Ok(SubmitReceipt {
        result_attempt_id: message.attempt_id.filter(|id| !id.is_blank()),
    })
}
