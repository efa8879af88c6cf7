//! Contract with the grading service that owns attempts.

use async_trait::async_trait;

use attempt_core::model::{
    AttemptId, EncodedSnapshot, ProgressSnapshot, SubmissionKey, TestAttempt, TestId,
};

use crate::error::RemoteError;

mod http;

pub use http::{HttpAttemptRemote, RemoteConfig};

/// A freshly started (or resumed) attempt.
#[derive(Debug, Clone)]
pub struct StartedAttempt {
    pub attempt: TestAttempt,
    /// Draft persisted by an earlier save, if any.
    pub initial_draft: Option<ProgressSnapshot>,
}

/// Response of a successful submit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitReceipt {
    /// Identity of the graded attempt; absent when the service reuses the submitted one.
    pub result_attempt_id: Option<AttemptId>,
}

#[async_trait]
pub trait AttemptRemote: Send + Sync {
    /// Start or resume the learner's attempt for a test.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` when the call fails or the response is malformed.
    async fn start_attempt(&self, test_id: &TestId) -> Result<StartedAttempt, RemoteError>;

    /// Persist the in-progress draft.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` when the save is not acknowledged.
    async fn save_progress(
        &self,
        attempt_id: &AttemptId,
        snapshot: &EncodedSnapshot,
    ) -> Result<(), RemoteError>;

    /// Submit the attempt for grading.
    ///
    /// Every call for the same logical submission carries the same `key`.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` when the submit is not acknowledged.
    async fn submit_attempt(
        &self,
        attempt_id: &AttemptId,
        snapshot: &EncodedSnapshot,
        key: &SubmissionKey,
    ) -> Result<SubmitReceipt, RemoteError>;
}
