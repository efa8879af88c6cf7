#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use attempt_core::model::{
    AttemptId, EncodedSnapshot, ProgressSnapshot, QuestionDetailId, QuestionKind, QuestionRef,
    SubmissionKey, TestAttempt, TestId,
};
use services::{
    AttemptRemote, AttemptSession, RemoteError, ResultNavigator, StartedAttempt, SubmitReceipt,
};

pub fn q1() -> QuestionDetailId {
    QuestionDetailId::new("Q1")
}

pub fn q2() -> QuestionDetailId {
    QuestionDetailId::new("Q2")
}

/// Q1 is a short answer, Q2 an essay that takes attachments.
pub fn questions() -> Vec<QuestionRef> {
    vec![
        QuestionRef::new("Q1", "B1", QuestionKind::ShortAnswer),
        QuestionRef::new("Q2", "B2", QuestionKind::Essay),
    ]
}

pub fn started(remaining_seconds: u32) -> StartedAttempt {
    StartedAttempt {
        attempt: TestAttempt::new(
            AttemptId::new("TA-1"),
            TestId::new("T-1"),
            questions(),
            remaining_seconds,
        )
        .unwrap(),
        initial_draft: None,
    }
}

pub fn open(remote: &Arc<FakeRemote>, started: StartedAttempt) -> AttemptSession {
    let remote: Arc<dyn AttemptRemote> = remote.clone();
    AttemptSession::builder(remote).open(started)
}

#[derive(Default)]
struct FakeState {
    saves: Vec<ProgressSnapshot>,
    submits: Vec<(ProgressSnapshot, SubmissionKey)>,
    failing_saves: usize,
    failing_submits: usize,
    in_flight: usize,
    max_in_flight: usize,
}

/// Grading service double that records every call.
pub struct FakeRemote {
    state: Mutex<FakeState>,
    save_latency: Duration,
    submit_latency: Duration,
    result_id: Option<AttemptId>,
    start: Option<StartedAttempt>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
            save_latency: Duration::from_millis(50),
            submit_latency: Duration::from_millis(50),
            result_id: Some(AttemptId::new("TA-RESULT")),
            start: None,
        }
    }

    pub fn with_save_latency(mut self, latency: Duration) -> Self {
        self.save_latency = latency;
        self
    }

    pub fn with_submit_latency(mut self, latency: Duration) -> Self {
        self.submit_latency = latency;
        self
    }

    pub fn with_result_id(mut self, result_id: Option<AttemptId>) -> Self {
        self.result_id = result_id;
        self
    }

    pub fn with_start(mut self, started: StartedAttempt) -> Self {
        self.start = Some(started);
        self
    }

    pub fn fail_next_saves(&self, count: usize) {
        self.state.lock().unwrap().failing_saves = count;
    }

    pub fn fail_next_submits(&self, count: usize) {
        self.state.lock().unwrap().failing_submits = count;
    }

    pub fn saves(&self) -> Vec<ProgressSnapshot> {
        self.state.lock().unwrap().saves.clone()
    }

    pub fn submits(&self) -> Vec<(ProgressSnapshot, SubmissionKey)> {
        self.state.lock().unwrap().submits.clone()
    }

    pub fn max_concurrent_saves(&self) -> usize {
        self.state.lock().unwrap().max_in_flight
    }
}

#[async_trait]
impl AttemptRemote for FakeRemote {
    async fn start_attempt(&self, test_id: &TestId) -> Result<StartedAttempt, RemoteError> {
        self.start
            .clone()
            .ok_or_else(|| RemoteError::Unavailable(format!("no attempt for {test_id}")))
    }

    async fn save_progress(
        &self,
        _attempt_id: &AttemptId,
        snapshot: &EncodedSnapshot,
    ) -> Result<(), RemoteError> {
        {
            let mut state = self.state.lock().unwrap();
            state.saves.push(snapshot.decode().unwrap());
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
        }
        tokio::time::sleep(self.save_latency).await;
        let mut state = self.state.lock().unwrap();
        state.in_flight -= 1;
        if state.failing_saves > 0 {
            state.failing_saves -= 1;
            return Err(RemoteError::Unavailable("save failed".into()));
        }
        Ok(())
    }

    async fn submit_attempt(
        &self,
        _attempt_id: &AttemptId,
        snapshot: &EncodedSnapshot,
        key: &SubmissionKey,
    ) -> Result<SubmitReceipt, RemoteError> {
        self.state
            .lock()
            .unwrap()
            .submits
            .push((snapshot.decode().unwrap(), *key));
        tokio::time::sleep(self.submit_latency).await;
        let mut state = self.state.lock().unwrap();
        if state.failing_submits > 0 {
            state.failing_submits -= 1;
            return Err(RemoteError::Unavailable("submit failed".into()));
        }
        Ok(SubmitReceipt {
            result_attempt_id: self.result_id.clone(),
        })
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    calls: Mutex<Vec<(TestId, AttemptId)>>,
}

impl RecordingNavigator {
    pub fn calls(&self) -> Vec<(TestId, AttemptId)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ResultNavigator for RecordingNavigator {
    fn show_result(&self, test_id: &TestId, result_attempt_id: &AttemptId) {
        self.calls
            .lock()
            .unwrap()
            .push((test_id.clone(), result_attempt_id.clone()));
    }
}
