//! Terminal submit: pre-submit flush, confirmation prompt and the one-shot
//! submit call.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use attempt_core::model::{AttemptId, ProgressSummary, SaveState, SaveStatus, TestId};

use super::scheduler::{DispatchOutcome, SaveReason, SkipReason};
use super::session::SessionCore;
use crate::error::SubmitError;

/// Hands off to the result view once an attempt is graded.
pub trait ResultNavigator: Send + Sync {
    fn show_result(&self, test_id: &TestId, result_attempt_id: &AttemptId);
}

/// Outcome of a successful submit. Created once per attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResult {
    pub result_attempt_id: AttemptId,
    pub submitted_at: DateTime<Utc>,
    pub auto_submitted: bool,
}

/// What the pre-submit flush managed to reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was pending.
    NotNeeded,
    Saved,
    /// The last save failed; the server may hold an older draft.
    Failed,
    /// The draft changed again while the flush was in flight.
    Stale,
    /// The wait bound expired before the save settled.
    TimedOut,
}

impl FlushOutcome {
    /// True when the server is known to hold the submitted draft.
    #[must_use]
    pub fn is_clean(self) -> bool {
        matches!(self, Self::NotNeeded | Self::Saved)
    }
}

/// Confirmation shown before a manual submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitPrompt {
    Unanswered { count: usize, total: usize },
    AllAnswered,
}

impl SubmitPrompt {
    #[must_use]
    pub fn from_progress(progress: &ProgressSummary) -> Self {
        if progress.not_attempted > 0 {
            Self::Unanswered {
                count: progress.not_attempted,
                total: progress.total,
            }
        } else {
            Self::AllAnswered
        }
    }
}

impl fmt::Display for SubmitPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unanswered { count: 1, total } => write!(
                f,
                "You have 1 unanswered question out of {total}. Submit anyway?"
            ),
            Self::Unanswered { count, total } => write!(
                f,
                "You have {count} unanswered questions out of {total}. Submit anyway?"
            ),
            Self::AllAnswered => f.write_str("All questions are answered. Submit your test now?"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitRequestOutcome {
    /// A submit is already running or the attempt is finished.
    Ignored,
    /// Show `prompt`, then call `execute_submit` if the learner agrees.
    ConfirmationRequired {
        prompt: SubmitPrompt,
        flush: FlushOutcome,
    },
    Submitted {
        result: SubmissionResult,
        flush: FlushOutcome,
    },
}

async fn settled_before(rx: &mut watch::Receiver<SaveState>, deadline: Instant) -> bool {
    matches!(
        time::timeout_at(deadline, rx.wait_for(|s| s.status != SaveStatus::Saving)).await,
        Ok(Ok(_))
    )
}

impl SessionCore {
    fn accepts_submit(&self) -> bool {
        let state = self.lock();
        !(state.submitting || state.terminal || state.result.is_some())
    }

    /// Bring the remote draft up to date before submitting, waiting at most
    /// the configured bound.
    pub(crate) async fn flush_before_submit(self: &Arc<Self>) -> FlushOutcome {
        let deadline = Instant::now() + self.settings.presubmit_wait();
        let mut status_rx = self.subscribe();

        let mut waited = false;
        if self.save_state().status == SaveStatus::Saving {
            waited = true;
            if !settled_before(&mut status_rx, deadline).await {
                return FlushOutcome::TimedOut;
            }
        }
        if !self.save_state().status.needs_flush() {
            return if waited {
                FlushOutcome::Saved
            } else {
                FlushOutcome::NotNeeded
            };
        }

        match self.prepare_save(SaveReason::PreSubmit) {
            Ok(prepared) => {
                // Spawned so a timed-out wait never cancels the call itself.
                let core = Arc::clone(self);
                tokio::spawn(async move {
                    core.send_save(prepared).await;
                });
            }
            Err(DispatchOutcome::Skipped(SkipReason::InFlight)) => {}
            Err(DispatchOutcome::Skipped(_)) => return FlushOutcome::NotNeeded,
            Err(_) => return FlushOutcome::Failed,
        }

        if !settled_before(&mut status_rx, deadline).await {
            return FlushOutcome::TimedOut;
        }
        match self.save_state().status {
            SaveStatus::Saved => FlushOutcome::Saved,
            SaveStatus::Unsaved => FlushOutcome::Stale,
            SaveStatus::Error => FlushOutcome::Failed,
            SaveStatus::Idle | SaveStatus::Saving => FlushOutcome::NotNeeded,
        }
    }

    pub(crate) async fn request_submit(
        self: &Arc<Self>,
        is_auto_submit: bool,
    ) -> Result<SubmitRequestOutcome, SubmitError> {
        if !self.accepts_submit() {
            debug!(attempt = %self.attempt_id, "submit already running or done");
            return Ok(SubmitRequestOutcome::Ignored);
        }

        let flush = self.flush_before_submit().await;
        if !flush.is_clean() {
            warn!(
                attempt = %self.attempt_id,
                flush = ?flush,
                "submitting without a confirmed save of the latest draft"
            );
        }

        if !is_auto_submit {
            let prompt = SubmitPrompt::from_progress(&self.lock().draft.progress());
            return Ok(SubmitRequestOutcome::ConfirmationRequired { prompt, flush });
        }

        match self.execute_submit(true).await {
            Ok(result) => Ok(SubmitRequestOutcome::Submitted { result, flush }),
            Err(SubmitError::InFlight | SubmitError::AlreadySubmitted(_)) => {
                Ok(SubmitRequestOutcome::Ignored)
            }
            Err(err) => Err(err),
        }
    }

    pub(crate) async fn execute_submit(
        self: &Arc<Self>,
        is_auto_submit: bool,
    ) -> Result<SubmissionResult, SubmitError> {
        let (ticket, snapshot, published) = {
            let mut state = self.lock();
            if let Some(result) = &state.result {
                return Err(SubmitError::AlreadySubmitted(
                    result.result_attempt_id.clone(),
                ));
            }
            if state.terminal {
                return Err(SubmitError::AlreadySubmitted(self.attempt_id.clone()));
            }
            if state.submitting {
                return Err(SubmitError::InFlight);
            }
            let snapshot = state.progress_snapshot().encode()?;
            state.submitting = true;
            let ticket = state.tracker.begin_exclusive();
            (ticket, snapshot, state.tracker.state())
        };
        self.publish(published);
        info!(
            attempt = %self.attempt_id,
            auto = is_auto_submit,
            key = %self.submission_key,
            "submitting attempt"
        );

        let response = self
            .remote
            .submit_attempt(&self.attempt_id, &snapshot, &self.submission_key)
            .await;

        let receipt = match response {
            Ok(receipt) => receipt,
            Err(err) => {
                let published = {
                    let mut state = self.lock();
                    state.tracker.settle(ticket, false);
                    state.submitting = false;
                    state.tracker.state()
                };
                self.publish(published);
                error!(attempt = %self.attempt_id, error = %err, "submitting attempt failed");
                return Err(err.into());
            }
        };

        let result = SubmissionResult {
            result_attempt_id: receipt
                .result_attempt_id
                .unwrap_or_else(|| self.attempt_id.clone()),
            submitted_at: self.clock.now(),
            auto_submitted: is_auto_submit,
        };
        let published = {
            let mut state = self.lock();
            state.tracker.settle(ticket, true);
            state.submitting = false;
            state.terminal = true;
            state.result = Some(result.clone());
            state.tracker.state()
        };
        self.publish(published);
        self.cancel.cancel();
        info!(
            attempt = %self.attempt_id,
            result = %result.result_attempt_id,
            "attempt submitted"
        );

        match self.drawings.clear_attempt(&self.attempt_id).await {
            Ok(removed) => debug!(attempt = %self.attempt_id, removed, "cleared drawing cache"),
            Err(err) => {
                warn!(attempt = %self.attempt_id, error = %err, "could not clear drawing cache");
            }
        }

        if let Some(navigator) = &self.navigator {
            navigator.show_result(&self.test_id, &result.result_attempt_id);
        }
        Ok(result)
    }
}
