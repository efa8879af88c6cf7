use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use attempt_core::Clock;
use attempt_core::model::{
    AnswerPayload, AttemptId, DraftError, DraftStore, ProgressSnapshot, ProgressSummary,
    QuestionAnswer, QuestionDetailId, QuestionId, SaveState, SaveTracker, SubmissionKey,
    SyncSettings, TestId,
};
use storage::repository::{DrawingCacheEntry, DrawingCacheRepository, InMemoryRepository};

use super::attachments::{AttachmentInput, AttachmentReport};
use super::scheduler::{self, DispatchOutcome, SaveReason, Visibility};
use super::submission::{ResultNavigator, SubmissionResult, SubmitRequestOutcome};
use super::countdown;
use crate::error::{SessionError, SubmitError};
use crate::remote::{AttemptRemote, StartedAttempt};

//
// ─── SHARED STATE ──────────────────────────────────────────────────────────────
//

pub(crate) struct SessionState {
    pub(crate) draft: DraftStore,
    pub(crate) tracker: SaveTracker,
    /// Current-question anchor; `None` until the attempt has a question to show.
    pub(crate) current: Option<QuestionDetailId>,
    pub(crate) remaining_seconds: u32,
    pub(crate) submitting: bool,
    pub(crate) expired: bool,
    pub(crate) terminal: bool,
    pub(crate) result: Option<SubmissionResult>,
}

impl SessionState {
    pub(crate) fn accepts_mutations(&self) -> bool {
        !(self.submitting || self.terminal || self.expired)
    }

    fn last_viewed(&self) -> Option<QuestionId> {
        self.current
            .as_ref()
            .and_then(|id| self.draft.question(id))
            .map(|q| q.question_id.clone())
    }

    pub(crate) fn progress_snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot::from_draft(
            self.draft.snapshot_for_transmission(),
            self.remaining_seconds,
            self.last_viewed(),
        )
    }
}

/// Everything the background tasks and the public handle share.
pub(crate) struct SessionCore {
    pub(crate) attempt_id: AttemptId,
    pub(crate) test_id: TestId,
    pub(crate) remote: Arc<dyn AttemptRemote>,
    pub(crate) drawings: Arc<dyn DrawingCacheRepository>,
    pub(crate) navigator: Option<Arc<dyn ResultNavigator>>,
    pub(crate) settings: SyncSettings,
    pub(crate) clock: Clock,
    pub(crate) submission_key: SubmissionKey,
    pub(crate) cancel: CancellationToken,
    state: Mutex<SessionState>,
    status_tx: watch::Sender<SaveState>,
    commands: mpsc::UnboundedSender<SaveReason>,
}

impl SessionCore {
    /// Guards are never held across an await.
    pub(crate) fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn publish(&self, state: SaveState) {
        self.status_tx.send_replace(state);
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SaveState> {
        self.status_tx.subscribe()
    }

    pub(crate) fn save_state(&self) -> SaveState {
        self.lock().tracker.state()
    }

    pub(crate) fn accepts_saves(&self) -> bool {
        let state = self.lock();
        !(state.submitting || state.terminal)
    }

    pub(crate) fn request_debounced(&self, reason: SaveReason) {
        if self.commands.send(reason).is_err() {
            debug!(attempt = %self.attempt_id, reason = reason.as_str(), "scheduler stopped, save request dropped");
        }
    }

    /// Apply a draft mutation. `f` returns its value plus whether the draft changed.
    ///
    /// Returns `None` when the attempt no longer accepts mutations.
    pub(crate) fn mutate<T>(
        &self,
        f: impl FnOnce(&mut DraftStore) -> Result<(T, bool), DraftError>,
    ) -> Result<Option<T>, DraftError> {
        let (value, published) = {
            let mut state = self.lock();
            if !state.accepts_mutations() {
                debug!(attempt = %self.attempt_id, "draft is frozen, mutation ignored");
                return Ok(None);
            }
            let (value, changed) = f(&mut state.draft)?;
            if !changed {
                return Ok(Some(value));
            }
            state.tracker.mark_dirty();
            (value, state.tracker.state())
        };
        self.publish(published);
        self.request_debounced(SaveReason::Mutation);
        Ok(Some(value))
    }

    pub(crate) fn ensure_question(&self, detail_id: &QuestionDetailId) -> Result<(), DraftError> {
        if self.lock().draft.question(detail_id).is_some() {
            Ok(())
        } else {
            Err(DraftError::UnknownQuestion(detail_id.clone()))
        }
    }
}

//
// ─── PUBLIC HANDLE ─────────────────────────────────────────────────────────────
//

/// One learner's live attempt: draft, save scheduling, countdown and submit.
///
/// Owns its timer tasks. Dropping the session (or calling [`close`](Self::close))
/// stops them.
pub struct AttemptSession {
    core: Arc<SessionCore>,
    tasks: Vec<JoinHandle<()>>,
}

impl AttemptSession {
    #[must_use]
    pub fn builder(remote: Arc<dyn AttemptRemote>) -> AttemptSessionBuilder {
        AttemptSessionBuilder::new(remote)
    }

    /// Start (or resume) the attempt for `test_id` with default settings.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Remote` if the attempt cannot be started.
    pub async fn start(
        remote: Arc<dyn AttemptRemote>,
        test_id: &TestId,
    ) -> Result<Self, SessionError> {
        Self::builder(remote).start(test_id).await
    }

    #[must_use]
    pub fn attempt_id(&self) -> &AttemptId {
        &self.core.attempt_id
    }

    #[must_use]
    pub fn test_id(&self) -> &TestId {
        &self.core.test_id
    }

    #[must_use]
    pub fn submission_key(&self) -> SubmissionKey {
        self.core.submission_key
    }

    #[must_use]
    pub fn save_state(&self) -> SaveState {
        self.core.save_state()
    }

    /// Observe every save-status change.
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<SaveState> {
        self.core.subscribe()
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> u32 {
        self.core.lock().remaining_seconds
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.core.lock().expired
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.core.lock().terminal
    }

    #[must_use]
    pub fn current_question(&self) -> Option<QuestionDetailId> {
        self.core.lock().current.clone()
    }

    #[must_use]
    pub fn answer(&self, detail_id: &QuestionDetailId) -> Option<QuestionAnswer> {
        self.core.lock().draft.get_answer(detail_id).cloned()
    }

    #[must_use]
    pub fn is_marked_for_review(&self, detail_id: &QuestionDetailId) -> bool {
        self.core.lock().draft.is_marked_for_review(detail_id)
    }

    #[must_use]
    pub fn progress(&self) -> ProgressSummary {
        self.core.lock().draft.progress()
    }

    /// Snapshot that the next save would transmit.
    #[must_use]
    pub fn pending_snapshot(&self) -> ProgressSnapshot {
        self.core.lock().progress_snapshot()
    }

    #[must_use]
    pub fn result(&self) -> Option<SubmissionResult> {
        self.core.lock().result.clone()
    }

    /// Store an answer. Returns whether the draft changed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Draft` for a question outside the attempt.
    pub fn set_answer(
        &self,
        detail_id: &QuestionDetailId,
        payload: AnswerPayload,
    ) -> Result<bool, SessionError> {
        let changed = self
            .core
            .mutate(|draft| draft.set_answer(detail_id, payload).map(|c| (c, c)))?;
        Ok(changed.unwrap_or(false))
    }

    /// # Errors
    ///
    /// Returns `SessionError::Draft` for a question outside the attempt.
    pub fn clear_answer(&self, detail_id: &QuestionDetailId) -> Result<bool, SessionError> {
        let changed = self
            .core
            .mutate(|draft| draft.clear_answer(detail_id).map(|c| (c, c)))?;
        Ok(changed.unwrap_or(false))
    }

    /// Flip the review flag. Returns the new flag, or `None` if the draft is frozen.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Draft` for a question outside the attempt.
    pub fn toggle_mark_for_review(
        &self,
        detail_id: &QuestionDetailId,
    ) -> Result<Option<bool>, SessionError> {
        Ok(self
            .core
            .mutate(|draft| draft.toggle_mark_for_review(detail_id).map(|m| (m, true)))?)
    }

    /// Move the current-question anchor.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Draft` for a question outside the attempt.
    pub fn view_question(&self, detail_id: &QuestionDetailId) -> Result<(), SessionError> {
        let mut state = self.core.lock();
        if state.draft.question(detail_id).is_none() {
            return Err(DraftError::UnknownQuestion(detail_id.clone()).into());
        }
        state.current = Some(detail_id.clone());
        Ok(())
    }

    /// Add uploaded files or a drawing capture to a question.
    ///
    /// Unreadable files and (name, size) duplicates are skipped.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Draft` if the question is unknown or takes no attachments.
    pub async fn add_attachments(
        &self,
        detail_id: &QuestionDetailId,
        input: AttachmentInput,
    ) -> Result<AttachmentReport, SessionError> {
        Ok(self.core.add_attachments(detail_id, input).await?)
    }

    /// # Errors
    ///
    /// Returns `SessionError::Draft` for a question outside the attempt.
    pub fn remove_attachment(
        &self,
        detail_id: &QuestionDetailId,
        name: &str,
    ) -> Result<bool, SessionError> {
        Ok(self.core.remove_attachment(detail_id, name)?)
    }

    /// Drop every attachment of the attempt.
    #[must_use = "reports whether anything was removed"]
    pub fn reset_attachments(&self) -> bool {
        self.core.reset_attachments()
    }

    /// Save now, bypassing the debounce.
    pub async fn trigger_save(&self, reason: SaveReason) -> DispatchOutcome {
        self.core.dispatch(reason).await
    }

    /// Schedule a save after the debounce delay.
    pub fn trigger_debounced_save(&self, reason: SaveReason) {
        self.core.request_debounced(reason);
    }

    /// Flush pending changes and either auto-submit or ask for confirmation.
    ///
    /// # Errors
    ///
    /// Returns `SubmitError` when an auto-submit fails.
    pub async fn request_submit(
        &self,
        is_auto_submit: bool,
    ) -> Result<SubmitRequestOutcome, SubmitError> {
        self.core.request_submit(is_auto_submit).await
    }

    /// Submit after the learner confirmed the prompt.
    ///
    /// # Errors
    ///
    /// Returns `SubmitError` if a submit is in flight, already done, or rejected.
    pub async fn execute_submit(
        &self,
        is_auto_submit: bool,
    ) -> Result<SubmissionResult, SubmitError> {
        self.core.execute_submit(is_auto_submit).await
    }

    /// Cache an offline drawing canvas for a question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the question is unknown or the cache write fails.
    pub async fn cache_drawing(
        &self,
        detail_id: &QuestionDetailId,
        document: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.core.ensure_question(detail_id)?;
        let entry = DrawingCacheEntry::new(
            self.core.attempt_id.clone(),
            detail_id.clone(),
            document,
            self.core.clock.now(),
        );
        self.core.drawings.put_drawing(&entry).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the cache cannot be read.
    pub async fn cached_drawing(
        &self,
        detail_id: &QuestionDetailId,
    ) -> Result<Option<String>, SessionError> {
        let entry = self
            .core
            .drawings
            .get_drawing(&self.core.attempt_id, detail_id)
            .await?;
        Ok(entry.map(|e| e.document))
    }

    /// Stop the scheduler and countdown.
    pub fn close(&self) {
        self.core.cancel.cancel();
    }

    /// Stop background tasks and wait for them to finish.
    pub async fn shutdown(mut self) {
        self.close();
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
    }
}

impl Drop for AttemptSession {
    fn drop(&mut self) {
        self.core.cancel.cancel();
    }
}

//
// ─── BUILDER ───────────────────────────────────────────────────────────────────
//

pub struct AttemptSessionBuilder {
    remote: Arc<dyn AttemptRemote>,
    settings: SyncSettings,
    clock: Clock,
    drawings: Option<Arc<dyn DrawingCacheRepository>>,
    navigator: Option<Arc<dyn ResultNavigator>>,
    visibility: Option<watch::Receiver<Visibility>>,
    submission_key: Option<SubmissionKey>,
}

impl AttemptSessionBuilder {
    fn new(remote: Arc<dyn AttemptRemote>) -> Self {
        Self {
            remote,
            settings: SyncSettings::default(),
            clock: Clock::default(),
            drawings: None,
            navigator: None,
            visibility: None,
            submission_key: None,
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: SyncSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_drawings(mut self, drawings: Arc<dyn DrawingCacheRepository>) -> Self {
        self.drawings = Some(drawings);
        self
    }

    #[must_use]
    pub fn with_navigator(mut self, navigator: Arc<dyn ResultNavigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Subscribe the scheduler to visibility changes; `Hidden` triggers a save.
    #[must_use]
    pub fn with_visibility(mut self, visibility: watch::Receiver<Visibility>) -> Self {
        self.visibility = Some(visibility);
        self
    }

    #[must_use]
    pub fn with_submission_key(mut self, key: SubmissionKey) -> Self {
        self.submission_key = Some(key);
        self
    }

    /// Ask the remote for the attempt, then open it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Remote` if the attempt cannot be started.
    pub async fn start(self, test_id: &TestId) -> Result<AttemptSession, SessionError> {
        let started = self.remote.start_attempt(test_id).await?;
        Ok(self.open(started))
    }

    /// Open a session over an attempt the remote already handed out.
    ///
    /// Spawns the scheduler and countdown on the current Tokio runtime.
    #[must_use]
    pub fn open(self, started: StartedAttempt) -> AttemptSession {
        let StartedAttempt {
            attempt,
            initial_draft,
        } = started;
        let attempt = match &initial_draft {
            Some(saved) => attempt.with_saved_progress(saved),
            None => attempt,
        };
        let parts = attempt.into_parts();
        let draft = DraftStore::restore(parts.questions, initial_draft.as_ref());
        let current = parts
            .last_viewed
            .as_ref()
            .and_then(|id| draft.question_by_bank_id(id))
            .or_else(|| draft.questions().first())
            .map(|q| q.detail_id.clone());

        let drawings: Arc<dyn DrawingCacheRepository> = match self.drawings {
            Some(drawings) => drawings,
            None => Arc::new(InMemoryRepository::new()),
        };
        let tracker = SaveTracker::new();
        let (status_tx, _) = watch::channel(tracker.state());
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        info!(
            attempt = %parts.attempt_id,
            questions = draft.questions().len(),
            remaining_seconds = parts.remaining_seconds,
            resumed = initial_draft.is_some(),
            terminal = parts.terminal,
            "attempt session opened"
        );

        let core = Arc::new(SessionCore {
            attempt_id: parts.attempt_id,
            test_id: parts.test_id,
            remote: self.remote,
            drawings,
            navigator: self.navigator,
            settings: self.settings,
            clock: self.clock,
            submission_key: self.submission_key.unwrap_or_else(SubmissionKey::generate),
            cancel,
            state: Mutex::new(SessionState {
                draft,
                tracker,
                current,
                remaining_seconds: parts.remaining_seconds,
                submitting: false,
                expired: false,
                terminal: parts.terminal,
                result: None,
            }),
            status_tx,
            commands,
        });

        let mut tasks = Vec::new();
        if parts.terminal {
            core.cancel.cancel();
        } else {
            tasks.push(tokio::spawn(scheduler::run(
                Arc::clone(&core),
                commands_rx,
                self.visibility,
            )));
            tasks.push(tokio::spawn(countdown::run(Arc::clone(&core))));
        }

        AttemptSession { core, tasks }
    }
}
