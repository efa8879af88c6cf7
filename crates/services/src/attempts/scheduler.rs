//! Persistence scheduler: debounce, interval and visibility stimuli funneled
//! through one guarded dispatch.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use attempt_core::model::{EncodedSnapshot, SaveStatus, SaveTicket};

use super::session::SessionCore;

/// Why a save was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveReason {
    Interval,
    Mutation,
    VisibilityHidden,
    /// A mutation landed while the previous save was in flight.
    PendingChanges,
    PreSubmit,
    Manual,
}

impl SaveReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Interval => "interval",
            Self::Mutation => "mutation",
            Self::VisibilityHidden => "visibility_hidden",
            Self::PendingChanges => "pending_changes",
            Self::PreSubmit => "pre_submit",
            Self::Manual => "manual",
        }
    }
}

/// Why the dispatch guard turned a save away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InFlight,
    Submitting,
    NoAnchor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Saved,
    Failed,
    Skipped(SkipReason),
}

/// Whether the learner can currently see the attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

/// A save that passed the guard and holds the tracker's ticket.
pub(crate) struct PreparedSave {
    ticket: SaveTicket,
    snapshot: EncodedSnapshot,
    reason: SaveReason,
}

impl SessionCore {
    /// Run the dispatch guard and, if it passes, enter `saving` with the
    /// current snapshot. Never awaits.
    pub(crate) fn prepare_save(&self, reason: SaveReason) -> Result<PreparedSave, DispatchOutcome> {
        let (prepared, published) = {
            let mut state = self.lock();
            if state.submitting || state.terminal {
                return Err(DispatchOutcome::Skipped(SkipReason::Submitting));
            }
            if state.tracker.is_saving() {
                return Err(DispatchOutcome::Skipped(SkipReason::InFlight));
            }
            if state.current.is_none() {
                return Err(DispatchOutcome::Skipped(SkipReason::NoAnchor));
            }
            let Some(ticket) = state.tracker.begin() else {
                return Err(DispatchOutcome::Skipped(SkipReason::InFlight));
            };
            match state.progress_snapshot().encode() {
                Ok(snapshot) => (
                    Ok(PreparedSave {
                        ticket,
                        snapshot,
                        reason,
                    }),
                    state.tracker.state(),
                ),
                Err(err) => {
                    warn!(attempt = %self.attempt_id, error = %err, "could not encode draft");
                    state.tracker.settle(ticket, false);
                    (Err(DispatchOutcome::Failed), state.tracker.state())
                }
            }
        };
        self.publish(published);
        prepared
    }

    /// Send a prepared save and settle the tracker with the result.
    pub(crate) async fn send_save(&self, prepared: PreparedSave) -> DispatchOutcome {
        let PreparedSave {
            ticket,
            snapshot,
            reason,
        } = prepared;
        let result = self.remote.save_progress(&self.attempt_id, &snapshot).await;
        let ok = result.is_ok();

        let (current, published) = {
            let mut state = self.lock();
            let current = state.tracker.settle(ticket, ok);
            (current, state.tracker.state())
        };
        if current {
            self.publish(published);
        }

        match result {
            Ok(()) => {
                info!(
                    attempt = %self.attempt_id,
                    reason = reason.as_str(),
                    status = %published.status,
                    "progress saved"
                );
                DispatchOutcome::Saved
            }
            Err(err) => {
                warn!(
                    attempt = %self.attempt_id,
                    reason = reason.as_str(),
                    error = %err,
                    "saving progress failed"
                );
                DispatchOutcome::Failed
            }
        }
    }

    pub(crate) async fn dispatch(&self, reason: SaveReason) -> DispatchOutcome {
        match self.prepare_save(reason) {
            Ok(prepared) => self.send_save(prepared).await,
            Err(outcome) => {
                debug!(
                    attempt = %self.attempt_id,
                    reason = reason.as_str(),
                    outcome = ?outcome,
                    "save not dispatched"
                );
                outcome
            }
        }
    }
}

/// Trailing debounce: each arm pushes the deadline out, the latest reason wins.
#[derive(Debug)]
pub(crate) struct Debouncer {
    delay: Duration,
    pending: Option<(Instant, SaveReason)>,
}

impl Debouncer {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub(crate) fn arm(&mut self, reason: SaveReason) {
        self.pending = Some((Instant::now() + self.delay, reason));
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.pending.map(|(at, _)| at)
    }

    pub(crate) fn take(&mut self) -> Option<SaveReason> {
        self.pending.take().map(|(_, reason)| reason)
    }
}

async fn visibility_changed(
    visibility: &mut Option<watch::Receiver<Visibility>>,
) -> Option<Visibility> {
    match visibility {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(*rx.borrow_and_update()),
            Err(_) => None,
        },
        None => std::future::pending().await,
    }
}

/// Background loop owning the debounce deadline and the autosave interval.
///
/// Exits when the session's cancellation token fires.
pub(crate) async fn run(
    core: Arc<SessionCore>,
    mut commands: mpsc::UnboundedReceiver<SaveReason>,
    mut visibility: Option<watch::Receiver<Visibility>>,
) {
    let period = core.settings.autosave_interval();
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut debounce = Debouncer::new(core.settings.debounce_delay());
    let mut watching = visibility.is_some();

    loop {
        let deadline = debounce.deadline();
        tokio::select! {
            biased;
            () = core.cancel.cancelled() => break,
            command = commands.recv() => match command {
                Some(reason) => debounce.arm(reason),
                None => break,
            },
            () = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                let Some(reason) = debounce.take() else {
                    continue;
                };
                match core.prepare_save(reason) {
                    Ok(prepared) => {
                        // The send runs beside the loop so cancellation never waits on it.
                        let core = Arc::clone(&core);
                        tokio::spawn(async move {
                            core.send_save(prepared).await;
                            let pending = core.save_state().status == SaveStatus::Unsaved;
                            if pending && core.accepts_saves() {
                                core.request_debounced(SaveReason::PendingChanges);
                            }
                        });
                    }
                    Err(outcome) => {
                        debug!(
                            attempt = %core.attempt_id,
                            reason = reason.as_str(),
                            outcome = ?outcome,
                            "save not dispatched"
                        );
                        let busy = outcome == DispatchOutcome::Skipped(SkipReason::InFlight);
                        if busy && core.accepts_saves() {
                            debounce.arm(SaveReason::PendingChanges);
                        }
                    }
                }
            }
            _ = interval.tick() => {
                if core.accepts_saves() {
                    debounce.arm(SaveReason::Interval);
                }
            }
            changed = visibility_changed(&mut visibility), if watching => match changed {
                Some(Visibility::Hidden) if core.accepts_saves() => {
                    debug!(attempt = %core.attempt_id, "session hidden, saving");
                    debounce.arm(SaveReason::VisibilityHidden);
                }
                Some(_) => {}
                None => watching = false,
            },
        }
    }
    debug!(attempt = %core.attempt_id, "save scheduler stopped");
}
