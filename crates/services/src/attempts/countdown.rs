use std::sync::Arc;

use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use super::session::SessionCore;
use super::submission::SubmitRequestOutcome;

/// Tick the remaining time down; at zero freeze the draft and auto-submit.
pub(crate) async fn run(core: Arc<SessionCore>) {
    let tick = core.settings.countdown_tick();
    let step = core.settings.countdown_step_secs();
    let mut ticker = time::interval_at(Instant::now() + tick, tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = core.cancel.cancelled() => {
                debug!(attempt = %core.attempt_id, "countdown stopped");
                return;
            }
            _ = ticker.tick() => {}
        }

        let expired = {
            let mut state = core.lock();
            if state.terminal {
                return;
            }
            state.remaining_seconds = state.remaining_seconds.saturating_sub(step);
            if state.remaining_seconds == 0 {
                state.expired = true;
            }
            state.expired
        };
        if !expired {
            continue;
        }

        info!(attempt = %core.attempt_id, "time is up, auto-submitting");
        match core.request_submit(true).await {
            Ok(SubmitRequestOutcome::Submitted { result, flush }) => {
                debug!(
                    attempt = %core.attempt_id,
                    result = %result.result_attempt_id,
                    flush = ?flush,
                    "auto-submit finished"
                );
            }
            Ok(outcome) => debug!(attempt = %core.attempt_id, outcome = ?outcome, "auto-submit skipped"),
            Err(err) => error!(attempt = %core.attempt_id, error = %err, "auto-submit failed"),
        }
        return;
    }
}
