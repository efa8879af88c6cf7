use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SyncSettingsError {
    #[error("autosave interval must be > 0")]
    InvalidAutosaveInterval,

    #[error("debounce delay must be > 0 and shorter than the autosave interval")]
    InvalidDebounceDelay,

    #[error("pre-submit wait must be > 0")]
    InvalidPresubmitWait,

    #[error("countdown tick must be at least one second")]
    InvalidCountdownTick,
}

/// Timing knobs for the persistence scheduler and countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    autosave_interval: Duration,
    debounce_delay: Duration,
    presubmit_wait: Duration,
    countdown_tick: Duration,
}

impl SyncSettings {
    /// # Errors
    ///
    /// Returns `SyncSettingsError` when a duration is zero, the debounce delay
    /// is not shorter than the autosave interval, or the tick is below one second.
    pub fn new(
        autosave_interval: Duration,
        debounce_delay: Duration,
        presubmit_wait: Duration,
        countdown_tick: Duration,
    ) -> Result<Self, SyncSettingsError> {
        if autosave_interval.is_zero() {
            return Err(SyncSettingsError::InvalidAutosaveInterval);
        }
        if debounce_delay.is_zero() || debounce_delay >= autosave_interval {
            return Err(SyncSettingsError::InvalidDebounceDelay);
        }
        if presubmit_wait.is_zero() {
            return Err(SyncSettingsError::InvalidPresubmitWait);
        }
        if countdown_tick < Duration::from_secs(1) {
            return Err(SyncSettingsError::InvalidCountdownTick);
        }
        Ok(Self {
            autosave_interval,
            debounce_delay,
            presubmit_wait,
            countdown_tick,
        })
    }

    #[must_use]
    pub fn autosave_interval(&self) -> Duration {
        self.autosave_interval
    }

    #[must_use]
    pub fn debounce_delay(&self) -> Duration {
        self.debounce_delay
    }

    #[must_use]
    pub fn presubmit_wait(&self) -> Duration {
        self.presubmit_wait
    }

    #[must_use]
    pub fn countdown_tick(&self) -> Duration {
        self.countdown_tick
    }

    /// Whole seconds removed from the timer on each tick.
    #[must_use]
    pub fn countdown_step_secs(&self) -> u32 {
        u32::try_from(self.countdown_tick.as_secs()).unwrap_or(u32::MAX)
    }
}

impl Default for SyncSettings {
    /// 10 s autosave, 500 ms debounce, 3 s pre-submit wait, 1 s countdown tick.
    fn default() -> Self {
        Self {
            autosave_interval: Duration::from_secs(10),
            debounce_delay: Duration::from_millis(500),
            presubmit_wait: Duration::from_secs(3),
            countdown_tick: Duration::from_secs(1),
        }
    }
}
