#![forbid(unsafe_code)]

//! Async engine that keeps a test attempt's draft in sync with the grading
//! service: debounced and periodic saves, countdown, and the one-shot submit.

pub mod attempts;
pub mod error;
pub mod remote;

pub use attempt_core::Clock;

pub use error::{AttachmentError, RemoteConfigError, RemoteError, SessionError, SubmitError};
pub use attempts::{
    AttachmentInput, AttachmentReport, AttemptSession, AttemptSessionBuilder, DispatchOutcome,
    FileSource, FlushOutcome, RawFile, ResultNavigator, SaveReason, SkipReason, SubmissionResult,
    SubmitPrompt, SubmitRequestOutcome, Visibility,
};
pub use remote::{AttemptRemote, HttpAttemptRemote, RemoteConfig, StartedAttempt, SubmitReceipt};
