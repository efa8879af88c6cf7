//! Shared error types for the services crate.

use thiserror::Error;

use attempt_core::model::{AttemptError, AttemptId, DraftError, SnapshotError};
use storage::repository::StorageError;

/// Errors raised while reading `RemoteConfig`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RemoteConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("invalid base url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("base url must use http or https, got {0}")]
    UnsupportedScheme(String),
    #[error("invalid request timeout: {0}")]
    InvalidTimeout(String),
}

/// Errors emitted by an `AttemptRemote`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RemoteError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("request failed with status {status}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
    #[error("remote unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Attempt(#[from] AttemptError),
    #[error(transparent)]
    Config(#[from] RemoteConfigError),
}

/// Errors emitted by `AttemptSession` outside of submission.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Draft(#[from] DraftError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the terminal submit.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SubmitError {
    #[error("a submission is already in flight")]
    InFlight,
    #[error("attempt already submitted as {0}")]
    AlreadySubmitted(AttemptId),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Errors raised while encoding a single attachment.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AttachmentError {
    #[error("could not read {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },
}
