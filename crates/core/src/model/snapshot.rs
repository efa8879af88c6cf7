use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::answer::TransmittedAnswer;
use crate::model::ids::{QuestionDetailId, QuestionId};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SnapshotError {
    #[error("snapshot could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("snapshot could not be decoded: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Answers and review flags projected out of the draft.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DraftSnapshot {
    pub answers: BTreeMap<QuestionDetailId, TransmittedAnswer>,
    pub marked_for_review: BTreeMap<QuestionDetailId, bool>,
}

/// Full progress payload: what is saved, submitted, and restored.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    #[serde(default)]
    pub answers: BTreeMap<QuestionDetailId, TransmittedAnswer>,
    /// `None` when the payload carried no timer; zero is a real value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_time_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_viewed_question_id: Option<QuestionId>,
    #[serde(default)]
    pub marked_for_review: BTreeMap<QuestionDetailId, bool>,
}

impl ProgressSnapshot {
    #[must_use]
    pub fn from_draft(
        draft: DraftSnapshot,
        remaining_time_seconds: u32,
        last_viewed_question_id: Option<QuestionId>,
    ) -> Self {
        Self {
            answers: draft.answers,
            remaining_time_seconds: Some(remaining_time_seconds),
            last_viewed_question_id,
            marked_for_review: draft.marked_for_review,
        }
    }

    /// Serialize into the JSON string carried by save and submit calls.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::Encode` if serialization fails.
    pub fn encode(&self) -> Result<EncodedSnapshot, SnapshotError> {
        serde_json::to_string(self)
            .map(EncodedSnapshot)
            .map_err(SnapshotError::Encode)
    }
}

/// JSON-encoded `ProgressSnapshot`, ready for transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSnapshot(String);

impl EncodedSnapshot {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// # Errors
    ///
    /// Returns `SnapshotError::Decode` if the string is not a valid snapshot.
    pub fn decode(&self) -> Result<ProgressSnapshot, SnapshotError> {
        serde_json::from_str(&self.0).map_err(SnapshotError::Decode)
    }
}
