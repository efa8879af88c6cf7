use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::attachment::FileAttachment;

/// Raw answer as entered by the learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerPayload {
    /// Free text (short answer, essay).
    Text(String),
    /// Selected option keys (single or multiple choice).
    Choices(Vec<String>),
    /// Any other structured response (matching, ordering, ...).
    Structured(Value),
}

impl AnswerPayload {
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    #[must_use]
    pub fn choices<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Choices(values.into_iter().map(Into::into).collect())
    }

    /// A payload counts as an answer only when it carries something.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::Choices(choices) => choices.iter().all(|c| c.trim().is_empty()),
            Self::Structured(value) => match value {
                Value::Null => true,
                Value::String(s) => s.trim().is_empty(),
                Value::Array(items) => items.is_empty(),
                Value::Object(fields) => fields.is_empty(),
                Value::Bool(_) | Value::Number(_) => false,
            },
        }
    }
}

/// Current local state of one question.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuestionAnswer {
    pub payload: Option<AnswerPayload>,
    pub marked_for_review: bool,
    pub attachments: Vec<FileAttachment>,
}

impl QuestionAnswer {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.payload.as_ref().is_some_and(|p| !p.is_empty())
    }

    pub(crate) fn has_attachment(&self, name: &str, size: u64) -> bool {
        self.attachments
            .iter()
            .any(|a| a.name == name && a.size == size)
    }

    pub(crate) fn is_blank(&self) -> bool {
        self.payload.is_none() && !self.marked_for_review && self.attachments.is_empty()
    }
}

/// Answer entry as transmitted to the grading service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransmittedAnswer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<AnswerPayload>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub base64_images: Vec<FileAttachment>,
}

impl TransmittedAnswer {
    pub(crate) fn from_answer(answer: &QuestionAnswer) -> Option<Self> {
        let payload = answer.payload.clone().filter(|p| !p.is_empty());
        if payload.is_none() && answer.attachments.is_empty() {
            return None;
        }
        Some(Self {
            answer: payload,
            base64_images: answer.attachments.clone(),
        })
    }
}
