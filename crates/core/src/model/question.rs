use serde::{Deserialize, Serialize};

use crate::model::ids::{QuestionDetailId, QuestionId};

/// Response format of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    #[serde(alias = "Single Choice")]
    SingleChoice,
    #[serde(alias = "Multiple Choice")]
    MultipleChoice,
    #[serde(alias = "Short Answer")]
    ShortAnswer,
    #[serde(alias = "Essay")]
    Essay,
    #[serde(alias = "Long Answer")]
    LongAnswer,
}

impl QuestionKind {
    /// Only free-form written questions take uploaded files or drawings.
    #[must_use]
    pub fn accepts_attachments(self) -> bool {
        matches!(self, Self::Essay | Self::LongAnswer)
    }
}

/// Reference to one question of an attempt, in attempt order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRef {
    pub detail_id: QuestionDetailId,
    pub question_id: QuestionId,
    pub kind: QuestionKind,
}

impl QuestionRef {
    #[must_use]
    pub fn new(
        detail_id: impl Into<QuestionDetailId>,
        question_id: impl Into<QuestionId>,
        kind: QuestionKind,
    ) -> Self {
        Self {
            detail_id: detail_id.into(),
            question_id: question_id.into(),
            kind,
        }
    }
}
