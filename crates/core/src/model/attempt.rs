use std::collections::HashSet;

use thiserror::Error;

use crate::model::ids::{AttemptId, QuestionId, TestId};
use crate::model::question::QuestionRef;
use crate::model::snapshot::ProgressSnapshot;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("attempt id cannot be empty")]
    BlankAttemptId,

    #[error("question detail {0} appears more than once")]
    DuplicateQuestion(String),
}

/// One test session as handed out by the grading service.
#[derive(Debug, Clone, PartialEq)]
pub struct TestAttempt {
    attempt_id: AttemptId,
    test_id: TestId,
    questions: Vec<QuestionRef>,
    remaining_seconds: u32,
    last_viewed: Option<QuestionId>,
    terminal: bool,
}

impl TestAttempt {
    /// # Errors
    ///
    /// Returns `AttemptError::BlankAttemptId` for an empty id and
    /// `AttemptError::DuplicateQuestion` when two questions share a detail id.
    pub fn new(
        attempt_id: AttemptId,
        test_id: TestId,
        questions: Vec<QuestionRef>,
        remaining_seconds: u32,
    ) -> Result<Self, AttemptError> {
        if attempt_id.is_blank() {
            return Err(AttemptError::BlankAttemptId);
        }
        let mut seen = HashSet::with_capacity(questions.len());
        for question in &questions {
            if !seen.insert(&question.detail_id) {
                return Err(AttemptError::DuplicateQuestion(
                    question.detail_id.to_string(),
                ));
            }
        }
        Ok(Self {
            attempt_id,
            test_id,
            questions,
            remaining_seconds,
            last_viewed: None,
            terminal: false,
        })
    }

    /// Carry over the remaining time and last-viewed question from a saved draft.
    ///
    /// A draft without a timer keeps the attempt's own value; a saved zero is kept.
    #[must_use]
    pub fn with_saved_progress(mut self, saved: &ProgressSnapshot) -> Self {
        if let Some(remaining) = saved.remaining_time_seconds {
            self.remaining_seconds = remaining;
        }
        if saved.last_viewed_question_id.is_some() {
            self.last_viewed = saved.last_viewed_question_id.clone();
        }
        self
    }

    #[must_use]
    pub fn with_terminal(mut self, terminal: bool) -> Self {
        self.terminal = terminal;
        self
    }

    #[must_use]
    pub fn attempt_id(&self) -> &AttemptId {
        &self.attempt_id
    }

    #[must_use]
    pub fn test_id(&self) -> &TestId {
        &self.test_id
    }

    #[must_use]
    pub fn questions(&self) -> &[QuestionRef] {
        &self.questions
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    #[must_use]
    pub fn last_viewed(&self) -> Option<&QuestionId> {
        self.last_viewed.as_ref()
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Split into owned parts for building a session.
    #[must_use]
    pub fn into_parts(self) -> AttemptParts {
        AttemptParts {
            attempt_id: self.attempt_id,
            test_id: self.test_id,
            questions: self.questions,
            remaining_seconds: self.remaining_seconds,
            last_viewed: self.last_viewed,
            terminal: self.terminal,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttemptParts {
    pub attempt_id: AttemptId,
    pub test_id: TestId,
    pub questions: Vec<QuestionRef>,
    pub remaining_seconds: u32,
    pub last_viewed: Option<QuestionId>,
    pub terminal: bool,
}
