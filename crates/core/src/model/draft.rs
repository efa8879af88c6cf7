use std::collections::BTreeMap;

use thiserror::Error;

use crate::model::answer::{AnswerPayload, QuestionAnswer, TransmittedAnswer};
use crate::model::attachment::FileAttachment;
use crate::model::ids::{QuestionDetailId, QuestionId};
use crate::model::progress::ProgressSummary;
use crate::model::question::QuestionRef;
use crate::model::snapshot::{DraftSnapshot, ProgressSnapshot};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DraftError {
    #[error("question {0} is not part of this attempt")]
    UnknownQuestion(QuestionDetailId),

    #[error("question {0} does not accept attachments")]
    AttachmentsNotAccepted(QuestionDetailId),
}

//
// ─── DRAFT STORE ───────────────────────────────────────────────────────────────
//

/// In-memory answers, review flags and attachments for one attempt.
///
/// Single source of truth for the UI. Savers and the submitter only read it
/// through [`DraftStore::snapshot_for_transmission`].
#[derive(Debug, Clone, Default)]
pub struct DraftStore {
    questions: Vec<QuestionRef>,
    answers: BTreeMap<QuestionDetailId, QuestionAnswer>,
}

impl DraftStore {
    #[must_use]
    pub fn new(questions: Vec<QuestionRef>) -> Self {
        Self {
            questions,
            answers: BTreeMap::new(),
        }
    }

    /// Build a draft from the attempt's questions and a previously saved snapshot.
    ///
    /// Entries for questions outside `questions` are dropped. Attachments are
    /// only restored for questions that accept them.
    #[must_use]
    pub fn restore(questions: Vec<QuestionRef>, persisted: Option<&ProgressSnapshot>) -> Self {
        let mut store = Self::new(questions);
        let Some(persisted) = persisted else {
            return store;
        };

        for (detail_id, saved) in &persisted.answers {
            let Some(question) = store.question(detail_id) else {
                continue;
            };
            let attachments = if question.kind.accepts_attachments() {
                saved
                    .base64_images
                    .iter()
                    .cloned()
                    .map(FileAttachment::with_estimated_size)
                    .collect()
            } else {
                Vec::new()
            };
            let entry = store.answers.entry(detail_id.clone()).or_default();
            entry.payload = saved.answer.clone();
            for attachment in attachments {
                if !entry.has_attachment(&attachment.name, attachment.size) {
                    entry.attachments.push(attachment);
                }
            }
        }

        for (detail_id, marked) in &persisted.marked_for_review {
            if *marked && store.question(detail_id).is_some() {
                store
                    .answers
                    .entry(detail_id.clone())
                    .or_default()
                    .marked_for_review = true;
            }
        }

        store.answers.retain(|_, answer| !answer.is_blank());
        store
    }

    #[must_use]
    pub fn questions(&self) -> &[QuestionRef] {
        &self.questions
    }

    #[must_use]
    pub fn question(&self, detail_id: &QuestionDetailId) -> Option<&QuestionRef> {
        self.questions.iter().find(|q| &q.detail_id == detail_id)
    }

    /// Look a question up by its bank identity (used for last-viewed).
    #[must_use]
    pub fn question_by_bank_id(&self, question_id: &QuestionId) -> Option<&QuestionRef> {
        self.questions.iter().find(|q| &q.question_id == question_id)
    }

    #[must_use]
    pub fn get_answer(&self, detail_id: &QuestionDetailId) -> Option<&QuestionAnswer> {
        self.answers.get(detail_id)
    }

    #[must_use]
    pub fn is_marked_for_review(&self, detail_id: &QuestionDetailId) -> bool {
        self.answers
            .get(detail_id)
            .is_some_and(|a| a.marked_for_review)
    }

    #[must_use]
    pub fn attachments(&self, detail_id: &QuestionDetailId) -> &[FileAttachment] {
        self.answers
            .get(detail_id)
            .map(|a| a.attachments.as_slice())
            .unwrap_or_default()
    }

    /// True when an attachment with the same name and byte size is already stored.
    #[must_use]
    pub fn contains_attachment(&self, detail_id: &QuestionDetailId, name: &str, size: u64) -> bool {
        self.answers
            .get(detail_id)
            .is_some_and(|a| a.has_attachment(name, size))
    }

    /// Store a payload. Returns whether the stored value changed.
    ///
    /// # Errors
    ///
    /// Returns `DraftError::UnknownQuestion` if the question is not in the attempt.
    pub fn set_answer(
        &mut self,
        detail_id: &QuestionDetailId,
        payload: AnswerPayload,
    ) -> Result<bool, DraftError> {
        self.ensure_known(detail_id)?;
        let entry = self.answers.entry(detail_id.clone()).or_default();
        if entry.payload.as_ref() == Some(&payload) {
            return Ok(false);
        }
        entry.payload = Some(payload);
        Ok(true)
    }

    /// Drop the payload for a question. Returns whether anything was removed.
    ///
    /// # Errors
    ///
    /// Returns `DraftError::UnknownQuestion` if the question is not in the attempt.
    pub fn clear_answer(&mut self, detail_id: &QuestionDetailId) -> Result<bool, DraftError> {
        self.ensure_known(detail_id)?;
        let Some(entry) = self.answers.get_mut(detail_id) else {
            return Ok(false);
        };
        let changed = entry.payload.take().is_some();
        self.prune(detail_id);
        Ok(changed)
    }

    /// Flip the review flag and return its new value.
    ///
    /// # Errors
    ///
    /// Returns `DraftError::UnknownQuestion` if the question is not in the attempt.
    pub fn toggle_mark_for_review(
        &mut self,
        detail_id: &QuestionDetailId,
    ) -> Result<bool, DraftError> {
        self.ensure_known(detail_id)?;
        let entry = self.answers.entry(detail_id.clone()).or_default();
        entry.marked_for_review = !entry.marked_for_review;
        let marked = entry.marked_for_review;
        self.prune(detail_id);
        Ok(marked)
    }

    /// Append an encoded attachment unless an identical (name, size) one exists.
    ///
    /// Returns `false` for a silently discarded duplicate.
    ///
    /// # Errors
    ///
    /// Returns `DraftError::UnknownQuestion` or `DraftError::AttachmentsNotAccepted`.
    pub fn push_attachment(
        &mut self,
        detail_id: &QuestionDetailId,
        attachment: FileAttachment,
    ) -> Result<bool, DraftError> {
        self.ensure_accepts_attachments(detail_id)?;
        let entry = self.answers.entry(detail_id.clone()).or_default();
        if entry.has_attachment(&attachment.name, attachment.size) {
            return Ok(false);
        }
        entry.attachments.push(attachment);
        Ok(true)
    }

    /// Remove every attachment with the given name from a question.
    ///
    /// # Errors
    ///
    /// Returns `DraftError::UnknownQuestion` if the question is not in the attempt.
    pub fn remove_attachment(
        &mut self,
        detail_id: &QuestionDetailId,
        name: &str,
    ) -> Result<bool, DraftError> {
        self.ensure_known(detail_id)?;
        let Some(entry) = self.answers.get_mut(detail_id) else {
            return Ok(false);
        };
        let before = entry.attachments.len();
        entry.attachments.retain(|a| a.name != name);
        let changed = entry.attachments.len() != before;
        self.prune(detail_id);
        Ok(changed)
    }

    /// Drop every attachment of every question. Returns whether anything was removed.
    pub fn clear_attachments(&mut self) -> bool {
        let mut changed = false;
        for answer in self.answers.values_mut() {
            changed |= !answer.attachments.is_empty();
            answer.attachments.clear();
        }
        self.answers.retain(|_, answer| !answer.is_blank());
        changed
    }

    /// Pure projection of answers and review flags for transmission.
    #[must_use]
    pub fn snapshot_for_transmission(&self) -> DraftSnapshot {
        let mut snapshot = DraftSnapshot::default();
        for question in &self.questions {
            let Some(answer) = self.answers.get(&question.detail_id) else {
                continue;
            };
            if let Some(entry) = TransmittedAnswer::from_answer(answer) {
                snapshot.answers.insert(question.detail_id.clone(), entry);
            }
            if answer.marked_for_review {
                snapshot
                    .marked_for_review
                    .insert(question.detail_id.clone(), true);
            }
        }
        snapshot
    }

    /// Completed/marked/unanswered counts plus the navigation grid.
    #[must_use]
    pub fn progress(&self) -> ProgressSummary {
        ProgressSummary::project(self)
    }

    fn ensure_known(&self, detail_id: &QuestionDetailId) -> Result<&QuestionRef, DraftError> {
        self.question(detail_id)
            .ok_or_else(|| DraftError::UnknownQuestion(detail_id.clone()))
    }

    fn ensure_accepts_attachments(&self, detail_id: &QuestionDetailId) -> Result<(), DraftError> {
        let question = self.ensure_known(detail_id)?;
        if question.kind.accepts_attachments() {
            Ok(())
        } else {
            Err(DraftError::AttachmentsNotAccepted(detail_id.clone()))
        }
    }

    fn prune(&mut self, detail_id: &QuestionDetailId) {
        if self.answers.get(detail_id).is_some_and(QuestionAnswer::is_blank) {
            self.answers.remove(detail_id);
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
