use crate::model::draft::DraftStore;
use crate::model::ids::QuestionDetailId;

/// Navigation-grid status of a single question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuestionStatus {
    NotAttempted,
    Marked,
    Completed,
    CompletedMarked,
}

impl QuestionStatus {
    fn from_flags(completed: bool, marked: bool) -> Self {
        match (completed, marked) {
            (true, true) => Self::CompletedMarked,
            (true, false) => Self::Completed,
            (false, true) => Self::Marked,
            (false, false) => Self::NotAttempted,
        }
    }

    #[must_use]
    pub fn is_completed(self) -> bool {
        matches!(self, Self::Completed | Self::CompletedMarked)
    }

    #[must_use]
    pub fn is_marked(self) -> bool {
        matches!(self, Self::Marked | Self::CompletedMarked)
    }
}

/// One cell of the navigation grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionStatusTag {
    pub index: usize,
    pub detail_id: QuestionDetailId,
    pub status: QuestionStatus,
}

/// Aggregated view of attempt progress, useful for UI.
///
/// Derived on demand from the draft; holds no state of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSummary {
    pub total: usize,
    pub completed: usize,
    pub marked_for_review: usize,
    pub not_attempted: usize,
    pub grid: Vec<QuestionStatusTag>,
}

impl ProgressSummary {
    #[must_use]
    pub fn project(draft: &DraftStore) -> Self {
        let grid: Vec<QuestionStatusTag> = draft
            .questions()
            .iter()
            .enumerate()
            .map(|(index, question)| {
                let answer = draft.get_answer(&question.detail_id);
                let completed = answer.is_some_and(|a| a.is_complete());
                let marked = answer.is_some_and(|a| a.marked_for_review);
                QuestionStatusTag {
                    index,
                    detail_id: question.detail_id.clone(),
                    status: QuestionStatus::from_flags(completed, marked),
                }
            })
            .collect();

        let total = grid.len();
        let completed = grid.iter().filter(|t| t.status.is_completed()).count();
        let marked_for_review = grid.iter().filter(|t| t.status.is_marked()).count();

        Self {
            total,
            completed,
            marked_for_review,
            not_attempted: total - completed,
            grid,
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.not_attempted == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::answer::AnswerPayload;
    use crate::model::question::{QuestionKind, QuestionRef};

    fn draft() -> DraftStore {
        DraftStore::new(vec![
            QuestionRef::new("Q1", "B1", QuestionKind::SingleChoice),
            QuestionRef::new("Q2", "B2", QuestionKind::ShortAnswer),
            QuestionRef::new("Q3", "B3", QuestionKind::Essay),
        ])
    }

    #[test]
    fn empty_draft_has_everything_unattempted() {
        let summary = draft().progress();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.completed, 0);
        assert_eq!(summary.not_attempted, 3);
        assert!(summary
            .grid
            .iter()
            .all(|t| t.status == QuestionStatus::NotAttempted));
    }

    #[test]
    fn counts_follow_the_draft() {
        let mut draft = draft();
        let q1 = QuestionDetailId::new("Q1");
        let q2 = QuestionDetailId::new("Q2");
        let q3 = QuestionDetailId::new("Q3");
        draft.set_answer(&q1, AnswerPayload::choices(["A"])).unwrap();
        draft.toggle_mark_for_review(&q1).unwrap();
        draft.toggle_mark_for_review(&q2).unwrap();
        draft.set_answer(&q3, AnswerPayload::text("   ")).unwrap();

        let summary = draft.progress();

        assert_eq!(summary.completed, 1);
        assert_eq!(summary.marked_for_review, 2);
        assert_eq!(summary.not_attempted, 2);
        assert_eq!(summary.grid[0].status, QuestionStatus::CompletedMarked);
        assert_eq!(summary.grid[1].status, QuestionStatus::Marked);
        assert_eq!(summary.grid[2].status, QuestionStatus::NotAttempted);
        assert!(!summary.is_complete());
    }
}
