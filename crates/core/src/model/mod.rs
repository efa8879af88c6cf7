mod answer;
mod attachment;
mod attempt;
mod draft;
mod ids;
mod progress;
mod question;
mod save_status;
mod snapshot;
mod sync_settings;

pub use ids::{AttemptId, QuestionDetailId, QuestionId, SubmissionKey, TestId};

pub use answer::{AnswerPayload, QuestionAnswer, TransmittedAnswer};
pub use attachment::{FileAttachment, estimated_decoded_len};
pub use attempt::{AttemptError, AttemptParts, TestAttempt};
pub use draft::{DraftError, DraftStore};
pub use progress::{ProgressSummary, QuestionStatus, QuestionStatusTag};
pub use question::{QuestionKind, QuestionRef};
pub use save_status::{SaveState, SaveStatus, SaveTicket, SaveTracker};
pub use snapshot::{DraftSnapshot, EncodedSnapshot, ProgressSnapshot, SnapshotError};
pub use sync_settings::{SyncSettings, SyncSettingsError};
