mod attachments;
mod countdown;
mod scheduler;
mod session;
mod submission;

// Public API of the attempt subsystem.
pub use crate::error::{SessionError, SubmitError};
pub use attachments::{AttachmentInput, AttachmentReport, FileSource, RawFile};
pub use scheduler::{DispatchOutcome, SaveReason, SkipReason, Visibility};
pub use session::{AttemptSession, AttemptSessionBuilder};
pub use submission::{
    FlushOutcome, ResultNavigator, SubmissionResult, SubmitPrompt, SubmitRequestOutcome,
};
