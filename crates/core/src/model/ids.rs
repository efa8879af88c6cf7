use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Declares a string-backed identity issued by the grading service.
macro_rules! remote_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// True when the service handed back an empty identity.
            #[must_use]
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

remote_id!(
    /// Identifies a test definition.
    TestId
);

remote_id!(
    /// Identifies one attempt at a test, in progress or terminal.
    AttemptId
);

remote_id!(
    /// Identifies a question in the question bank.
    QuestionId
);

remote_id!(
    /// Stable per-question identity within an attempt.
    ///
    /// Answers, review flags and attachments are keyed by this id.
    QuestionDetailId
);

/// Client-generated key shared by every submit call of one session.
///
/// Lets the grading service recognise a retry as the same logical submission.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionKey(Uuid);

impl SubmissionKey {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Debug for SubmissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubmissionKey({})", self.0)
    }
}

impl fmt::Display for SubmissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = QuestionDetailId::new("TQD-0001");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"TQD-0001\"");
        assert_eq!(format!("{id:?}"), "QuestionDetailId(TQD-0001)");
    }

    #[test]
    fn blank_ids_are_detected() {
        assert!(AttemptId::new("  ").is_blank());
        assert!(!AttemptId::new("TA-1").is_blank());
    }

    #[test]
    fn submission_keys_are_unique() {
        assert_ne!(SubmissionKey::generate(), SubmissionKey::generate());
    }
}
