//! Attachment normalizer: turns uploaded files and drawing captures into
//! base64 attachments on the draft.

use std::collections::HashSet;
use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, warn};

use attempt_core::model::{DraftError, FileAttachment, QuestionDetailId};

use super::session::SessionCore;
use crate::error::AttachmentError;

/// Where the bytes of an uploaded file live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    Bytes(Vec<u8>),
    Path(PathBuf),
}

/// An uploaded file, not yet encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile {
    pub name: String,
    /// Size reported by the file picker; part of the duplicate check.
    pub size: u64,
    pub mime_type: String,
    pub source: FileSource,
}

impl RawFile {
    #[must_use]
    pub fn from_bytes(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            mime_type: mime_type.into(),
            source: FileSource::Bytes(bytes),
        }
    }

    #[must_use]
    pub fn from_path(
        name: impl Into<String>,
        size: u64,
        mime_type: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: mime_type.into(),
            source: FileSource::Path(path.into()),
        }
    }

    async fn encode(self) -> Result<FileAttachment, AttachmentError> {
        let bytes = match self.source {
            FileSource::Bytes(bytes) => bytes,
            FileSource::Path(path) => {
                tokio::fs::read(&path)
                    .await
                    .map_err(|source| AttachmentError::Read {
                        name: self.name.clone(),
                        source,
                    })?
            }
        };
        Ok(FileAttachment::new(
            self.name,
            STANDARD.encode(&bytes),
            self.size,
            self.mime_type,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentInput {
    /// A batch from the file picker, encoded one at a time.
    Files(Vec<RawFile>),
    /// An already-encoded capture such as a drawing.
    Capture(FileAttachment),
}

/// Per-call tally of what happened to each input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttachmentReport {
    pub added: usize,
    pub duplicates: usize,
    pub failed: usize,
}

impl SessionCore {
    fn ensure_attachable(&self, detail_id: &QuestionDetailId) -> Result<(), DraftError> {
        let state = self.lock();
        match state.draft.question(detail_id) {
            None => Err(DraftError::UnknownQuestion(detail_id.clone())),
            Some(q) if !q.kind.accepts_attachments() => {
                Err(DraftError::AttachmentsNotAccepted(detail_id.clone()))
            }
            Some(_) => Ok(()),
        }
    }

    fn has_attachment(&self, detail_id: &QuestionDetailId, name: &str, size: u64) -> bool {
        self.lock().draft.contains_attachment(detail_id, name, size)
    }

    /// Returns `None` once the draft stops accepting mutations.
    fn store_attachment(
        &self,
        detail_id: &QuestionDetailId,
        attachment: FileAttachment,
    ) -> Result<Option<bool>, DraftError> {
        self.mutate(|draft| {
            draft
                .push_attachment(detail_id, attachment)
                .map(|added| (added, added))
        })
    }

    pub(crate) async fn add_attachments(
        &self,
        detail_id: &QuestionDetailId,
        input: AttachmentInput,
    ) -> Result<AttachmentReport, DraftError> {
        self.ensure_attachable(detail_id)?;
        let mut report = AttachmentReport::default();

        let files = match input {
            AttachmentInput::Capture(capture) => {
                match self.store_attachment(detail_id, capture)? {
                    Some(true) => report.added += 1,
                    Some(false) => report.duplicates += 1,
                    None => {}
                }
                return Ok(report);
            }
            AttachmentInput::Files(files) => files,
        };

        let mut seen = HashSet::with_capacity(files.len());
        for file in files {
            let key = (file.name.clone(), file.size);
            if !seen.insert(key) || self.has_attachment(detail_id, &file.name, file.size) {
                debug!(question = %detail_id, file = %file.name, "skipping duplicate attachment");
                report.duplicates += 1;
                continue;
            }
            let attachment = match file.encode().await {
                Ok(attachment) => attachment,
                Err(err) => {
                    warn!(question = %detail_id, error = %err, "skipping unreadable attachment");
                    report.failed += 1;
                    continue;
                }
            };
            match self.store_attachment(detail_id, attachment)? {
                Some(true) => report.added += 1,
                Some(false) => report.duplicates += 1,
                None => break,
            }
        }
        Ok(report)
    }

    pub(crate) fn remove_attachment(
        &self,
        detail_id: &QuestionDetailId,
        name: &str,
    ) -> Result<bool, DraftError> {
        let removed = self.mutate(|draft| {
            draft
                .remove_attachment(detail_id, name)
                .map(|removed| (removed, removed))
        })?;
        Ok(removed.unwrap_or(false))
    }

    pub(crate) fn reset_attachments(&self) -> bool {
        let cleared = self.mutate(|draft| {
            let cleared = draft.clear_attachments();
            Ok((cleared, cleared))
        });
        matches!(cleared, Ok(Some(true)))
    }
}
