use async_trait::async_trait;
use attempt_core::model::{AttemptId, QuestionDetailId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Namespace prefix shared by every cached drawing of an attempt.
pub const DRAWING_NAMESPACE: &str = "draw_session";

/// Offline state of a drawing canvas, scoped to one question of one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawingCacheEntry {
    pub attempt_id: AttemptId,
    pub detail_id: QuestionDetailId,
    /// Opaque canvas document as produced by the drawing widget.
    pub document: String,
    pub updated_at: DateTime<Utc>,
}

impl DrawingCacheEntry {
    #[must_use]
    pub fn new(
        attempt_id: AttemptId,
        detail_id: QuestionDetailId,
        document: impl Into<String>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            attempt_id,
            detail_id,
            document: document.into(),
            updated_at,
        }
    }

    /// Namespaced key, `draw_session_{attempt}_{question}`.
    #[must_use]
    pub fn key(&self) -> String {
        drawing_key(&self.attempt_id, &self.detail_id)
    }
}

#[must_use]
pub fn drawing_key(attempt_id: &AttemptId, detail_id: &QuestionDetailId) -> String {
    format!("{DRAWING_NAMESPACE}_{attempt_id}_{detail_id}")
}

/// Local cache for drawing canvases that have not been captured yet.
#[async_trait]
pub trait DrawingCacheRepository: Send + Sync {
    /// Insert or replace the cached canvas for a question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the entry cannot be stored.
    async fn put_drawing(&self, entry: &DrawingCacheEntry) -> Result<(), StorageError>;

    /// Fetch the cached canvas for a question, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get_drawing(
        &self,
        attempt_id: &AttemptId,
        detail_id: &QuestionDetailId,
    ) -> Result<Option<DrawingCacheEntry>, StorageError>;

    /// Remove every cached canvas of an attempt. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn clear_attempt(&self, attempt_id: &AttemptId) -> Result<usize, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    drawings: Arc<Mutex<HashMap<(AttemptId, QuestionDetailId), DrawingCacheEntry>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached canvases across all attempts.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn len(&self) -> Result<usize, StorageError> {
        let guard = self
            .drawings
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.len())
    }

    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        self.len().map(|len| len == 0)
    }
}

#[async_trait]
impl DrawingCacheRepository for InMemoryRepository {
    async fn put_drawing(&self, entry: &DrawingCacheEntry) -> Result<(), StorageError> {
        let mut guard = self
            .drawings
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(
            (entry.attempt_id.clone(), entry.detail_id.clone()),
            entry.clone(),
        );
        Ok(())
    }

    async fn get_drawing(
        &self,
        attempt_id: &AttemptId,
        detail_id: &QuestionDetailId,
    ) -> Result<Option<DrawingCacheEntry>, StorageError> {
        let guard = self
            .drawings
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&(attempt_id.clone(), detail_id.clone())).cloned())
    }

    async fn clear_attempt(&self, attempt_id: &AttemptId) -> Result<usize, StorageError> {
        let mut guard = self
            .drawings
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let before = guard.len();
        guard.retain(|(attempt, _), _| attempt != attempt_id);
        Ok(before - guard.len())
    }
}

/// Aggregate handle over the local stores a session needs.
#[derive(Clone)]
pub struct Storage {
    pub drawings: Arc<dyn DrawingCacheRepository>,
}
