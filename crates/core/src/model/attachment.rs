use serde::{Deserialize, Serialize};

/// An uploaded file or captured drawing, already encoded for transmission.
///
/// What is stored here is exactly what is sent; nothing is re-encoded later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttachment {
    #[serde(rename = "filename")]
    pub name: String,
    /// Base64 (standard alphabet) payload.
    pub data: String,
    #[serde(default)]
    pub size: u64,
    pub mime_type: String,
}

impl FileAttachment {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        data: impl Into<String>,
        size: u64,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            size,
            mime_type: mime_type.into(),
        }
    }

    /// Build an attachment from an already-encoded capture, estimating its size.
    #[must_use]
    pub fn from_encoded(
        name: impl Into<String>,
        data: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        let data = data.into();
        let size = estimated_decoded_len(&data);
        Self::new(name, data, size, mime_type)
    }

    /// Restored entries may arrive without a size; fill it in from the payload.
    #[must_use]
    pub(crate) fn with_estimated_size(mut self) -> Self {
        if self.size == 0 {
            self.size = estimated_decoded_len(&self.data);
        }
        self
    }
}

/// Decoded byte length of a base64 payload (`len * 3 / 4`).
#[must_use]
pub fn estimated_decoded_len(encoded: &str) -> u64 {
    (encoded.len() as u64) * 3 / 4
}
