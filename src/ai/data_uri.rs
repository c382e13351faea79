use crate::{Error, Result};
use base64::Engine as _;
use serde::{Serialize, Serializer};
use std::fmt;

/// Decoded image bytes that render as a `data:` URI.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageDataUri {
    mime_type: String,
    bytes: Vec<u8>,
}

impl ImageDataUri {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Decode a base64 inline payload.
    pub fn from_base64(mime_type: impl Into<String>, payload: &str) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| Error::ImageGeneration(format!("Failed to decode base64 image: {}", e)))?;
        if bytes.is_empty() {
            return Err(Error::ImageGeneration("Inline image payload is empty".to_string()));
        }
        Ok(Self::new(mime_type, bytes))
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

// Payloads are large; keep debug output readable.
impl fmt::Debug for ImageDataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageDataUri")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl fmt::Display for ImageDataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uri())
    }
}

impl Serialize for ImageDataUri {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_uri())
    }
}
