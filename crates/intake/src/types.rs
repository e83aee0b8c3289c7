//! Public data types for image intake.
use serde::{Deserialize, Serialize};

/// Raw image as handed over by the capture or upload layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageInput {
    /// Already-embedded `data:<mimetype>;base64,<data>` string.
    DataUri(String),
    /// Raw file bytes plus their MIME type; base64-encoded during intake.
    Bytes { mime_type: String, bytes: Vec<u8> },
}

impl ImageInput {
    pub fn data_uri(uri: impl Into<String>) -> Self {
        ImageInput::DataUri(uri.into())
    }

    pub fn bytes(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        ImageInput::Bytes {
            mime_type: mime_type.into(),
            bytes,
        }
    }
}

impl From<String> for ImageInput {
    fn from(value: String) -> Self {
        ImageInput::DataUri(value)
    }
}

impl From<&str> for ImageInput {
    fn from(value: &str) -> Self {
        ImageInput::DataUri(value.to_string())
    }
}

/// A validated, self-describing embedded image.
///
/// Produced only by [`normalize_image`](crate::normalize_image), so holding a
/// `PatchImage` means the MIME type is allowed and the payload is non-empty
/// base64 within the configured size limit. Lives for one analysis request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchImage {
    mime_type: String,
    data: String,
    decoded_len: usize,
}

impl PatchImage {
    pub(crate) fn new(mime_type: String, data: String, decoded_len: usize) -> Self {
        Self {
            mime_type,
            data,
            decoded_len,
        }
    }

    /// Lowercased MIME type, e.g. `image/jpeg`.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Base64 payload without the data URI header.
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Size of the image in bytes once decoded.
    pub fn decoded_len(&self) -> usize {
        self.decoded_len
    }

    /// Render the image back into `data:<mimetype>;base64,<data>` form.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}
