//! Error types produced by the intake crate.
//!
//! Every variant describes why a submitted photo cannot be turned into a
//! [`PatchImage`](crate::PatchImage). Messages are written for end users: the
//! orchestrator forwards them verbatim as field-level validation feedback, so
//! they must never carry payload bytes or internal detail.
//!
//! | Error | Description |
//! |-------|-------------|
//! | [`MissingImage`](IntakeError::MissingImage) | No image, or only whitespace |
//! | [`NotDataUri`](IntakeError::NotDataUri) | String does not start with `data:` |
//! | [`MissingMimeType`](IntakeError::MissingMimeType) | `data:;base64,...` |
//! | [`UnsupportedEncoding`](IntakeError::UnsupportedEncoding) | Not base64 |
//! | [`UnsupportedMimeType`](IntakeError::UnsupportedMimeType) | MIME type outside the allow-list |
//! | [`EmptyPayload`](IntakeError::EmptyPayload) | Nothing after the comma |
//! | [`InvalidBase64`](IntakeError::InvalidBase64) | Payload does not decode |
//! | [`PayloadTooLarge`](IntakeError::PayloadTooLarge) | Decoded size over the limit |
use thiserror::Error;

/// Name of the inbound request field every intake error is reported against.
pub const IMAGE_FIELD: &str = "imageDataUri";

/// Errors that can occur while validating and normalizing a patch photo.
///
/// # Examples
///
/// ```rust
/// use intake::{IntakeError, IMAGE_FIELD};
///
/// let err = IntakeError::MissingImage;
/// assert_eq!(err.to_string(), "Image data is required.");
/// assert_eq!(err.field(), IMAGE_FIELD);
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum IntakeError {
    /// The image field was absent, empty, or whitespace-only.
    #[error("Image data is required.")]
    MissingImage,

    /// The value is not an embedded-image string.
    #[error("Image must be a data URI of the form 'data:<mimetype>;base64,<data>'.")]
    NotDataUri,

    /// The data URI header names no MIME type.
    #[error("Image data URI is missing its MIME type.")]
    MissingMimeType,

    /// The data URI uses an encoding other than base64.
    #[error("Image data must be base64 encoded (got '{0}').")]
    UnsupportedEncoding(String),

    /// The MIME type is not on the configured allow-list.
    #[error("Unsupported image type '{0}'.")]
    UnsupportedMimeType(String),

    /// Header present but the encoded payload is empty.
    #[error("Image data is empty.")]
    EmptyPayload,

    /// The payload is not valid base64.
    #[error("Image data is not valid base64 ({0}).")]
    InvalidBase64(String),

    /// The decoded image exceeds `max_payload_bytes`.
    #[error("Image is too large ({actual} bytes, limit {limit} bytes).")]
    PayloadTooLarge {
        /// Decoded size in bytes.
        actual: usize,
        /// Configured limit in bytes.
        limit: usize,
    },
}

impl IntakeError {
    /// Request field the error belongs to.
    ///
    /// Intake only ever validates one field, but callers build field-keyed
    /// error maps and should not hard-code the name.
    pub fn field(&self) -> &'static str {
        IMAGE_FIELD
    }

    /// Stable machine-readable code, used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            IntakeError::MissingImage => "missing_image",
            IntakeError::NotDataUri => "not_data_uri",
            IntakeError::MissingMimeType => "missing_mime_type",
            IntakeError::UnsupportedEncoding(_) => "unsupported_encoding",
            IntakeError::UnsupportedMimeType(_) => "unsupported_mime_type",
            IntakeError::EmptyPayload => "empty_payload",
            IntakeError::InvalidBase64(_) => "invalid_base64",
            IntakeError::PayloadTooLarge { .. } => "payload_too_large",
        }
    }
}
