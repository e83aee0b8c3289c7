//! Image intake for patch analysis.
//!
//! This crate turns whatever the capture or upload layer hands us into a
//! [`PatchImage`]: a validated, self-describing embedded image (MIME type plus
//! base64 payload) ready to be attached to a vision-model request.
//!
//! The rules are simple:
//!
//! - **Fail early** - A blank field, a non-`data:` string, a non-image MIME
//!   type or an undecodable payload is rejected before any model is called.
//! - **Name the field** - Every [`IntakeError`] knows it belongs to
//!   `imageDataUri`, so callers can render field-level feedback.
//! - **No side effects** - Intake never touches the network or the disk.
//! - **Log outcomes** - `intake_success` / `intake_failure` events via tracing.
//!
//! ## Quick example
//!
//! ```rust
//! use intake::{normalize_image, ImageInput, IntakeConfig};
//!
//! let input = ImageInput::data_uri("data:image/jpeg;base64,/9j/4A==");
//! let image = normalize_image(&input, &IntakeConfig::default()).unwrap();
//!
//! assert_eq!(image.mime_type(), "image/jpeg");
//! assert_eq!(image.decoded_len(), 4);
//! ```
use std::time::Instant;

use tracing::{debug, warn};

mod config;
mod error;
mod payload;
mod types;

pub use crate::config::{ConfigError, IntakeConfig, DEFAULT_MAX_PAYLOAD_BYTES};
pub use crate::error::{IntakeError, IMAGE_FIELD};
pub use crate::payload::{normalize_bytes, normalize_data_uri, parse_data_uri, DataUriParts};
pub use crate::types::{ImageInput, PatchImage};

/// Validate `input` and produce an embedded [`PatchImage`].
pub fn normalize_image(input: &ImageInput, cfg: &IntakeConfig) -> Result<PatchImage, IntakeError> {
    let start = Instant::now();
    let result = match input {
        ImageInput::DataUri(uri) => normalize_data_uri(uri, cfg),
        ImageInput::Bytes { mime_type, bytes } => normalize_bytes(mime_type, bytes, cfg),
    };

    let elapsed_micros = start.elapsed().as_micros();
    match &result {
        Ok(image) => debug!(
            mime_type = %image.mime_type(),
            decoded_len = image.decoded_len(),
            elapsed_micros,
            "intake_success"
        ),
        Err(err) => warn!(
            code = err.code(),
            error = %err,
            elapsed_micros,
            "intake_failure"
        ),
    }
    result
}

/// Validate an optional form field holding a data URI.
///
/// A missing field and an empty field are the same failure,
/// [`IntakeError::MissingImage`].
pub fn normalize_field(value: Option<&str>, cfg: &IntakeConfig) -> Result<PatchImage, IntakeError> {
    match value {
        Some(uri) => normalize_image(&ImageInput::data_uri(uri), cfg),
        None => {
            warn!(code = "missing_image", "intake_failure");
            Err(IntakeError::MissingImage)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_image_accepts_data_uri() {
        let input = ImageInput::from("data:image/webp;base64,UklGRg==");
        let image = normalize_image(&input, &IntakeConfig::default()).unwrap();
        assert_eq!(image.mime_type(), "image/webp");
    }

    #[test]
    fn normalize_image_accepts_bytes() {
        let input = ImageInput::bytes("image/png", vec![0x89, b'P', b'N', b'G']);
        let image = normalize_image(&input, &IntakeConfig::default()).unwrap();
        assert_eq!(image.to_data_uri(), "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn normalize_field_treats_none_as_missing() {
        assert_eq!(
            normalize_field(None, &IntakeConfig::default()),
            Err(IntakeError::MissingImage)
        );
    }

    #[test]
    fn normalize_field_treats_empty_as_missing() {
        assert_eq!(
            normalize_field(Some(""), &IntakeConfig::default()),
            Err(IntakeError::MissingImage)
        );
    }
}
