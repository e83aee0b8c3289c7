//! Data URI parsing and payload validation.
//!
//! ```text
//! ImageInput
//!     │
//!     ▼
//! ┌──────────────────────────────┐
//! │ 1. Presence                  │  blank → MissingImage
//! ├──────────────────────────────┤
//! │ 2. Header                    │  data:<mime>;base64,
//! │    - scheme, MIME, encoding  │
//! │    - MIME allow-list         │
//! ├──────────────────────────────┤
//! │ 3. Payload                   │
//! │    - non-empty               │
//! │    - base64 decodes          │
//! │    - size limit              │
//! └──────────────────────────────┘
//!     │
//!     ▼
//! PatchImage
//! ```
use std::borrow::Cow;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;

use crate::config::IntakeConfig;
use crate::error::IntakeError;
use crate::types::PatchImage;

/// Standard alphabet; padding optional on decode, always written on encode.
const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Header fields of a `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUriParts<'a> {
    pub mime_type: &'a str,
    pub payload: &'a str,
}

/// Split a `data:<mimetype>;base64,<data>` string into its MIME type and
/// encoded payload.
///
/// Only the syntax is checked here; the payload itself is validated by
/// [`normalize_data_uri`].
///
/// ```rust
/// use intake::parse_data_uri;
///
/// let parts = parse_data_uri("data:image/png;base64,iVBORw0KGgo=").unwrap();
/// assert_eq!(parts.mime_type, "image/png");
/// assert_eq!(parts.payload, "iVBORw0KGgo=");
/// ```
pub fn parse_data_uri(uri: &str) -> Result<DataUriParts<'_>, IntakeError> {
    let uri = uri.trim();
    if uri.is_empty() {
        return Err(IntakeError::MissingImage);
    }

    let rest = match uri.get(..5) {
        Some(scheme) if scheme.eq_ignore_ascii_case("data:") => &uri[5..],
        _ => return Err(IntakeError::NotDataUri),
    };

    let (header, payload) = rest.split_once(',').ok_or(IntakeError::NotDataUri)?;

    let mut params = header.split(';');
    let mime_type = params.next().unwrap_or_default().trim();
    if mime_type.is_empty() {
        return Err(IntakeError::MissingMimeType);
    }
    if !mime_type.contains('/') {
        return Err(IntakeError::UnsupportedMimeType(mime_type.to_string()));
    }

    // RFC 2397: the base64 marker, when present, is the final parameter.
    match params.last().map(str::trim) {
        Some(encoding) if encoding.eq_ignore_ascii_case("base64") => {}
        Some(other) => return Err(IntakeError::UnsupportedEncoding(other.to_string())),
        None => return Err(IntakeError::UnsupportedEncoding("url-encoded".to_string())),
    }

    Ok(DataUriParts { mime_type, payload })
}

/// Validate an embedded-image string against `cfg` and build a [`PatchImage`].
pub fn normalize_data_uri(uri: &str, cfg: &IntakeConfig) -> Result<PatchImage, IntakeError> {
    let parts = parse_data_uri(uri)?;
    let mime_type = check_mime(parts.mime_type, cfg)?;

    let payload = strip_whitespace(parts.payload);
    if payload.is_empty() {
        return Err(IntakeError::EmptyPayload);
    }

    let decoded_len = if cfg.verify_payload {
        LENIENT_STANDARD
            .decode(payload.as_bytes())
            .map_err(|err| IntakeError::InvalidBase64(err.to_string()))?
            .len()
    } else {
        estimated_decoded_len(&payload)
    };
    check_size(decoded_len, cfg)?;

    Ok(PatchImage::new(mime_type, payload.into_owned(), decoded_len))
}

/// Encode raw image bytes into a [`PatchImage`].
pub fn normalize_bytes(
    mime_type: &str,
    bytes: &[u8],
    cfg: &IntakeConfig,
) -> Result<PatchImage, IntakeError> {
    let mime_type = mime_type.trim();
    if mime_type.is_empty() {
        return Err(IntakeError::MissingMimeType);
    }
    let mime_type = check_mime(mime_type, cfg)?;
    if bytes.is_empty() {
        return Err(IntakeError::EmptyPayload);
    }
    check_size(bytes.len(), cfg)?;

    let data = LENIENT_STANDARD.encode(bytes);
    Ok(PatchImage::new(mime_type, data, bytes.len()))
}

fn check_mime(mime_type: &str, cfg: &IntakeConfig) -> Result<String, IntakeError> {
    if !cfg.allows_mime(mime_type) {
        return Err(IntakeError::UnsupportedMimeType(mime_type.to_string()));
    }
    Ok(mime_type.to_ascii_lowercase())
}

fn check_size(decoded_len: usize, cfg: &IntakeConfig) -> Result<(), IntakeError> {
    match cfg.max_payload_bytes {
        Some(limit) if decoded_len > limit => Err(IntakeError::PayloadTooLarge {
            actual: decoded_len,
            limit,
        }),
        _ => Ok(()),
    }
}

/// Line-wrapped base64 (MIME style) is accepted by dropping ASCII whitespace.
fn strip_whitespace(payload: &str) -> Cow<'_, str> {
    let trimmed = payload.trim();
    if trimmed.bytes().any(|b| b.is_ascii_whitespace()) {
        Cow::Owned(
            trimmed
                .chars()
                .filter(|c| !c.is_ascii_whitespace())
                .collect(),
        )
    } else {
        Cow::Borrowed(trimmed)
    }
}

fn estimated_decoded_len(encoded: &str) -> usize {
    let unpadded = encoded.trim_end_matches('=').len();
    unpadded * 3 / 4
}
