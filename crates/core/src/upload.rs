//! Uploaded image validation.
//!
//! Turns raw multipart bytes into a [`ValidatedImage`]: size-checked, format
//! sniffed from magic bytes, and with pixel dimensions read from the header.
//! The pixel data itself is only decoded later by the analyzer.

use std::io::Cursor;
use std::sync::Arc;

use image::{ImageFormat, ImageReader};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::hashing::sha256_hex;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default per-image upload limit (20 MiB).
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// Default per-image pixel limit (40 megapixels), checked against the header
/// before anything is decoded.
pub const DEFAULT_MAX_IMAGE_PIXELS: u64 = 40_000_000;

/// Per-image limits applied by [`validate_image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_bytes: usize,
    pub max_pixels: u64,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
            max_pixels: DEFAULT_MAX_IMAGE_PIXELS,
        }
    }
}

// ---------------------------------------------------------------------------
// Image role
// ---------------------------------------------------------------------------

/// Which side of the comparison an upload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageRole {
    PreOp,
    DuringOp,
}

impl ImageRole {
    /// Canonical multipart field name.
    pub fn field_name(self) -> &'static str {
        match self {
            ImageRole::PreOp => "pre_op",
            ImageRole::DuringOp => "during_op",
        }
    }

    /// Resolve a multipart field name, accepting the legacy `*_image` aliases.
    pub fn from_field_name(name: &str) -> Option<Self> {
        match name {
            "pre_op" | "pre_op_image" => Some(ImageRole::PreOp),
            "during_op" | "during_op_image" => Some(ImageRole::DuringOp),
            _ => None,
        }
    }
}

impl std::fmt::Display for ImageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.field_name())
    }
}

// ---------------------------------------------------------------------------
// Image kind
// ---------------------------------------------------------------------------

/// Accepted image encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Png,
    Jpeg,
    Webp,
}

impl ImageKind {
    fn from_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Png => Some(ImageKind::Png),
            ImageFormat::Jpeg => Some(ImageKind::Jpeg),
            ImageFormat::WebP => Some(ImageKind::Webp),
            _ => None,
        }
    }

    pub fn as_format(self) -> ImageFormat {
        match self {
            ImageKind::Png => ImageFormat::Png,
            ImageKind::Jpeg => ImageFormat::Jpeg,
            ImageKind::Webp => ImageFormat::WebP,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageKind::Png => "image/png",
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Webp => "image/webp",
        }
    }
}

// ---------------------------------------------------------------------------
// Upload types
// ---------------------------------------------------------------------------

/// One file received from a multipart form. Lives for a single request.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub role: ImageRole,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// An upload that passed [`validate_image`].
///
/// Bytes are shared so the analyzer can move them onto the blocking pool
/// without copying.
#[derive(Debug, Clone)]
pub struct ValidatedImage {
    pub role: ImageRole,
    pub kind: ImageKind,
    pub width: u32,
    pub height: u32,
    pub filename: Option<String>,
    pub bytes: Arc<[u8]>,
}

/// Metadata kept about an image after the request ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSummary {
    pub filename: Option<String>,
    pub format: ImageKind,
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
    pub sha256: String,
}

impl ValidatedImage {
    pub fn summary(&self) -> ImageSummary {
        ImageSummary {
            filename: self.filename.clone(),
            format: self.kind,
            width: self.width,
            height: self.height,
            size_bytes: self.bytes.len() as u64,
            sha256: sha256_hex(&self.bytes),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a single upload.
///
/// The format is detected from the file contents; the filename and declared
/// content type are informational only. Dimensions come from the header, so
/// an image claiming more than `limits.max_pixels` is rejected without being
/// decoded.
pub fn validate_image(
    upload: UploadedImage,
    limits: &UploadLimits,
) -> Result<ValidatedImage, CoreError> {
    let role = upload.role;
    let max_bytes = limits.max_bytes;

    if upload.bytes.is_empty() {
        return Err(CoreError::Validation(format!("'{role}' file is empty")));
    }

    if upload.bytes.len() > max_bytes {
        return Err(CoreError::PayloadTooLarge(format!(
            "'{role}' is {} bytes; the limit is {max_bytes} bytes",
            upload.bytes.len()
        )));
    }

    let kind = image::guess_format(&upload.bytes)
        .ok()
        .and_then(ImageKind::from_format)
        .ok_or_else(|| {
            CoreError::UnsupportedImage(format!(
                "'{role}' is not a PNG, JPEG or WebP image"
            ))
        })?;

    let (width, height) = ImageReader::with_format(Cursor::new(&upload.bytes), kind.as_format())
        .into_dimensions()
        .map_err(|e| {
            CoreError::UnsupportedImage(format!("'{role}' has an unreadable header: {e}"))
        })?;

    if let Some(declared) = upload.content_type.as_deref() {
        if declared != kind.mime_type() {
            tracing::debug!(
                field = %role,
                declared,
                detected = kind.mime_type(),
                "Declared content type differs from image contents",
            );
        }
    }

    if width == 0 || height == 0 {
        return Err(CoreError::UnsupportedImage(format!(
            "'{role}' has zero dimensions"
        )));
    }

    let pixels = u64::from(width) * u64::from(height);
    if pixels > limits.max_pixels {
        return Err(CoreError::PayloadTooLarge(format!(
            "'{role}' is {width}x{height} ({pixels} pixels); the limit is {} pixels",
            limits.max_pixels
        )));
    }

    Ok(ValidatedImage {
        role,
        kind,
        width,
        height,
        filename: upload.filename,
        bytes: upload.bytes.into(),
    })
}
