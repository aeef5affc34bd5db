mod preview;

use std::io::Cursor;

use bytes::Bytes;
use image::{ImageError, ImageReader};
use thiserror::Error;
use tracing::{debug, warn};

pub use preview::{PreviewHandle, PreviewStore};

use crate::config::{DEFAULT_MAX_IMAGE_BYTES, DEFAULT_MAX_IMAGE_DIMENSION};

/// Bounds an incoming receipt image must respect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntakeLimits {
    pub max_bytes: u64,
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for IntakeLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
            max_width: DEFAULT_MAX_IMAGE_DIMENSION,
            max_height: DEFAULT_MAX_IMAGE_DIMENSION,
        }
    }
}

impl IntakeLimits {
    pub fn check_size(&self, size: u64) -> Result<(), ValidationError> {
        if size > self.max_bytes {
            return Err(ValidationError::TooLarge {
                size,
                max: self.max_bytes,
            });
        }
        Ok(())
    }

    fn check_dimensions(&self, width: u32, height: u32) -> Result<(), ValidationError> {
        if width > self.max_width || height > self.max_height {
            return Err(ValidationError::DimensionsExceeded {
                width,
                height,
                max_width: self.max_width,
                max_height: self.max_height,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("image is {size} bytes, the limit is {max} bytes")]
    TooLarge { size: u64, max: u64 },
    #[error("image is {width}x{height} pixels, the limit is {max_width}x{max_height}")]
    DimensionsExceeded {
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },
    #[error("file could not be decoded as an image: {0}")]
    InvalidImage(String),
}

impl ValidationError {
    /// Stable key so the page can tell the three rejection kinds apart.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::TooLarge { .. } => "too_large",
            ValidationError::DimensionsExceeded { .. } => "dimensions_exceeded",
            ValidationError::InvalidImage(_) => "invalid_image",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            ValidationError::TooLarge { max, .. } => format!(
                "The selected file is too large. Please choose an image under {} MB.",
                max / (1024 * 1024)
            ),
            ValidationError::DimensionsExceeded {
                max_width,
                max_height,
                ..
            } => format!(
                "The image dimensions are too large. Maximum allowed is {max_width}x{max_height} pixels."
            ),
            ValidationError::InvalidImage(_) => {
                "The selected file is not a valid image.".to_string()
            }
        }
    }
}

/// A file picked, dropped or pasted by the user, not yet validated.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// A validated receipt image.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
    pub size: u64,
    pub width: u32,
    pub height: u32,
}

/// Validate a candidate file and turn it into an [`ImageAsset`].
///
/// The byte size is checked up front. On the blocking pool the header is read
/// and the pixel bounds are checked before any pixel data is decoded.
pub async fn submit_candidate_file(
    candidate: CandidateFile,
    limits: &IntakeLimits,
) -> Result<ImageAsset, ValidationError> {
    let size = candidate.bytes.len() as u64;
    limits.check_size(size)?;

    let bytes = Bytes::from(candidate.bytes);
    let decode_input = bytes.clone();
    let decode_limits = *limits;
    let decoded = tokio::task::spawn_blocking(move || inspect_image(&decode_input, &decode_limits))
        .await
        .map_err(|err| {
            warn!(?err, "image decode task failed");
            ValidationError::InvalidImage(err.to_string())
        })??;

    let content_type = decoded
        .mime
        .map(str::to_string)
        .or(candidate.content_type)
        .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string());

    debug!(
        file = %candidate.file_name,
        size,
        width = decoded.width,
        height = decoded.height,
        "receipt image accepted"
    );

    Ok(ImageAsset {
        file_name: candidate.file_name,
        content_type,
        bytes,
        size,
        width: decoded.width,
        height: decoded.height,
    })
}

struct DecodedImage {
    width: u32,
    height: u32,
    mime: Option<&'static str>,
}

fn reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, ValidationError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| ValidationError::InvalidImage(err.to_string()))
}

fn inspect_image(bytes: &[u8], limits: &IntakeLimits) -> Result<DecodedImage, ValidationError> {
    let header = reader(bytes)?;
    let mime = header.format().map(|format| format.to_mime_type());
    let (width, height) = header
        .into_dimensions()
        .map_err(|err| ValidationError::InvalidImage(err.to_string()))?;
    limits.check_dimensions(width, height)?;

    // The header can lie; the pixel data must decode too.
    reader(bytes)?.decode().map_err(|err| match err {
        ImageError::Limits(_) => ValidationError::DimensionsExceeded {
            width,
            height,
            max_width: limits.max_width,
            max_height: limits.max_height,
        },
        other => ValidationError::InvalidImage(other.to_string()),
    })?;

    Ok(DecodedImage {
        width,
        height,
        mime,
    })
}
