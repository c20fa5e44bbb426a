use std::path::PathBuf;
use thiserror::Error;

/// A specialized `Result` type for navigation operations.
pub type NavResult<T> = Result<T, NavError>;

/// The error type for localization and operation execution.
///
/// "Not found" conditions (no match above threshold, no indicator circle)
/// are normal return values and never appear here. Only structurally
/// invalid input or missing assets raise.
#[derive(Debug, Error)]
pub enum NavError {
    #[error(
        "Screenshot has unexpected dimensions {width}x{height}, expected {expected_width}x{expected_height}"
    )]
    InvalidScreenshot {
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },

    #[error("Match threshold {value} is outside [0, 1]")]
    InvalidThreshold { value: f32 },

    #[error("Template '{id}' not found in the template store")]
    TemplateNotFound { id: String },

    #[error("Failed to read template store at {path:?}: {description}")]
    TemplateStoreUnreadable { path: PathBuf, description: String },

    #[error("Large map asset missing for region '{key}' at {path:?}")]
    MapAssetMissing { key: String, path: PathBuf },

    #[error("Failed to decode image at {path:?}: {source}")]
    ImageDecodeFailed {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Unknown region '{region_id}' (level {level}) on planet '{planet_id}'")]
    UnknownRegion {
        planet_id: String,
        region_id: String,
        level: i32,
    },

    #[error("Cannot stitch captures: {description}")]
    StitchFailed { description: String },

    #[error("Controller call '{call}' failed: {description}")]
    ControllerFailed { call: String, description: String },
}
