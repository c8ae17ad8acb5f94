//! Error types for Marcher

use marcher_sdf::SdfError;
use thiserror::Error;

/// Result type alias using Marcher's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Marcher operations
#[derive(Error, Debug)]
pub enum Error {
    /// Primitive or settings data was rejected
    #[error(transparent)]
    Sdf(#[from] SdfError),

    /// A scene file could not be interpreted
    #[error("Scene file error: {0}")]
    SceneFile(String),

    /// The attached render backend failed
    #[error("Render backend error: {0}")]
    Backend(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding/decoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
