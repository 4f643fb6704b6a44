//! Error Types
//!
//! This module defines the error types used throughout the renderer.
//!
//! # Overview
//!
//! The main error type [`PrismError`] covers all failure modes including:
//! - Scene description schema violations
//! - Plug-in resolution failures
//! - Device resource exhaustion
//! - Image decoding and I/O errors
//!
//! All public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, PrismError>`. Numeric signals inside the
//! integrator (NaN radiance, infinite throughput) are not errors; they are
//! dropped at the accumulation site.

use thiserror::Error;

use crate::sdl::SourceLocation;

/// The main error type for the Prism renderer.
///
/// Fatal errors carry the originating scene-description source location
/// (file, line, column) when one is available. The user-facing contract is
/// a single line with a descriptive message; there is no stack trace.
#[derive(Error, Debug)]
pub enum PrismError {
    // ========================================================================
    // Scene Description Errors
    // ========================================================================
    /// The scene description violates the schema: a bad tag, a
    /// redefinition, a dangling reference, or a wrong property type.
    #[error("Schema error: {message}{location}")]
    Schema {
        /// Description of the violation
        message: String,
        /// Where in the scene description the violation originated
        location: SourceLocation,
    },

    /// A `(tag, impl)` pair did not resolve to a registered plug-in.
    #[error("Plugin error: {0}")]
    Plugin(String),

    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// The bindless table, a tag space, or the transform table overflowed.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    // ========================================================================
    // I/O Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding or decoding error.
    #[error("Image error: {0}")]
    Image(String),

    /// Scene description text is not valid JSON.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PrismError {
    /// Creates a schema error with a known source location.
    #[must_use]
    pub fn schema(message: impl Into<String>, location: SourceLocation) -> Self {
        PrismError::Schema {
            message: message.into(),
            location,
        }
    }

    /// Creates a schema error with no source location.
    #[must_use]
    pub fn schema_unlocated(message: impl Into<String>) -> Self {
        PrismError::Schema {
            message: message.into(),
            location: SourceLocation::unknown(),
        }
    }
}

impl From<image::ImageError> for PrismError {
    fn from(err: image::ImageError) -> Self {
        PrismError::Image(err.to_string())
    }
}

/// Alias for `Result<T, PrismError>`.
pub type Result<T> = std::result::Result<T, PrismError>;
