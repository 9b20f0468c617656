//! Error types shared by the engine stages.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for fallible engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Reasons the calibration search can fail.
///
/// All variants are fatal for the document being analyzed: width predictions
/// made without a profile are meaningless, so no default scale is substituted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalibrationError {
    /// Too few reference words survived filtering.
    #[error("too few usable reference observations: need {needed}, got {got}")]
    InsufficientReferences {
        /// Required minimum number of observations.
        needed: usize,
        /// Observations left after filtering.
        got: usize,
    },
    /// The font library has no descriptors to sweep.
    #[error("font library is empty")]
    EmptyFontLibrary,
    /// No sweep point measured enough of the reference words.
    #[error("no font/size combination could measure at least {needed} reference words")]
    NoMeasurableReferences {
        /// Required minimum number of measurable observations.
        needed: usize,
    },
    /// The most consistent sweep point is still above the allowed variation.
    #[error(
        "no font/size combination reached acceptable consistency \
         (best coefficient of variation {best_variation:.4}, allowed {max_allowed:.4})"
    )]
    Inconsistent {
        /// Lowest coefficient of variation seen in the sweep.
        best_variation: f64,
        /// Configured acceptance threshold.
        max_allowed: f64,
    },
    /// Tracking sweep bounds or step are unusable.
    #[error("invalid tracking sweep: {0}")]
    InvalidSweep(String),
}

/// Top-level error for engine entry points and file-backed helpers.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("I/O error for '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    /// An external collaborator (rasterizer, OCR, font source) failed.
    #[error("{name} failed: {message}")]
    Collaborator { name: String, message: String },
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Convenience constructor for collaborator implementations.
    pub fn collaborator(name: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Collaborator {
            name: name.into(),
            message: message.to_string(),
        }
    }
}
