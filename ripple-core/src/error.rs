//! Error types for the Ripple core.
//!
//! Only configuration errors are returned as values. Render failures are
//! panics from component render functions and unwind to whoever triggered
//! the render; lifecycle callback panics are caught and logged.

use thiserror::Error;

/// Errors returned by fallible Ripple operations.
#[derive(Error, Debug)]
pub enum RippleError {
    /// No element matched the selector passed to `App::mount`.
    #[error("mount target not found: no element matches `{selector}`")]
    MountTargetNotFound {
        /// The selector that was resolved.
        selector: String,
    },

    /// The selector uses syntax the document does not understand.
    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector {
        /// The rejected selector.
        selector: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// Serializing a host tree snapshot failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for Ripple operations.
pub type Result<T> = std::result::Result<T, RippleError>;
