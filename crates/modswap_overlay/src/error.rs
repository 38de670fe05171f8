//! Error types for overlay operations.
//!
//! All fallible functions in this crate return [`Result<T>`], which uses [`Error`]
//! as the error type. `std::io::Error` and `serde_json::Error` are converted via
//! `From` impls; file operations that fail in the middle of an apply are wrapped
//! in [`Error::ApplyFailed`] so the caller learns which path broke.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while applying, reverting or switching overlays.
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem I/O failed outside of a per-file apply step.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse or serialize a manifest.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The base directory is missing or is not a directory.
    #[error("Invalid base directory: {0}")]
    InvalidBaseDir(Utf8PathBuf),

    /// An overlay source directory is missing or is not a directory.
    #[error("Invalid overlay directory: {0}")]
    InvalidOverlayDir(Utf8PathBuf),

    /// The overlay name cannot be used as a single directory name.
    #[error("Invalid overlay name: '{0}'")]
    InvalidOverlayName(String),

    /// The overlay repository does not know this overlay.
    #[error("Overlay not found: {0}")]
    OverlayNotFound(String),

    /// Activation was requested for the overlay that is already active.
    #[error("Overlay '{0}' is already active")]
    AlreadyActive(String),

    /// A manifest already exists for an overlay that is about to be applied.
    #[error("Overlay '{0}' already has a manifest; revert it before applying again")]
    StaleManifest(String),

    /// A persisted manifest is inconsistent (foreign name, unsafe path, ...).
    #[error("Invalid manifest for '{overlay}': {reason}")]
    InvalidManifest { overlay: String, reason: String },

    /// A single file operation failed while applying an overlay.
    ///
    /// The base directory may be partially modified. The manifest written so far
    /// covers every mutation that may have happened and can be reverted.
    #[error("Failed to apply '{overlay}' at '{path}': {source}")]
    ApplyFailed {
        overlay: String,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A single file operation failed while reverting an overlay.
    ///
    /// The manifest is kept, so the revert can be run again once the cause is fixed.
    #[error("Failed to revert '{overlay}' at '{path}': {source}")]
    RevertFailed {
        overlay: String,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A transition failed after the base directory had already been modified.
    ///
    /// `needs_inspection` is `false` when the partially applied overlay was rolled
    /// back cleanly and the base directory is unmodified.
    #[error("Activating '{overlay}' failed: {source}")]
    TransitionFailed {
        overlay: String,
        needs_inspection: bool,
        #[source]
        source: Box<Error>,
    },

    /// A path is not valid UTF-8.
    #[error("Path is not valid UTF-8: {0}")]
    NonUtf8Path(std::path::PathBuf),

    /// Failed to acquire the coordinator mutex (poisoned).
    #[error("Failed to acquire mutex lock")]
    MutexLockFailed,

    /// Catch-all for errors from collaborators (config stores, repositories).
    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl Error {
    /// Whether the base directory may have been left in a mixed state.
    pub fn needs_inspection(&self) -> bool {
        match self {
            Error::ApplyFailed { .. } => true,
            Error::TransitionFailed {
                needs_inspection, ..
            } => *needs_inspection,
            _ => false,
        }
    }
}

/// Extension trait for converting `Result<T, PoisonError>` to [`Result<T>`].
pub trait MutexResultExt<T> {
    fn mutex_err(self) -> Result<T>;
}

impl<T, E> MutexResultExt<T> for std::result::Result<T, std::sync::PoisonError<E>> {
    fn mutex_err(self) -> Result<T> {
        self.map_err(|_| Error::MutexLockFailed)
    }
}
