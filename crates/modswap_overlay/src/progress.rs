//! Progress reporting for overlay transitions.

use camino::Utf8PathBuf;
use serde::Serialize;
use std::sync::Arc;

/// Progress information emitted while reverting or applying an overlay.
///
/// `current`/`total` count files within the current stage. `current_file` is the
/// base-relative path being processed, if any.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayProgress {
    /// Current stage of the transition.
    pub stage: OverlayStage,
    /// Overlay the stage operates on.
    pub overlay: String,
    /// Base-relative path currently being processed.
    pub current_file: Option<Utf8PathBuf>,
    /// 1-based index of the current file.
    pub current: usize,
    /// Total number of files in this stage.
    pub total: usize,
}

/// Stages of a transition.
///
/// Emitted in order: `Reverting` (repeated, only if an overlay was active) ->
/// `Applying` (repeated) -> `Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OverlayStage {
    /// Restoring the base directory from a manifest.
    Reverting,
    /// Copying overlay files onto the base directory.
    Applying,
    /// Transition finished successfully.
    Complete,
}

/// Shared progress callback registered on a [`Coordinator`](crate::Coordinator).
pub type ProgressCallback = Arc<dyn Fn(OverlayProgress) + Send + Sync>;

/// Borrowed progress sink passed down to the applier and reverter.
pub type ProgressFn<'a> = &'a dyn Fn(OverlayProgress);

pub(crate) fn emit(progress: Option<ProgressFn<'_>>, event: OverlayProgress) {
    if let Some(callback) = progress {
        callback(event);
    }
}
