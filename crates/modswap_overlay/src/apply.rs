//! Overlay applier.
//!
//! # Apply Algorithm
//!
//! 1. Validate the overlay name, the base directory and the overlay directory, and
//!    refuse to run if the overlay already has a manifest.
//! 2. Enumerate every file of the overlay recursively (empty directories are ignored).
//! 3. Wipe any leftover backup area and persist an empty manifest.
//! 4. For each file at relative path `r`:
//!    - Record the parent directories of `base/r` that do not exist yet, then create them.
//!    - If `base/r` exists, back it up and record `r` as overwritten; otherwise record
//!      `r` as added. The manifest is persisted before `base/r` is touched.
//!    - Copy the overlay file onto `base/r`, preserving permissions and timestamps.
//!
//! Because every entry is persisted ahead of its mutation, the manifest on disk is
//! always a superset of what was actually changed. Reverting it after a crash or a
//! failed copy is safe: deleting an added file that was never written is tolerated,
//! and restoring an overwritten file that was never replaced is a no-op.

use crate::error::{Error, Result};
use crate::manifest::{Manifest, ManifestStore};
use crate::progress::{emit, OverlayProgress, OverlayStage, ProgressFn};
use crate::utils::{
    copy_with_metadata, is_valid_overlay_name, normalize_rel_path, path_exists, to_utf8,
};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io;
use walkdir::WalkDir;

/// A file of an overlay, with its base-relative manifest key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayFile {
    /// Absolute path of the file inside the overlay directory.
    pub source: Utf8PathBuf,
    /// Normalized path relative to the overlay root (and to the base directory).
    pub rel_path: Utf8PathBuf,
}

/// Apply the overlay at `overlay_dir` onto `base_dir` and return its manifest.
///
/// See the module-level docs for the full algorithm. Fails with
/// [`Error::StaleManifest`] if `store` already holds a manifest for `overlay_name`;
/// that manifest has to be reverted first.
pub fn apply_overlay<S: ManifestStore + ?Sized>(
    store: &mut S,
    overlay_dir: &Utf8Path,
    base_dir: &Utf8Path,
    overlay_name: &str,
    progress: Option<ProgressFn<'_>>,
) -> Result<Manifest> {
    validate_dirs(overlay_dir, base_dir, overlay_name)?;

    if store.load(overlay_name)?.is_some() {
        return Err(Error::StaleManifest(overlay_name.to_string()));
    }

    let files = collect_overlay_files(overlay_dir)?;

    tracing::info!(
        "Applying overlay '{}' from {} onto {} ({} files)",
        overlay_name,
        overlay_dir,
        base_dir,
        files.len()
    );

    // Backups must start from an empty area; a leftover one belongs to no manifest.
    store.discard(overlay_name)?;
    let mut manifest = Manifest::new(overlay_name);
    store.save(&manifest)?;

    let total = files.len();
    for (idx, file) in files.iter().enumerate() {
        emit(
            progress,
            OverlayProgress {
                stage: OverlayStage::Applying,
                overlay: overlay_name.to_string(),
                current_file: Some(file.rel_path.clone()),
                current: idx + 1,
                total,
            },
        );

        apply_file(store, &mut manifest, base_dir, file)?;
    }

    tracing::info!(
        "Applied overlay '{}': added={} overwritten={} created_dirs={}",
        overlay_name,
        manifest.added.len(),
        manifest.overwritten.len(),
        manifest.created_dirs.len()
    );

    Ok(manifest)
}

/// List every file of an overlay, sorted by path.
///
/// Symlinks are followed when they point at a file. Directories produce no entries.
pub fn collect_overlay_files(overlay_dir: &Utf8Path) -> Result<Vec<OverlayFile>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(overlay_dir.as_std_path()).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.path().is_file() {
            continue;
        }

        let source = to_utf8(entry.path())?;
        let Some(rel_path) = source
            .strip_prefix(overlay_dir)
            .ok()
            .and_then(normalize_rel_path)
        else {
            tracing::warn!("Skipping overlay entry outside of {}: {}", overlay_dir, source);
            continue;
        };

        files.push(OverlayFile { source, rel_path });
    }

    Ok(files)
}

/// Check the name and both directories before anything is modified.
///
/// Rejects an overlay nested in the base directory (or the reverse), since it
/// would be copied onto itself.
pub(crate) fn validate_dirs(
    overlay_dir: &Utf8Path,
    base_dir: &Utf8Path,
    overlay_name: &str,
) -> Result<()> {
    if !is_valid_overlay_name(overlay_name) {
        return Err(Error::InvalidOverlayName(overlay_name.to_string()));
    }
    if !base_dir.as_std_path().is_dir() {
        return Err(Error::InvalidBaseDir(base_dir.to_path_buf()));
    }
    if !overlay_dir.as_std_path().is_dir() {
        return Err(Error::InvalidOverlayDir(overlay_dir.to_path_buf()));
    }

    let base_real = fs::canonicalize(base_dir.as_std_path())?;
    let overlay_real = fs::canonicalize(overlay_dir.as_std_path())?;
    if base_real.starts_with(&overlay_real) || overlay_real.starts_with(&base_real) {
        return Err(Error::InvalidOverlayDir(overlay_dir.to_path_buf()));
    }

    Ok(())
}

fn apply_file<S: ManifestStore + ?Sized>(
    store: &mut S,
    manifest: &mut Manifest,
    base_dir: &Utf8Path,
    file: &OverlayFile,
) -> Result<()> {
    let overlay = manifest.overlay_name.clone();
    let rel_path = &file.rel_path;
    let fail = |source: io::Error| Error::ApplyFailed {
        overlay: overlay.clone(),
        path: rel_path.clone(),
        source,
    };
    let destination = base_dir.join(rel_path);

    let missing_dirs = missing_parent_dirs(base_dir, rel_path);
    if !missing_dirs.is_empty() {
        manifest.created_dirs.extend(missing_dirs);
        store.save(manifest)?;
    }

    if path_exists(&destination) {
        store
            .backup(&overlay, rel_path, &destination)
            .map_err(fail)?;
        manifest.overwritten.insert(rel_path.clone());
        tracing::debug!("Overwriting {} (backed up)", rel_path);
    } else {
        manifest.added.insert(rel_path.clone());
        tracing::debug!("Adding {}", rel_path);
    }
    store.save(manifest)?;

    copy_with_metadata(&file.source, &destination).map_err(fail)
}

/// Ancestors of `rel_path` that do not exist under `base_dir`, shallowest first.
fn missing_parent_dirs(base_dir: &Utf8Path, rel_path: &Utf8Path) -> Vec<Utf8PathBuf> {
    let Some(parent) = rel_path.parent() else {
        return Vec::new();
    };

    let mut missing: Vec<Utf8PathBuf> = parent
        .ancestors()
        .filter(|dir| !dir.as_str().is_empty())
        .take_while(|dir| !path_exists(&base_dir.join(dir)))
        .map(Utf8Path::to_path_buf)
        .collect();
    missing.reverse();
    missing
}
