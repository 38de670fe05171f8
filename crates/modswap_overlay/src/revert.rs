//! Overlay reverter.
//!
//! Restores the base directory from a manifest: added files are deleted,
//! overwritten files are copied back from their backups, directories the apply
//! created are removed when empty, and finally the manifest and its backup area
//! are discarded. The manifest is only discarded after every path has been
//! handled, so a revert interrupted by a crash or an I/O error can be re-run.

use crate::error::{Error, Result};
use crate::manifest::ManifestStore;
use crate::progress::{emit, OverlayProgress, OverlayStage, ProgressFn};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::fs;
use std::io;

/// Summary returned after an overlay has been reverted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevertReport {
    /// Overlay that was reverted.
    pub overlay: String,
    /// Added files that were deleted (already-missing files are not counted).
    pub removed: usize,
    /// Overwritten files restored from their backups.
    pub restored: usize,
    /// Overwritten files whose backup was missing; these keep the overlay's version.
    pub missing_backups: Vec<Utf8PathBuf>,
    /// Directories created by the apply that were removed.
    pub pruned_dirs: usize,
}

impl RevertReport {
    /// `true` if every overwritten file could be restored.
    pub fn is_clean(&self) -> bool {
        self.missing_backups.is_empty()
    }
}

/// Revert `overlay_name` in `base_dir` using the manifest held by `store`.
///
/// Returns `Ok(None)` if there is no manifest for the overlay, which makes the
/// operation idempotent.
pub fn revert_overlay<S: ManifestStore + ?Sized>(
    store: &mut S,
    base_dir: &Utf8Path,
    overlay_name: &str,
    progress: Option<ProgressFn<'_>>,
) -> Result<Option<RevertReport>> {
    let Some(manifest) = store.load(overlay_name)? else {
        tracing::debug!("No manifest for overlay '{}', nothing to revert", overlay_name);
        return Ok(None);
    };

    if !base_dir.as_std_path().is_dir() {
        return Err(Error::InvalidBaseDir(base_dir.to_path_buf()));
    }

    tracing::info!(
        "Reverting overlay '{}' in {}: added={} overwritten={}",
        overlay_name,
        base_dir,
        manifest.added.len(),
        manifest.overwritten.len()
    );

    let fail = |path: &Utf8Path, source: io::Error| Error::RevertFailed {
        overlay: overlay_name.to_string(),
        path: path.to_path_buf(),
        source,
    };

    let mut report = RevertReport {
        overlay: overlay_name.to_string(),
        ..Default::default()
    };
    let total = manifest.file_count();
    let mut current = 0;
    let mut step = |rel_path: &Utf8Path| {
        current += 1;
        emit(
            progress,
            OverlayProgress {
                stage: OverlayStage::Reverting,
                overlay: overlay_name.to_string(),
                current_file: Some(rel_path.to_path_buf()),
                current,
                total,
            },
        );
    };

    for rel_path in manifest.added.iter().map(Utf8PathBuf::as_path) {
        step(rel_path);
        match fs::remove_file(base_dir.join(rel_path).as_std_path()) {
            Ok(()) => {
                report.removed += 1;
                tracing::debug!("Removed {}", rel_path);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("Added file {} already gone", rel_path);
            }
            Err(e) => return Err(fail(rel_path, e)),
        }
    }

    for rel_path in manifest.overwritten.iter().map(Utf8PathBuf::as_path) {
        step(rel_path);
        let target = base_dir.join(rel_path);
        if store
            .restore(overlay_name, rel_path, &target)
            .map_err(|e| fail(rel_path, e))?
        {
            report.restored += 1;
            tracing::debug!("Restored {}", rel_path);
        } else {
            tracing::warn!(
                "Backup of {} for overlay '{}' is missing; keeping the overlay's version",
                rel_path,
                overlay_name
            );
            report.missing_backups.push(rel_path.to_path_buf());
        }
    }

    // Children sort after their parents, so walking backwards removes the deepest first.
    for dir in manifest.created_dirs.iter().rev() {
        match fs::remove_dir(base_dir.join(dir).as_std_path()) {
            Ok(()) => report.pruned_dirs += 1,
            Err(e) => tracing::debug!("Keeping directory {}: {}", dir, e),
        }
    }

    store.discard(overlay_name)?;

    tracing::info!(
        "Reverted overlay '{}': removed={} restored={} missing_backups={} pruned_dirs={}",
        overlay_name,
        report.removed,
        report.restored,
        report.missing_backups.len(),
        report.pruned_dirs
    );

    Ok(Some(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::apply_overlay;
    use crate::manifest::{FsManifestStore, Manifest, MemoryManifestStore};
    use std::collections::BTreeMap;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        base: Utf8PathBuf,
        overlay: Utf8PathBuf,
        state: Utf8PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let base = root.join("base");
        let overlay = root.join("overlays/ModX");
        fs::create_dir_all(&base).unwrap();
        fs::create_dir_all(&overlay).unwrap();
        Fixture {
            _dir: dir,
            base,
            overlay,
            state: root.join("state"),
        }
    }

    fn write(path: &Utf8Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    /// Every file and directory under `root`, with file contents.
    fn snapshot(root: &Utf8Path) -> BTreeMap<String, Option<Vec<u8>>> {
        walkdir::WalkDir::new(root)
            .into_iter()
            .map(|e| e.unwrap())
            .filter(|e| e.path() != root.as_std_path())
            .map(|e| {
                let rel = e
                    .path()
                    .strip_prefix(root.as_std_path())
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/");
                let contents = e.file_type().is_file().then(|| fs::read(e.path()).unwrap());
                (rel, contents)
            })
            .collect()
    }

    fn populate_scenario(fx: &Fixture) {
        write(&fx.base.join("game.ini"), "v1");
        write(&fx.base.join("data/keep.txt"), "untouched");
        write(&fx.overlay.join("game.ini"), "v2");
        write(&fx.overlay.join("extra/new.dat"), "new");
        write(&fx.overlay.join("data/more/added.txt"), "added");
    }

    #[test]
    fn test_scenario_apply_then_revert() {
        let fx = fixture();
        populate_scenario(&fx);
        let before = snapshot(&fx.base);

        let mut store = FsManifestStore::new(fx.state.clone());
        apply_overlay(&mut store, &fx.overlay, &fx.base, "ModX", None).unwrap();
        assert_eq!(fs::read_to_string(fx.base.join("game.ini")).unwrap(), "v2");
        assert!(fx.base.join("extra/new.dat").exists());

        let report = revert_overlay(&mut store, &fx.base, "ModX", None)
            .unwrap()
            .unwrap();

        assert_eq!(report.removed, 2);
        assert_eq!(report.restored, 1);
        assert_eq!(report.pruned_dirs, 2);
        assert!(report.is_clean());
        assert_eq!(fs::read_to_string(fx.base.join("game.ini")).unwrap(), "v1");
        assert!(!fx.base.join("extra/new.dat").exists());
        assert!(store.load("ModX").unwrap().is_none());
        assert!(!fx.state.join("ModX").exists());
        assert_eq!(snapshot(&fx.base), before);
    }

    #[test]
    fn test_roundtrip_with_memory_store() {
        let fx = fixture();
        populate_scenario(&fx);
        let before = snapshot(&fx.base);

        let mut store = MemoryManifestStore::new();
        apply_overlay(&mut store, &fx.overlay, &fx.base, "ModX", None).unwrap();
        revert_overlay(&mut store, &fx.base, "ModX", None).unwrap();

        assert_eq!(snapshot(&fx.base), before);
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_revert_restores_mtime() {
        let fx = fixture();
        write(&fx.base.join("game.ini"), "v1");
        write(&fx.overlay.join("game.ini"), "v2");
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_234_567_890);
        fs::File::options()
            .write(true)
            .open(fx.base.join("game.ini"))
            .unwrap()
            .set_modified(mtime)
            .unwrap();

        let mut store = FsManifestStore::new(fx.state.clone());
        apply_overlay(&mut store, &fx.overlay, &fx.base, "ModX", None).unwrap();
        revert_overlay(&mut store, &fx.base, "ModX", None).unwrap();

        let restored = fs::metadata(fx.base.join("game.ini")).unwrap();
        assert_eq!(restored.modified().unwrap(), mtime);
    }

    #[test]
    fn test_revert_is_idempotent() {
        let fx = fixture();
        populate_scenario(&fx);

        let mut store = FsManifestStore::new(fx.state.clone());
        apply_overlay(&mut store, &fx.overlay, &fx.base, "ModX", None).unwrap();
        assert!(revert_overlay(&mut store, &fx.base, "ModX", None)
            .unwrap()
            .is_some());
        let after_first = snapshot(&fx.base);

        assert!(revert_overlay(&mut store, &fx.base, "ModX", None)
            .unwrap()
            .is_none());
        assert_eq!(snapshot(&fx.base), after_first);
    }

    #[test]
    fn test_revert_without_manifest_is_noop() {
        let fx = fixture();
        let mut store = MemoryManifestStore::new();
        assert!(revert_overlay(&mut store, &fx.base, "Unknown", None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_revert_tolerates_deleted_added_file() {
        let fx = fixture();
        write(&fx.overlay.join("new.dat"), "new");

        let mut store = MemoryManifestStore::new();
        apply_overlay(&mut store, &fx.overlay, &fx.base, "ModX", None).unwrap();
        fs::remove_file(fx.base.join("new.dat")).unwrap();

        let report = revert_overlay(&mut store, &fx.base, "ModX", None)
            .unwrap()
            .unwrap();
        assert_eq!(report.removed, 0);
        assert!(store.load("ModX").unwrap().is_none());
    }

    #[test]
    fn test_revert_reports_missing_backup() {
        let fx = fixture();
        write(&fx.base.join("a.ini"), "a1");
        write(&fx.base.join("b.ini"), "b1");
        write(&fx.overlay.join("a.ini"), "a2");
        write(&fx.overlay.join("b.ini"), "b2");

        let mut store = MemoryManifestStore::new();
        apply_overlay(&mut store, &fx.overlay, &fx.base, "ModX", None).unwrap();
        assert!(store.forget_backup("ModX", Utf8Path::new("a.ini")));

        let report = revert_overlay(&mut store, &fx.base, "ModX", None)
            .unwrap()
            .unwrap();

        assert!(!report.is_clean());
        assert_eq!(report.missing_backups, vec![Utf8PathBuf::from("a.ini")]);
        assert_eq!(report.restored, 1);
        assert_eq!(fs::read_to_string(fx.base.join("a.ini")).unwrap(), "a2");
        assert_eq!(fs::read_to_string(fx.base.join("b.ini")).unwrap(), "b1");
    }

    #[test]
    fn test_revert_keeps_non_empty_created_dir() {
        let fx = fixture();
        write(&fx.overlay.join("extra/new.dat"), "new");

        let mut store = MemoryManifestStore::new();
        apply_overlay(&mut store, &fx.overlay, &fx.base, "ModX", None).unwrap();
        write(&fx.base.join("extra/user.txt"), "user data");

        let report = revert_overlay(&mut store, &fx.base, "ModX", None)
            .unwrap()
            .unwrap();

        assert_eq!(report.pruned_dirs, 0);
        assert_eq!(
            fs::read_to_string(fx.base.join("extra/user.txt")).unwrap(),
            "user data"
        );
    }

    #[test]
    fn test_revert_partial_manifest_after_failed_apply() {
        let fx = fixture();
        write(&fx.base.join("keep.ini"), "k1");
        write(&fx.overlay.join("a.txt"), "a");
        write(&fx.overlay.join("b.txt"), "b");
        write(&fx.overlay.join("keep.ini"), "k2");
        fs::create_dir_all(fx.base.join("b.txt")).unwrap();
        let before = snapshot(&fx.base);

        let mut store = FsManifestStore::new(fx.state.clone());
        assert!(apply_overlay(&mut store, &fx.overlay, &fx.base, "ModX", None).is_err());
        revert_overlay(&mut store, &fx.base, "ModX", None).unwrap();

        assert_eq!(snapshot(&fx.base), before);
        assert!(store.load("ModX").unwrap().is_none());
    }

    #[test]
    fn test_revert_write_ahead_entry_never_applied() {
        let fx = fixture();
        write(&fx.base.join("game.ini"), "v1");

        // A crash right after recording the entry leaves a manifest ahead of the base.
        let mut store = FsManifestStore::new(fx.state.clone());
        let mut manifest = Manifest::new("ModX");
        manifest.added.insert("never/written.dat".into());
        manifest.created_dirs.insert("never".into());
        store.save(&manifest).unwrap();
        store
            .backup("ModX", Utf8Path::new("game.ini"), &fx.base.join("game.ini"))
            .unwrap();
        manifest.overwritten.insert("game.ini".into());
        store.save(&manifest).unwrap();

        let report = revert_overlay(&mut store, &fx.base, "ModX", None)
            .unwrap()
            .unwrap();

        assert_eq!(report.removed, 0);
        assert_eq!(report.restored, 1);
        assert_eq!(fs::read_to_string(fx.base.join("game.ini")).unwrap(), "v1");
    }

    #[test]
    fn test_revert_rejects_missing_base_dir() {
        let fx = fixture();
        write(&fx.overlay.join("a.txt"), "a");
        let mut store = MemoryManifestStore::new();
        apply_overlay(&mut store, &fx.overlay, &fx.base, "ModX", None).unwrap();

        let err = revert_overlay(&mut store, &fx.base.join("gone"), "ModX", None).unwrap_err();
        assert!(matches!(err, Error::InvalidBaseDir(_)));
        assert!(store.load("ModX").unwrap().is_some());
    }
}
