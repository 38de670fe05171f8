//! Active-overlay coordinator.
//!
//! The [`Coordinator`] owns the manifest store, the overlay repository and the
//! configuration store, and is the only component that moves the base directory
//! between states:
//!
//! ```text
//! Base ──activate(A)──▶ Active(A) ──activate(B)──▶ Active(B)
//!   ▲                      │                          │
//!   └──────deactivate──────┴────────deactivate────────┘
//! ```
//!
//! Switching from `Active(A)` to `Active(B)` reverts `A` before `B` is applied,
//! so at most one overlay is ever applied. All transitions run under a mutex, so
//! a shared `Coordinator` serializes its callers.

use crate::apply::{apply_overlay, validate_dirs};
use crate::error::{Error, MutexResultExt, Result};
use crate::manifest::{Manifest, ManifestStore};
use crate::progress::{OverlayProgress, OverlayStage, ProgressCallback, ProgressFn};
use crate::revert::{revert_overlay, RevertReport};
use crate::utils::is_valid_overlay_name;
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::{Arc, Mutex};

/// Persists the Active-Overlay Pointer.
///
/// The coordinator reads the pointer once when it is opened and writes it after
/// every transition.
pub trait ConfigStore: Send {
    /// Name of the overlay recorded as active, if any.
    fn load_active(&self) -> Result<Option<String>>;

    /// Record `active` as the active overlay (`None` = base state).
    fn save_active(&mut self, active: Option<&str>) -> Result<()>;
}

/// Supplies overlay source directories.
pub trait OverlayRepository: Send {
    /// Names of all available overlays, sorted.
    fn list_overlays(&self) -> Result<Vec<String>>;

    /// Source directory of `name`. Fails with [`Error::OverlayNotFound`] if unknown.
    fn overlay_path(&self, name: &str) -> Result<Utf8PathBuf>;

    /// Delete the source directory of `name`.
    fn remove_overlay(&mut self, name: &str) -> Result<()>;
}

/// [`ConfigStore`] that keeps the pointer in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryConfigStore {
    active: Option<String>,
}

impl MemoryConfigStore {
    pub fn new(active: Option<String>) -> Self {
        Self { active }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load_active(&self) -> Result<Option<String>> {
        Ok(self.active.clone())
    }

    fn save_active(&mut self, active: Option<&str>) -> Result<()> {
        self.active = active.map(str::to_string);
        Ok(())
    }
}

/// Result of a successful [`Coordinator::activate`].
#[derive(Debug, Clone)]
pub struct Activation {
    /// Manifest of the newly applied overlay.
    pub manifest: Manifest,
    /// Report of the overlay that was active before, if any.
    pub reverted: Option<RevertReport>,
}

struct Inner<S, R, C> {
    store: S,
    repository: R,
    config: C,
    active: Option<String>,
}

/// Enforces the single-active-overlay invariant over one base directory.
pub struct Coordinator<S, R, C> {
    base_dir: Utf8PathBuf,
    inner: Mutex<Inner<S, R, C>>,
    progress_callback: Option<ProgressCallback>,
}

impl<S, R, C> Coordinator<S, R, C>
where
    S: ManifestStore,
    R: OverlayRepository,
    C: ConfigStore,
{
    /// Open a coordinator for `base_dir`.
    ///
    /// Reads the persisted pointer and reconciles it against `store`: a pointer
    /// naming an overlay without a manifest is cleared and persisted. Manifests of
    /// other overlays are left alone and reported by [`stray_manifests`](Self::stray_manifests).
    pub fn open(
        base_dir: impl Into<Utf8PathBuf>,
        store: S,
        repository: R,
        mut config: C,
    ) -> Result<Self> {
        let base_dir = base_dir.into();
        let mut active = config.load_active()?;

        if let Some(name) = active.as_deref() {
            if store.load(name)?.is_none() {
                tracing::warn!(
                    "Active overlay '{}' has no manifest; resetting to base state",
                    name
                );
                active = None;
                config.save_active(None)?;
            }
        }

        let strays: Vec<String> = store
            .list()?
            .into_iter()
            .filter(|name| active.as_deref() != Some(name.as_str()))
            .collect();
        if !strays.is_empty() {
            tracing::warn!(
                "Found manifests of inactive overlays: {}; run a repair to revert them",
                strays.join(", ")
            );
        }

        tracing::info!(
            "Opened coordinator base_dir={} active={}",
            base_dir,
            active.as_deref().unwrap_or("<base>")
        );

        Ok(Self {
            base_dir,
            inner: Mutex::new(Inner {
                store,
                repository,
                config,
                active,
            }),
            progress_callback: None,
        })
    }

    /// Register a progress callback for transitions.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(OverlayProgress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Base directory this coordinator mutates.
    pub fn base_dir(&self) -> &Utf8Path {
        &self.base_dir
    }

    /// Currently active overlay, `None` in the base state.
    pub fn active(&self) -> Result<Option<String>> {
        Ok(self.inner.lock().mutex_err()?.active.clone())
    }

    /// Manifest of the currently active overlay.
    pub fn active_manifest(&self) -> Result<Option<Manifest>> {
        let inner = self.inner.lock().mutex_err()?;
        match inner.active.as_deref() {
            Some(name) => inner.store.load(name),
            None => Ok(None),
        }
    }

    /// Names of all overlays offered by the repository.
    pub fn list_overlays(&self) -> Result<Vec<String>> {
        self.inner.lock().mutex_err()?.repository.list_overlays()
    }

    /// Names of all overlays that currently have a manifest.
    pub fn manifest_names(&self) -> Result<Vec<String>> {
        self.inner.lock().mutex_err()?.store.list()
    }

    /// Manifests left behind by overlays that are not active.
    pub fn stray_manifests(&self) -> Result<Vec<String>> {
        let inner = self.inner.lock().mutex_err()?;
        let active = inner.active.clone();
        Ok(inner
            .store
            .list()?
            .into_iter()
            .filter(|name| active.as_deref() != Some(name.as_str()))
            .collect())
    }

    /// Make `name` the active overlay.
    ///
    /// Reverts the currently active overlay first. Fails with
    /// [`Error::AlreadyActive`] if `name` is already active. Configuration errors
    /// (invalid name, unknown overlay, missing directories, stale manifest) are
    /// detected before anything is modified.
    pub fn activate(&self, name: &str) -> Result<Activation> {
        if !is_valid_overlay_name(name) {
            return Err(Error::InvalidOverlayName(name.to_string()));
        }

        let mut guard = self.inner.lock().mutex_err()?;
        let inner = &mut *guard;

        if inner.active.as_deref() == Some(name) {
            return Err(Error::AlreadyActive(name.to_string()));
        }
        if !self.base_dir.as_std_path().is_dir() {
            return Err(Error::InvalidBaseDir(self.base_dir.clone()));
        }
        let overlay_dir = inner.repository.overlay_path(name)?;
        validate_dirs(&overlay_dir, &self.base_dir, name)?;
        if inner.store.load(name)?.is_some() {
            return Err(Error::StaleManifest(name.to_string()));
        }

        tracing::info!(
            "Activating overlay '{}' (currently {})",
            name,
            inner.active.as_deref().unwrap_or("<base>")
        );

        let reverted = match inner.active.clone() {
            Some(previous) => {
                let report = self.revert_active(inner, &previous)?;
                Some(report)
            }
            None => None,
        };

        let progress = self.progress();
        match apply_overlay(&mut inner.store, &overlay_dir, &self.base_dir, name, progress) {
            Ok(manifest) => {
                inner.active = Some(name.to_string());
                inner.config.save_active(Some(name))?;
                self.emit_complete(name, manifest.file_count());
                Ok(Activation {
                    manifest,
                    reverted: reverted.flatten(),
                })
            }
            Err(err) => Err(self.roll_back(inner, name, err)),
        }
    }

    /// Return the base directory to its unmodified state.
    ///
    /// A no-op returning `Ok(None)` in the base state.
    pub fn deactivate(&self) -> Result<Option<RevertReport>> {
        let mut guard = self.inner.lock().mutex_err()?;
        let inner = &mut *guard;

        let Some(previous) = inner.active.clone() else {
            tracing::debug!("Deactivate requested in base state, nothing to do");
            return Ok(None);
        };

        let report = self.revert_active(inner, &previous)?;
        if let Some(report) = &report {
            self.emit_complete(&previous, report.removed + report.restored);
        }
        Ok(report)
    }

    /// Delete the overlay `name` from the repository.
    ///
    /// An active overlay is deactivated first. A stray manifest of an inactive
    /// overlay is reverted so its backups are not lost with it.
    pub fn delete_overlay(&self, name: &str) -> Result<Option<RevertReport>> {
        if !is_valid_overlay_name(name) {
            return Err(Error::InvalidOverlayName(name.to_string()));
        }

        let mut guard = self.inner.lock().mutex_err()?;
        let inner = &mut *guard;

        // Fail early for unknown overlays, before anything is reverted.
        inner.repository.overlay_path(name)?;

        let report = if inner.active.as_deref() == Some(name) {
            self.revert_active(inner, name)?
        } else {
            revert_overlay(&mut inner.store, &self.base_dir, name, self.progress())?
        };

        inner.repository.remove_overlay(name)?;
        inner.store.discard(name)?;

        tracing::info!("Deleted overlay '{}'", name);
        Ok(report)
    }

    /// Revert every manifest that does not belong to the active overlay.
    ///
    /// Used to clean up after a transition that failed mid-way and could not be
    /// rolled back automatically.
    pub fn repair(&self) -> Result<Vec<RevertReport>> {
        let mut guard = self.inner.lock().mutex_err()?;
        let inner = &mut *guard;

        let strays: Vec<String> = inner
            .store
            .list()?
            .into_iter()
            .filter(|name| inner.active.as_deref() != Some(name.as_str()))
            .collect();

        let mut reports = Vec::new();
        for name in strays {
            tracing::info!("Repairing: reverting stray manifest of '{}'", name);
            let reverted =
                revert_overlay(&mut inner.store, &self.base_dir, &name, self.progress())?;
            if let Some(report) = reverted {
                reports.push(report);
            }
        }
        Ok(reports)
    }

    /// Revert the active overlay and persist the base state.
    ///
    /// The pointer is only cleared once the revert completed, so a failed revert
    /// leaves both the manifest and the pointer in place.
    fn revert_active(
        &self,
        inner: &mut Inner<S, R, C>,
        previous: &str,
    ) -> Result<Option<RevertReport>> {
        let report = revert_overlay(&mut inner.store, &self.base_dir, previous, self.progress())?;
        inner.active = None;
        inner.config.save_active(None)?;
        Ok(report)
    }

    /// Undo a failed apply of `name` and build the error returned to the caller.
    fn roll_back(&self, inner: &mut Inner<S, R, C>, name: &str, err: Error) -> Error {
        tracing::error!("Applying overlay '{}' failed: {}", name, err);

        match revert_overlay(&mut inner.store, &self.base_dir, name, None) {
            Ok(_) => {
                tracing::info!("Rolled back partially applied overlay '{}'", name);
                Error::TransitionFailed {
                    overlay: name.to_string(),
                    needs_inspection: false,
                    source: Box::new(err),
                }
            }
            Err(rollback_err) => {
                tracing::error!(
                    "Rolling back overlay '{}' failed: {}; base directory needs inspection",
                    name,
                    rollback_err
                );
                // The manifest still exists, so pointing at it lets a later
                // deactivate finish the cleanup.
                inner.active = Some(name.to_string());
                if let Err(e) = inner.config.save_active(Some(name)) {
                    tracing::error!("Failed to persist active overlay '{}': {}", name, e);
                }
                Error::TransitionFailed {
                    overlay: name.to_string(),
                    needs_inspection: true,
                    source: Box::new(err),
                }
            }
        }
    }

    fn progress(&self) -> Option<ProgressFn<'_>> {
        self.progress_callback
            .as_ref()
            .map(|callback| callback.as_ref() as ProgressFn<'_>)
    }

    fn emit_complete(&self, overlay: &str, total: usize) {
        if let Some(callback) = &self.progress_callback {
            callback(OverlayProgress {
                stage: OverlayStage::Complete,
                overlay: overlay.to_string(),
                current_file: None,
                current: total,
                total,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{FsManifestStore, MemoryManifestStore};
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    /// Overlay repository over a plain directory of overlay folders.
    struct DirRepository {
        root: Utf8PathBuf,
    }

    impl OverlayRepository for DirRepository {
        fn list_overlays(&self) -> Result<Vec<String>> {
            let mut names: Vec<String> = fs::read_dir(&self.root)?
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_dir())
                .filter_map(|e| e.file_name().into_string().ok())
                .collect();
            names.sort();
            Ok(names)
        }

        fn overlay_path(&self, name: &str) -> Result<Utf8PathBuf> {
            let path = self.root.join(name);
            if path.is_dir() {
                Ok(path)
            } else {
                Err(Error::OverlayNotFound(name.to_string()))
            }
        }

        fn remove_overlay(&mut self, name: &str) -> Result<()> {
            fs::remove_dir_all(self.root.join(name))?;
            Ok(())
        }
    }

    /// Overlay repository with an explicit location per overlay.
    struct MapRepository {
        paths: BTreeMap<String, Utf8PathBuf>,
    }

    impl OverlayRepository for MapRepository {
        fn list_overlays(&self) -> Result<Vec<String>> {
            Ok(self.paths.keys().cloned().collect())
        }

        fn overlay_path(&self, name: &str) -> Result<Utf8PathBuf> {
            self.paths
                .get(name)
                .cloned()
                .ok_or_else(|| Error::OverlayNotFound(name.to_string()))
        }

        fn remove_overlay(&mut self, name: &str) -> Result<()> {
            self.paths.remove(name);
            Ok(())
        }
    }

    struct Fixture {
        _dir: TempDir,
        base: Utf8PathBuf,
        overlays: Utf8PathBuf,
        state: Utf8PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let fx = Fixture {
            _dir: dir,
            base: root.join("base"),
            overlays: root.join("overlays"),
            state: root.join("state"),
        };

        write(&fx.base.join("game.ini"), "v1");
        write(&fx.base.join("rules.ini"), "rules-original");
        write(&fx.overlays.join("ModA/game.ini"), "a");
        write(&fx.overlays.join("ModA/a-only/file.dat"), "a-data");
        write(&fx.overlays.join("ModB/game.ini"), "b");
        write(&fx.overlays.join("ModB/rules.ini"), "rules-b");
        write(&fx.overlays.join("ModB/b-only.txt"), "b-data");
        fx
    }

    fn write(path: &Utf8Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

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

    fn memory_coordinator(
        fx: &Fixture,
    ) -> Coordinator<MemoryManifestStore, DirRepository, MemoryConfigStore> {
        Coordinator::open(
            fx.base.clone(),
            MemoryManifestStore::new(),
            DirRepository {
                root: fx.overlays.clone(),
            },
            MemoryConfigStore::default(),
        )
        .unwrap()
    }

    fn fs_coordinator(
        fx: &Fixture,
        config: MemoryConfigStore,
    ) -> Coordinator<FsManifestStore, DirRepository, MemoryConfigStore> {
        Coordinator::open(
            fx.base.clone(),
            FsManifestStore::new(fx.state.clone()),
            DirRepository {
                root: fx.overlays.clone(),
            },
            config,
        )
        .unwrap()
    }

    fn assert_single_active(
        coordinator: &Coordinator<impl ManifestStore, impl OverlayRepository, impl ConfigStore>,
    ) {
        let manifests = coordinator.manifest_names().unwrap();
        match coordinator.active().unwrap() {
            Some(active) => assert_eq!(manifests, vec![active]),
            None => assert!(manifests.is_empty()),
        }
    }

    #[test]
    fn test_activate_from_base() {
        let fx = fixture();
        let coordinator = memory_coordinator(&fx);

        let activation = coordinator.activate("ModA").unwrap();

        assert!(activation.reverted.is_none());
        assert_eq!(coordinator.active().unwrap().as_deref(), Some("ModA"));
        assert_eq!(fs::read_to_string(fx.base.join("game.ini")).unwrap(), "a");
        assert!(activation
            .manifest
            .overwritten
            .contains(Utf8Path::new("game.ini")));
        assert_single_active(&coordinator);
    }

    #[test]
    fn test_switch_reverts_previous_overlay() {
        let fx = fixture();
        let coordinator = memory_coordinator(&fx);
        let pristine = snapshot(&fx.base);

        coordinator.activate("ModA").unwrap();
        let activation = coordinator.activate("ModB").unwrap();

        let reverted = activation.reverted.unwrap();
        assert_eq!(reverted.overlay, "ModA");
        assert_eq!(coordinator.active().unwrap().as_deref(), Some("ModB"));
        assert!(!fx.base.join("a-only").exists());
        assert_eq!(fs::read_to_string(fx.base.join("game.ini")).unwrap(), "b");
        assert_single_active(&coordinator);

        coordinator.deactivate().unwrap();
        assert_eq!(snapshot(&fx.base), pristine);
    }

    #[test]
    fn test_switch_equals_revert_then_apply() {
        let fx = fixture();
        let coordinator = memory_coordinator(&fx);
        coordinator.activate("ModB").unwrap();
        let direct_b = snapshot(&fx.base);
        coordinator.deactivate().unwrap();

        coordinator.activate("ModA").unwrap();
        coordinator.activate("ModB").unwrap();

        assert_eq!(snapshot(&fx.base), direct_b);
    }

    #[test]
    fn test_activate_same_overlay_is_rejected() {
        let fx = fixture();
        let coordinator = memory_coordinator(&fx);
        coordinator.activate("ModA").unwrap();
        let applied = snapshot(&fx.base);

        let err = coordinator.activate("ModA").unwrap_err();

        assert!(matches!(err, Error::AlreadyActive(_)));
        assert_eq!(snapshot(&fx.base), applied);
        assert_eq!(coordinator.active().unwrap().as_deref(), Some("ModA"));
    }

    #[test]
    fn test_deactivate_in_base_is_noop() {
        let fx = fixture();
        let coordinator = memory_coordinator(&fx);
        let pristine = snapshot(&fx.base);

        assert!(coordinator.deactivate().unwrap().is_none());
        assert_eq!(snapshot(&fx.base), pristine);
    }

    #[test]
    fn test_unknown_overlay_leaves_state_unchanged() {
        let fx = fixture();
        let coordinator = memory_coordinator(&fx);
        coordinator.activate("ModA").unwrap();
        let applied = snapshot(&fx.base);

        let err = coordinator.activate("Missing").unwrap_err();

        assert!(matches!(err, Error::OverlayNotFound(_)));
        assert!(!err.needs_inspection());
        assert_eq!(coordinator.active().unwrap().as_deref(), Some("ModA"));
        assert_eq!(snapshot(&fx.base), applied);
    }

    #[test]
    fn test_missing_base_dir_aborts_before_revert() {
        let fx = fixture();
        let coordinator = memory_coordinator(&fx);
        fs::remove_dir_all(&fx.base).unwrap();

        let err = coordinator.activate("ModA").unwrap_err();
        assert!(matches!(err, Error::InvalidBaseDir(_)));
        assert!(coordinator.active().unwrap().is_none());
    }

    #[test]
    fn test_failed_apply_is_rolled_back() {
        let fx = fixture();
        // `z-collide` is a directory in the base, so ModC fails on its last file.
        write(&fx.overlays.join("ModC/a.txt"), "c");
        write(&fx.overlays.join("ModC/game.ini"), "c-game");
        write(&fx.overlays.join("ModC/z-collide"), "collides");
        fs::create_dir_all(fx.base.join("z-collide")).unwrap();
        let pristine = snapshot(&fx.base);

        let coordinator = memory_coordinator(&fx);
        coordinator.activate("ModA").unwrap();

        let err = coordinator.activate("ModC").unwrap_err();

        assert!(matches!(
            err,
            Error::TransitionFailed {
                needs_inspection: false,
                ..
            }
        ));
        assert!(!err.needs_inspection());
        assert!(coordinator.active().unwrap().is_none());
        assert!(coordinator.manifest_names().unwrap().is_empty());
        assert_eq!(snapshot(&fx.base), pristine);
    }

    #[test]
    fn test_nested_overlay_rejected_before_revert() {
        let fx = fixture();
        write(&fx.base.join("mods/ModB/game.ini"), "nested");
        let paths = BTreeMap::from([
            ("ModA".to_string(), fx.overlays.join("ModA")),
            ("ModB".to_string(), fx.base.join("mods/ModB")),
        ]);
        let coordinator = Coordinator::open(
            fx.base.clone(),
            MemoryManifestStore::new(),
            MapRepository { paths },
            MemoryConfigStore::default(),
        )
        .unwrap();
        coordinator.activate("ModA").unwrap();
        let before = snapshot(&fx.base);

        let err = coordinator.activate("ModB").unwrap_err();

        assert!(matches!(err, Error::InvalidOverlayDir(_)));
        assert!(!err.needs_inspection());
        assert_eq!(coordinator.active().unwrap().as_deref(), Some("ModA"));
        assert_eq!(coordinator.manifest_names().unwrap(), vec!["ModA"]);
        assert_eq!(snapshot(&fx.base), before);
    }

    #[test]
    fn test_pointer_persisted_and_reconciled() {
        let fx = fixture();
        let coordinator = fs_coordinator(&fx, MemoryConfigStore::default());
        coordinator.activate("ModB").unwrap();
        drop(coordinator);

        // Reopening with the persisted pointer keeps the overlay active.
        let reopened = fs_coordinator(&fx, MemoryConfigStore::new(Some("ModB".into())));
        assert_eq!(reopened.active().unwrap().as_deref(), Some("ModB"));
        reopened.deactivate().unwrap();
        drop(reopened);

        // A pointer without a manifest is reset.
        let reset = fs_coordinator(&fx, MemoryConfigStore::new(Some("ModB".into())));
        assert!(reset.active().unwrap().is_none());
    }

    #[test]
    fn test_stray_manifest_blocks_activation_until_repaired() {
        let fx = fixture();
        let pristine = snapshot(&fx.base);

        // Simulate a lost pointer while ModA is applied.
        let applied = fs_coordinator(&fx, MemoryConfigStore::default());
        applied.activate("ModA").unwrap();
        drop(applied);
        let orphaned = fs_coordinator(&fx, MemoryConfigStore::default());
        assert_eq!(orphaned.stray_manifests().unwrap(), vec!["ModA".to_string()]);

        let err = orphaned.activate("ModA").unwrap_err();
        assert!(matches!(err, Error::StaleManifest(_)));

        let reports = orphaned.repair().unwrap();
        assert_eq!(reports.len(), 1);
        assert!(orphaned.stray_manifests().unwrap().is_empty());
        assert_eq!(snapshot(&fx.base), pristine);
    }

    #[test]
    fn test_delete_active_overlay() {
        let fx = fixture();
        let coordinator = memory_coordinator(&fx);
        let pristine = snapshot(&fx.base);
        coordinator.activate("ModA").unwrap();

        let report = coordinator.delete_overlay("ModA").unwrap();

        assert!(report.is_some());
        assert!(coordinator.active().unwrap().is_none());
        assert!(!fx.overlays.join("ModA").exists());
        assert_eq!(snapshot(&fx.base), pristine);
        assert_eq!(coordinator.list_overlays().unwrap(), vec!["ModB".to_string()]);
    }

    #[test]
    fn test_delete_inactive_overlay() {
        let fx = fixture();
        let coordinator = memory_coordinator(&fx);
        coordinator.activate("ModA").unwrap();

        let report = coordinator.delete_overlay("ModB").unwrap();

        assert!(report.is_none());
        assert_eq!(coordinator.active().unwrap().as_deref(), Some("ModA"));
        assert!(!fx.overlays.join("ModB").exists());
        assert_single_active(&coordinator);
    }

    #[test]
    fn test_progress_events() {
        let fx = fixture();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let coordinator = memory_coordinator(&fx)
            .with_progress(move |p| sink.lock().unwrap().push(p.stage));

        coordinator.activate("ModA").unwrap();
        coordinator.activate("ModB").unwrap();

        let stages = events.lock().unwrap().clone();
        assert_eq!(stages.first(), Some(&OverlayStage::Applying));
        assert!(stages.contains(&OverlayStage::Reverting));
        assert_eq!(stages.last(), Some(&OverlayStage::Complete));
    }

    #[test]
    fn test_random_sequence_keeps_single_active() {
        let fx = fixture();
        let coordinator = memory_coordinator(&fx);
        let pristine = snapshot(&fx.base);

        let steps = ["ModA", "ModB", "-", "ModB", "ModA", "-", "-", "ModA", "ModB"];
        for step in steps {
            if step == "-" {
                coordinator.deactivate().unwrap();
            } else {
                coordinator.activate(step).unwrap();
            }
            assert_single_active(&coordinator);
        }

        coordinator.deactivate().unwrap();
        assert_eq!(snapshot(&fx.base), pristine);
    }
}
