//! Manifest records and their persistence.
//!
//! A [`Manifest`] exists for every overlay that has been applied and not yet
//! reverted. It lists the base-relative paths the overlay added and the paths it
//! overwrote; every overwritten path has a byte-for-byte backup held by the
//! [`ManifestStore`] that owns the manifest.
//!
//! # JSON format
//!
//! ```json
//! {
//!   "mod_name": "ModX",
//!   "added": ["extra/new.dat"],
//!   "overwritten": ["game.ini"],
//!   "created_dirs": ["extra"]
//! }
//! ```
//!
//! `mod_name`, `added` and `overwritten` are the stable on-disk contract that
//! other tooling may read. `created_dirs` is only written when non-empty.
//!
//! # Filesystem layout
//!
//! [`FsManifestStore`] keeps one directory per overlay under its root:
//!
//! ```text
//! state_dir/
//!   ModX/
//!     manifest.json
//!     backup/
//!       game.ini            # pre-overlay copy of <base>/game.ini
//! ```

use crate::error::{Error, Result};
use crate::utils::{copy_with_metadata, file_times, normalize_rel_path, write_with_metadata};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs::{self, FileTimes, Permissions};
use std::io::{self, Write};

const MANIFEST_FILE: &str = "manifest.json";
const BACKUP_DIR: &str = "backup";

/// Record of what applying an overlay changed in the base directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Name of the overlay this manifest belongs to.
    #[serde(rename = "mod_name")]
    pub overlay_name: String,

    /// Paths that did not exist before the overlay was applied.
    #[serde(default)]
    pub added: BTreeSet<Utf8PathBuf>,

    /// Paths that existed before and were backed up, then replaced.
    #[serde(default)]
    pub overwritten: BTreeSet<Utf8PathBuf>,

    /// Directories that did not exist before and were created by the apply.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub created_dirs: BTreeSet<Utf8PathBuf>,
}

impl Manifest {
    /// Create an empty manifest for `overlay_name`.
    pub fn new(overlay_name: impl Into<String>) -> Self {
        Self {
            overlay_name: overlay_name.into(),
            added: BTreeSet::new(),
            overwritten: BTreeSet::new(),
            created_dirs: BTreeSet::new(),
        }
    }

    /// Number of file paths recorded (added + overwritten).
    pub fn file_count(&self) -> usize {
        self.added.len() + self.overwritten.len()
    }

    /// `true` if no file path is recorded.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.overwritten.is_empty()
    }

    /// Re-normalize every recorded path and check the manifest invariants.
    ///
    /// Manifests are read from disk, so a hand-edited or foreign manifest must not
    /// be able to address files outside the base directory, and a path cannot be
    /// both added and overwritten.
    pub fn sanitized(self) -> Result<Self> {
        let overlay = self.overlay_name.clone();
        let normalize_all = |paths: BTreeSet<Utf8PathBuf>| -> Result<BTreeSet<Utf8PathBuf>> {
            paths
                .into_iter()
                .map(|p| {
                    normalize_rel_path(&p).ok_or_else(|| Error::InvalidManifest {
                        overlay: overlay.clone(),
                        reason: format!("unsafe path '{}'", p),
                    })
                })
                .collect()
        };

        let added = normalize_all(self.added)?;
        let overwritten = normalize_all(self.overwritten)?;
        let created_dirs = normalize_all(self.created_dirs)?;

        if let Some(both) = added.intersection(&overwritten).next() {
            return Err(Error::InvalidManifest {
                overlay,
                reason: format!("'{}' is recorded as both added and overwritten", both),
            });
        }

        Ok(Self {
            overlay_name: self.overlay_name,
            added,
            overwritten,
            created_dirs,
        })
    }
}

/// Durable storage for manifests and the backup copies they reference.
///
/// The engine only talks to this trait, so tests can run the full apply/revert
/// cycle against [`MemoryManifestStore`] while the application uses
/// [`FsManifestStore`].
///
/// Per-file operations return [`io::Result`] so the applier and reverter can
/// attach the failing path to the error they report.
pub trait ManifestStore: Send {
    /// Load the manifest of `overlay`, or `None` if it has none.
    fn load(&self, overlay: &str) -> Result<Option<Manifest>>;

    /// Durably persist `manifest`, replacing any previous version.
    fn save(&mut self, manifest: &Manifest) -> Result<()>;

    /// Copy `original` (a file in the base directory) into the backup area of
    /// `overlay` under `rel_path`.
    fn backup(
        &mut self,
        overlay: &str,
        rel_path: &Utf8Path,
        original: &Utf8Path,
    ) -> io::Result<()>;

    /// Copy the backup of `rel_path` onto `target`.
    ///
    /// Returns `Ok(false)` if no backup exists for `rel_path`.
    fn restore(
        &mut self,
        overlay: &str,
        rel_path: &Utf8Path,
        target: &Utf8Path,
    ) -> io::Result<bool>;

    /// Delete the manifest and the backup area of `overlay`. Missing data is not an error.
    fn discard(&mut self, overlay: &str) -> Result<()>;

    /// Names of all overlays that currently have a manifest, sorted.
    fn list(&self) -> Result<Vec<String>>;
}

/// Filesystem-backed manifest store.
///
/// Manifest writes go to a temporary file that is flushed to disk and then renamed
/// over `manifest.json`, so a crash never leaves a truncated manifest behind.
#[derive(Debug, Clone)]
pub struct FsManifestStore {
    root: Utf8PathBuf,
}

impl FsManifestStore {
    /// Create a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory holding one subdirectory per overlay.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn overlay_dir(&self, overlay: &str) -> Utf8PathBuf {
        self.root.join(overlay)
    }

    fn manifest_path(&self, overlay: &str) -> Utf8PathBuf {
        self.overlay_dir(overlay).join(MANIFEST_FILE)
    }

    /// Location of the backup copy of `rel_path` for `overlay`.
    pub fn backup_path(&self, overlay: &str, rel_path: &Utf8Path) -> Utf8PathBuf {
        self.overlay_dir(overlay).join(BACKUP_DIR).join(rel_path)
    }
}

/// Flush a directory entry so a completed rename survives power loss.
#[cfg(unix)]
fn sync_dir(dir: &Utf8Path) -> io::Result<()> {
    fs::File::open(dir.as_std_path())?.sync_all()
}

/// Directory handles cannot be synced on this platform.
#[cfg(not(unix))]
fn sync_dir(_dir: &Utf8Path) -> io::Result<()> {
    Ok(())
}

impl ManifestStore for FsManifestStore {
    fn load(&self, overlay: &str) -> Result<Option<Manifest>> {
        let path = self.manifest_path(overlay);
        let contents = match fs::read_to_string(path.as_std_path()) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let manifest: Manifest = serde_json::from_str(&contents)?;
        if manifest.overlay_name != overlay {
            return Err(Error::InvalidManifest {
                overlay: overlay.to_string(),
                reason: format!("manifest belongs to '{}'", manifest.overlay_name),
            });
        }

        manifest.sanitized().map(Some)
    }

    fn save(&mut self, manifest: &Manifest) -> Result<()> {
        let dir = self.overlay_dir(&manifest.overlay_name);
        fs::create_dir_all(dir.as_std_path())?;

        let path = dir.join(MANIFEST_FILE);
        let tmp_path = dir.join(format!("{}.tmp", MANIFEST_FILE));
        let contents = serde_json::to_vec_pretty(manifest)?;

        let mut file = fs::File::create(tmp_path.as_std_path())?;
        file.write_all(&contents)?;
        file.sync_all()?;
        drop(file);

        fs::rename(tmp_path.as_std_path(), path.as_std_path())?;
        sync_dir(&dir)?;
        Ok(())
    }

    fn backup(
        &mut self,
        overlay: &str,
        rel_path: &Utf8Path,
        original: &Utf8Path,
    ) -> io::Result<()> {
        let backup_path = self.backup_path(overlay, rel_path);
        copy_with_metadata(original, &backup_path)?;
        fs::File::open(backup_path.as_std_path())?.sync_all()
    }

    fn restore(
        &mut self,
        overlay: &str,
        rel_path: &Utf8Path,
        target: &Utf8Path,
    ) -> io::Result<bool> {
        let backup_path = self.backup_path(overlay, rel_path);
        if !backup_path.as_std_path().is_file() {
            return Ok(false);
        }

        copy_with_metadata(&backup_path, target)?;
        Ok(true)
    }

    fn discard(&mut self, overlay: &str) -> Result<()> {
        match fs::remove_dir_all(self.overlay_dir(overlay).as_std_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(self.root.as_std_path()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if entry.path().join(MANIFEST_FILE).is_file() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

#[derive(Debug, Clone)]
struct StoredFile {
    bytes: Vec<u8>,
    permissions: Permissions,
    times: FileTimes,
}

/// In-memory manifest store.
///
/// Manifests and backup contents live in process memory and vanish with the
/// store. Used by tests and by callers that do not need durability.
#[derive(Debug, Default)]
pub struct MemoryManifestStore {
    manifests: HashMap<String, Manifest>,
    backups: HashMap<(String, Utf8PathBuf), StoredFile>,
}

impl MemoryManifestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of backup copies currently held for `overlay`.
    pub fn backup_count(&self, overlay: &str) -> usize {
        self.backups.keys().filter(|(name, _)| name == overlay).count()
    }

    /// Drop the backup of a single path, as if it had been lost.
    pub fn forget_backup(&mut self, overlay: &str, rel_path: &Utf8Path) -> bool {
        self.backups
            .remove(&(overlay.to_string(), rel_path.to_path_buf()))
            .is_some()
    }
}

impl ManifestStore for MemoryManifestStore {
    fn load(&self, overlay: &str) -> Result<Option<Manifest>> {
        Ok(self.manifests.get(overlay).cloned())
    }

    fn save(&mut self, manifest: &Manifest) -> Result<()> {
        self.manifests
            .insert(manifest.overlay_name.clone(), manifest.clone());
        Ok(())
    }

    fn backup(
        &mut self,
        overlay: &str,
        rel_path: &Utf8Path,
        original: &Utf8Path,
    ) -> io::Result<()> {
        let meta = fs::metadata(original.as_std_path())?;
        let bytes = fs::read(original.as_std_path())?;
        self.backups.insert(
            (overlay.to_string(), rel_path.to_path_buf()),
            StoredFile {
                bytes,
                permissions: meta.permissions(),
                times: file_times(&meta),
            },
        );
        Ok(())
    }

    fn restore(
        &mut self,
        overlay: &str,
        rel_path: &Utf8Path,
        target: &Utf8Path,
    ) -> io::Result<bool> {
        let key = (overlay.to_string(), rel_path.to_path_buf());
        let Some(stored) = self.backups.get(&key) else {
            return Ok(false);
        };

        write_with_metadata(target, &stored.bytes, &stored.permissions, stored.times)?;
        Ok(true)
    }

    fn discard(&mut self, overlay: &str) -> Result<()> {
        self.manifests.remove(overlay);
        self.backups.retain(|(name, _), _| name != overlay);
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.manifests.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
