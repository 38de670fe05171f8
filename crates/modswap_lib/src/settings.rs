//! Persistent settings stored as TOML.

use crate::error::{Error, Result};
use crate::lock::StateLock;
use camino::{Utf8Path, Utf8PathBuf};
use modswap_overlay::{ConfigStore, FsManifestStore, ManifestStore};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;

/// Name of the settings file placed next to the executable.
pub const SETTINGS_FILE_NAME: &str = "config.toml";

/// Directory (next to the settings file) holding manifests when `state_dir` is unset.
pub const DEFAULT_STATE_DIR: &str = "manifests";

/// Settings shared by the CLI and the mod manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Game installation directory that overlays are applied onto.
    pub base_dir: Option<Utf8PathBuf>,
    /// Directory containing one subdirectory per overlay.
    pub overlays_dir: Option<Utf8PathBuf>,
    /// Directory holding manifests and backups.
    pub state_dir: Option<Utf8PathBuf>,
    /// Overlay currently applied to the base directory.
    pub active_overlay: Option<String>,
    /// Executable to start after activation, relative to the base directory.
    pub launcher: Option<Utf8PathBuf>,
}

impl Settings {
    pub fn require_base_dir(&self) -> Result<&Utf8Path> {
        self.base_dir
            .as_deref()
            .ok_or(Error::SettingsMissing("base_dir"))
    }

    pub fn require_overlays_dir(&self) -> Result<&Utf8Path> {
        self.overlays_dir
            .as_deref()
            .ok_or(Error::SettingsMissing("overlays_dir"))
    }
}

/// Returns the directory where the current executable resides.
pub fn install_dir() -> Option<Utf8PathBuf> {
    let exe = env::current_exe().ok()?;
    let parent = exe.parent()?;
    Utf8PathBuf::from_path_buf(parent.to_path_buf()).ok()
}

/// Returns the default settings file path (config.toml next to the executable).
pub fn default_settings_path() -> Option<Utf8PathBuf> {
    install_dir().map(|dir| dir.join(SETTINGS_FILE_NAME))
}

/// A [`Settings`] value bound to the file it was loaded from.
///
/// Doubles as the [`ConfigStore`] of the coordinator. User-initiated changes
/// take the [`StateLock`] of the state directory, so they cannot interleave with a
/// running [`ModManager`](crate::ModManager).
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: Utf8PathBuf,
    settings: Settings,
}

impl SettingsStore {
    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: impl Into<Utf8PathBuf>) -> Result<Self> {
        let path = path.into();
        let settings = if path.as_std_path().exists() {
            let content = fs::read_to_string(&path)?;
            let settings: Settings = toml::from_str(&content)?;
            tracing::debug!("Loaded settings from {}", path);
            settings
        } else {
            tracing::debug!("Settings file {} not found, using defaults", path);
            Settings::default()
        };

        Ok(Self { path, settings })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Directory holding manifests and backups.
    ///
    /// Relative paths are resolved against the directory of the settings file.
    pub fn state_dir(&self) -> Utf8PathBuf {
        let config_dir = self
            .path
            .parent()
            .map(Utf8Path::to_path_buf)
            .unwrap_or_default();

        match &self.settings.state_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => config_dir.join(dir),
            None => config_dir.join(DEFAULT_STATE_DIR),
        }
    }

    /// Write the settings back to their file.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(&self.settings)?;
        let tmp = self.path.with_extension("toml.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;

        tracing::debug!("Saved settings to {}", self.path);
        Ok(())
    }

    /// Replace the in-memory settings with the current file contents.
    pub fn reload(&mut self) -> Result<()> {
        self.settings = Self::load(self.path.clone())?.settings;
        Ok(())
    }

    /// Set the base directory. It must be an existing directory.
    ///
    /// Refused while an overlay is applied to the current base directory.
    pub fn set_base_dir(&mut self, dir: impl Into<Utf8PathBuf>) -> Result<()> {
        let dir = existing_dir(dir.into())?;
        self.update(|store| {
            store.ensure_base_unmodified()?;
            store.settings.base_dir = Some(dir);
            Ok(())
        })
    }

    /// Set the overlays directory. It must be an existing directory.
    pub fn set_overlays_dir(&mut self, dir: impl Into<Utf8PathBuf>) -> Result<()> {
        let dir = existing_dir(dir.into())?;
        self.update(|store| {
            store.settings.overlays_dir = Some(dir);
            Ok(())
        })
    }

    pub fn set_launcher(&mut self, launcher: Option<Utf8PathBuf>) -> Result<()> {
        self.update(|store| {
            store.settings.launcher = launcher;
            Ok(())
        })
    }

    /// Restore the default settings.
    ///
    /// Refused while an overlay is applied, since the defaults would lose track of
    /// the base directory and the manifests describing its changes.
    pub fn reset(&mut self) -> Result<()> {
        self.update(|store| {
            store.ensure_base_unmodified()?;
            store.settings = Settings::default();
            Ok(())
        })
    }

    /// Fail if the base directory currently carries overlay changes.
    pub fn ensure_base_unmodified(&self) -> Result<()> {
        if let Some(active) = &self.settings.active_overlay {
            return Err(Error::OverlayActive(active.clone()));
        }

        let pending = FsManifestStore::new(self.state_dir()).list()?;
        if !pending.is_empty() {
            return Err(Error::PendingManifests(pending));
        }
        Ok(())
    }

    /// Apply a user-initiated change under the state lock, on top of the
    /// latest file contents.
    fn update(&mut self, change: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        let _lock = StateLock::acquire(&self.state_dir())?;
        self.reload()?;
        change(self)?;
        self.save()
    }
}

impl ConfigStore for SettingsStore {
    fn load_active(&self) -> modswap_overlay::Result<Option<String>> {
        Ok(self.settings.active_overlay.clone())
    }

    /// Only the pointer is written; other keys keep their on-disk values.
    fn save_active(&mut self, active: Option<&str>) -> modswap_overlay::Result<()> {
        self.reload().map_err(modswap_overlay::Error::from)?;
        self.settings.active_overlay = active.map(str::to_string);
        self.save().map_err(modswap_overlay::Error::from)
    }
}

fn existing_dir(dir: Utf8PathBuf) -> Result<Utf8PathBuf> {
    if !dir.as_std_path().is_dir() {
        return Err(Error::NotADirectory(dir));
    }
    Ok(dir)
}
