//! High-level entry point tying settings, overlays and the coordinator together.

use crate::error::{Error, Result};
use crate::import::import_archive;
use crate::lock::StateLock;
use crate::repository::FsOverlayRepository;
use crate::settings::SettingsStore;
use camino::{Utf8Path, Utf8PathBuf};
use modswap_overlay::{
    Activation, Coordinator, FsManifestStore, OverlayProgress, RevertReport,
};
use serde::Serialize;
use std::process::{Command, ExitStatus};

type FsCoordinator = Coordinator<FsManifestStore, FsOverlayRepository, SettingsStore>;

/// An overlay as shown in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayEntry {
    pub name: String,
    pub active: bool,
}

/// Snapshot of the manager state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub base_dir: Utf8PathBuf,
    pub overlays_dir: Utf8PathBuf,
    pub state_dir: Utf8PathBuf,
    pub active: Option<String>,
    /// Files added by the active overlay.
    pub added: usize,
    /// Files replaced by the active overlay.
    pub overwritten: usize,
    /// Overlays that have a manifest but are not active.
    pub stray_manifests: Vec<String>,
}

/// Outcome of [`ModManager::launch`].
#[derive(Debug)]
pub enum LaunchOutcome {
    Exited(ExitStatus),
    NotConfigured,
    NotFound(Utf8PathBuf),
}

/// Owns the coordinator for the configured base directory.
///
/// Holds the state lock for its whole lifetime, so only one manager per state
/// directory can exist across processes.
pub struct ModManager {
    coordinator: FsCoordinator,
    overlays_dir: Utf8PathBuf,
    state_dir: Utf8PathBuf,
    launcher: Option<Utf8PathBuf>,
    _lock: StateLock,
}

impl ModManager {
    /// Open the manager described by `settings`.
    pub fn open(settings: SettingsStore) -> Result<Self> {
        let base_dir = settings.settings().require_base_dir()?.to_path_buf();
        let overlays_dir = settings.settings().require_overlays_dir()?.to_path_buf();
        let launcher = settings.settings().launcher.clone();
        let state_dir = settings.state_dir();

        let lock = StateLock::acquire(&state_dir)?;
        let coordinator = Coordinator::open(
            base_dir,
            FsManifestStore::new(state_dir.clone()),
            FsOverlayRepository::new(overlays_dir.clone()),
            settings,
        )?;

        Ok(Self {
            coordinator,
            overlays_dir,
            state_dir,
            launcher,
            _lock: lock,
        })
    }

    /// Report progress of transitions to `callback`.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(OverlayProgress) + Send + Sync + 'static,
    {
        self.coordinator = self.coordinator.with_progress(callback);
        self
    }

    pub fn base_dir(&self) -> &Utf8Path {
        self.coordinator.base_dir()
    }

    pub fn overlays_dir(&self) -> &Utf8Path {
        &self.overlays_dir
    }

    pub fn active(&self) -> Result<Option<String>> {
        Ok(self.coordinator.active()?)
    }

    /// All overlays, sorted by name, with the active one marked.
    pub fn overlays(&self) -> Result<Vec<OverlayEntry>> {
        let active = self.coordinator.active()?;
        Ok(self
            .coordinator
            .list_overlays()?
            .into_iter()
            .map(|name| OverlayEntry {
                active: active.as_deref() == Some(name.as_str()),
                name,
            })
            .collect())
    }

    pub fn status(&self) -> Result<Status> {
        let manifest = self.coordinator.active_manifest()?;
        Ok(Status {
            base_dir: self.base_dir().to_path_buf(),
            overlays_dir: self.overlays_dir.clone(),
            state_dir: self.state_dir.clone(),
            active: self.coordinator.active()?,
            added: manifest.as_ref().map_or(0, |m| m.added.len()),
            overwritten: manifest.as_ref().map_or(0, |m| m.overwritten.len()),
            stray_manifests: self.coordinator.stray_manifests()?,
        })
    }

    pub fn activate(&self, name: &str) -> Result<Activation> {
        Ok(self.coordinator.activate(name)?)
    }

    pub fn deactivate(&self) -> Result<Option<RevertReport>> {
        Ok(self.coordinator.deactivate()?)
    }

    pub fn delete(&self, name: &str) -> Result<Option<RevertReport>> {
        Ok(self.coordinator.delete_overlay(name)?)
    }

    /// Revert manifests left behind by interrupted transitions.
    pub fn repair(&self) -> Result<Vec<RevertReport>> {
        Ok(self.coordinator.repair()?)
    }

    /// Import an archive as a new overlay and return its name.
    pub fn import(&self, archive: &Utf8Path) -> Result<String> {
        import_archive(&self.overlays_dir, archive)
    }

    /// Start the configured launcher inside the base directory and wait for it.
    pub fn launch(&self) -> Result<LaunchOutcome> {
        let Some(launcher) = &self.launcher else {
            tracing::warn!("No launcher configured");
            return Ok(LaunchOutcome::NotConfigured);
        };

        let executable = self.base_dir().join(launcher);
        if !executable.as_std_path().is_file() {
            tracing::warn!("Launcher not found: {}", executable);
            return Ok(LaunchOutcome::NotFound(executable));
        }

        tracing::info!("Launching {}", executable);
        let status = Command::new(executable.as_std_path())
            .current_dir(self.base_dir())
            .status()
            .map_err(Error::Io)?;
        tracing::info!("Launcher exited with {}", status);

        Ok(LaunchOutcome::Exited(status))
    }
}
