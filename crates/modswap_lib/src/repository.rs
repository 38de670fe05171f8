//! Filesystem-backed overlay repository.

use camino::{Utf8Path, Utf8PathBuf};
use modswap_overlay::utils::is_valid_overlay_name;
use modswap_overlay::{Error, OverlayRepository, Result};
use std::fs;

/// Every non-hidden subdirectory of `root` is an overlay.
#[derive(Debug, Clone)]
pub struct FsOverlayRepository {
    root: Utf8PathBuf,
}

impl FsOverlayRepository {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn contains(&self, name: &str) -> bool {
        is_valid_overlay_name(name) && self.root.join(name).as_std_path().is_dir()
    }

    /// First free overlay name derived from `name` (`name`, `name_1`, `name_2`, ...).
    pub fn unique_name(&self, name: &str) -> String {
        if !self.root.join(name).as_std_path().exists() {
            return name.to_string();
        }

        (1..)
            .map(|i| format!("{}_{}", name, i))
            .find(|candidate| !self.root.join(candidate).as_std_path().exists())
            .unwrap_or_else(|| name.to_string())
    }
}

impl OverlayRepository for FsOverlayRepository {
    fn list_overlays(&self) -> Result<Vec<String>> {
        if !self.root.as_std_path().is_dir() {
            return Err(Error::InvalidOverlayDir(self.root.clone()));
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) if is_valid_overlay_name(&name) => names.push(name),
                Ok(_) => {}
                Err(name) => {
                    tracing::warn!("Skipping overlay with non UTF-8 name: {:?}", name);
                }
            }
        }

        names.sort();
        Ok(names)
    }

    fn overlay_path(&self, name: &str) -> Result<Utf8PathBuf> {
        if !is_valid_overlay_name(name) {
            return Err(Error::InvalidOverlayName(name.to_string()));
        }

        let path = self.root.join(name);
        if !path.as_std_path().is_dir() {
            return Err(Error::OverlayNotFound(name.to_string()));
        }
        Ok(path)
    }

    fn remove_overlay(&mut self, name: &str) -> Result<()> {
        let path = self.overlay_path(name)?;
        fs::remove_dir_all(&path)?;
        tracing::info!("Removed overlay directory {}", path);
        Ok(())
    }
}
