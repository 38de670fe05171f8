//! Settings file resolution for the CLI.

use crate::errors::CliError;
use camino::Utf8PathBuf;
use modswap_lib::{default_settings_path, ModManager, SettingsStore};

/// Path of the settings file: `--config` if given, otherwise config.toml next
/// to the executable.
pub fn settings_path(config: Option<&str>) -> Result<Utf8PathBuf, CliError> {
    match config {
        Some(path) => Ok(Utf8PathBuf::from(path)),
        None => default_settings_path().ok_or(CliError::ConfigPathUnknown),
    }
}

pub fn load_settings(config: Option<&str>) -> Result<SettingsStore, CliError> {
    Ok(SettingsStore::load(settings_path(config)?)?)
}

/// Open the mod manager for the configured game directory.
pub fn open_manager(config: Option<&str>) -> Result<ModManager, CliError> {
    let settings = load_settings(config)?;
    Ok(ModManager::open(settings)?)
}
