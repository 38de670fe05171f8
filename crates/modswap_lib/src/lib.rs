//! Overlay library management for modswap.
//!
//! Wraps the `modswap_overlay` engine with everything a front end needs: TOML
//! settings that also persist the active overlay, a directory-backed overlay
//! repository, archive import and a cross-process lock on the state directory.

pub mod error;
pub mod import;
pub mod lock;
pub mod manager;
pub mod repository;
pub mod settings;

pub use error::{Error, Result};
pub use import::{import_archive, ArchiveFormat};
pub use lock::StateLock;
pub use manager::{LaunchOutcome, ModManager, OverlayEntry, Status};
pub use repository::FsOverlayRepository;
pub use settings::{default_settings_path, Settings, SettingsStore};
