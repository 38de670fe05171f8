//! Reversible single-overlay engine for game installation directories.
//!
//! An *overlay* is a directory tree whose files are copied on top of a *base*
//! directory. This crate applies one overlay at a time and records what it did in a
//! manifest, so the base directory can always be returned to its original state:
//!
//! - **Apply**: copy an overlay onto the base, backing up every file it replaces
//! - **Revert**: undo an apply using its manifest and backups
//! - **Coordinator**: switch between overlays, guaranteeing at most one is active
//!
//! Manifests are written ahead of every mutation, so an interrupted apply can
//! still be reverted.
//!
//! # Example
//!
//! ```no_run
//! use modswap_overlay::{Coordinator, FsManifestStore, MemoryConfigStore, OverlayRepository};
//! use camino::Utf8PathBuf;
//!
//! # fn demo(repository: impl OverlayRepository) -> modswap_overlay::Result<()> {
//! let store = FsManifestStore::new("C:/Games/MentalOmega/manifests");
//! let coordinator = Coordinator::open(
//!     Utf8PathBuf::from("C:/Games/MentalOmega"),
//!     store,
//!     repository,
//!     MemoryConfigStore::default(),
//! )?
//! .with_progress(|progress| {
//!     println!("{:?} {}/{}", progress.stage, progress.current, progress.total);
//! });
//!
//! let activation = coordinator.activate("ModX")?;
//! println!("Applied {} files", activation.manifest.file_count());
//!
//! coordinator.deactivate()?;
//! # Ok(())
//! # }
//! ```

pub mod apply;
pub mod coordinator;
pub mod error;
pub mod manifest;
pub mod progress;
pub mod revert;
pub mod utils;

pub use apply::{apply_overlay, collect_overlay_files, OverlayFile};
pub use coordinator::{Activation, ConfigStore, Coordinator, MemoryConfigStore, OverlayRepository};
pub use error::{Error, MutexResultExt, Result};
pub use manifest::{FsManifestStore, Manifest, ManifestStore, MemoryManifestStore};
pub use progress::{OverlayProgress, OverlayStage, ProgressCallback, ProgressFn};
pub use revert::{revert_overlay, RevertReport};
