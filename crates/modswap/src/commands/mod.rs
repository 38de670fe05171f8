mod config;
mod import;
mod overlay;

pub use config::{reset_config, set_base_dir, set_launcher, set_overlays_dir, show_config};
pub use import::{import_overlay, ImportArgs};
pub use overlay::{
    activate_overlay, deactivate_overlay, delete_overlay, launch, list_overlays, repair,
    show_status, ActivateArgs, DeleteArgs,
};
