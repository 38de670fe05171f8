use camino::Utf8PathBuf;
use miette::Diagnostic;
use modswap_overlay::Error as OverlayError;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    #[error("Could not determine the configuration file path")]
    #[diagnostic(
        code(config::path_unknown),
        help("Pass the configuration file explicitly with --config <path>")
    )]
    ConfigPathUnknown,

    #[error("Setting '{setting}' is not configured")]
    #[diagnostic(
        code(config::missing),
        help(
            "Run 'modswap config set-base-dir <path>' and \
             'modswap config set-overlays-dir <path>' first"
        )
    )]
    SettingsMissing { setting: String },

    #[error("Not a directory: {path}")]
    #[diagnostic(
        code(config::not_a_directory),
        help("Make sure the directory exists and the path is correct")
    )]
    NotADirectory { path: Utf8PathBuf },

    #[error("Overlay not found: {name}")]
    #[diagnostic(
        code(overlay::not_found),
        help("Run 'modswap list' to see the available overlays")
    )]
    OverlayNotFound { name: String },

    #[error("Invalid overlay name: '{name}'")]
    #[diagnostic(
        code(overlay::invalid_name),
        help("Overlay names are plain directory names and cannot contain path separators")
    )]
    InvalidOverlayName { name: String },

    #[error("Overlay '{name}' is already active")]
    #[diagnostic(
        code(overlay::already_active),
        help("Run 'modswap deactivate' first to re-apply it")
    )]
    AlreadyActive { name: String },

    #[error("Overlay '{name}' has a leftover manifest")]
    #[diagnostic(
        code(state::stale_manifest),
        help("Run 'modswap repair' to revert the leftover changes")
    )]
    StaleManifest { name: String },

    #[error("Activating '{overlay}' failed and the game directory may be partially modified")]
    #[diagnostic(
        code(state::needs_inspection),
        help("Run 'modswap deactivate' or 'modswap repair', then check the game directory")
    )]
    NeedsInspection {
        overlay: String,
        #[source]
        source: OverlayError,
    },

    #[error("Cannot change the game directory while overlay '{name}' is active")]
    #[diagnostic(
        code(config::overlay_active),
        help("Run 'modswap deactivate' first")
    )]
    OverlayStillActive { name: String },

    #[error(
        "Cannot change the game directory while leftover changes exist: {}",
        .overlays.join(", ")
    )]
    #[diagnostic(
        code(config::pending_changes),
        help("Run 'modswap repair' first")
    )]
    PendingChanges { overlays: Vec<String> },

    #[error("Another modswap process is running")]
    #[diagnostic(
        code(state::locked),
        help("Wait for the other process to finish. Lock directory: {path}")
    )]
    Locked { path: Utf8PathBuf },

    #[error("Failed to import archive")]
    #[diagnostic(
        code(import::failed),
        help("Supported formats are .zip, and .7z/.rar when the '7z' tool is on PATH")
    )]
    ImportFailed {
        #[source]
        source: modswap_lib::Error,
    },

    #[error("Operation failed")]
    #[diagnostic(code(modswap::operation_failed))]
    Operation {
        #[source]
        source: modswap_lib::Error,
    },
}

impl CliError {
    /// Wrap an error raised while importing an archive.
    pub fn import(source: modswap_lib::Error) -> Self {
        match source {
            modswap_lib::Error::NotADirectory(path) => Self::NotADirectory { path },
            source => Self::ImportFailed { source },
        }
    }
}

impl From<modswap_lib::Error> for CliError {
    fn from(error: modswap_lib::Error) -> Self {
        use modswap_lib::Error as LibError;

        match error {
            LibError::SettingsMissing(setting) => Self::SettingsMissing {
                setting: setting.to_string(),
            },
            LibError::NotADirectory(path) => Self::NotADirectory { path },
            LibError::Locked(path) => Self::Locked { path },
            LibError::OverlayActive(name) => Self::OverlayStillActive { name },
            LibError::PendingManifests(overlays) => Self::PendingChanges { overlays },
            LibError::Overlay(error) => Self::from(error),
            source => Self::Operation { source },
        }
    }
}

impl From<OverlayError> for CliError {
    fn from(error: OverlayError) -> Self {
        match error {
            OverlayError::OverlayNotFound(name) => Self::OverlayNotFound { name },
            OverlayError::InvalidOverlayName(name) => Self::InvalidOverlayName { name },
            OverlayError::AlreadyActive(name) => Self::AlreadyActive { name },
            OverlayError::StaleManifest(name) => Self::StaleManifest { name },
            OverlayError::InvalidBaseDir(path) | OverlayError::InvalidOverlayDir(path) => {
                Self::NotADirectory { path }
            }
            error if error.needs_inspection() => {
                let overlay = match &error {
                    OverlayError::TransitionFailed { overlay, .. }
                    | OverlayError::ApplyFailed { overlay, .. } => overlay.clone(),
                    _ => String::new(),
                };
                Self::NeedsInspection {
                    overlay,
                    source: error,
                }
            }
            error => Self::Operation {
                source: modswap_lib::Error::Overlay(error),
            },
        }
    }
}
