use camino::Utf8PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse settings: {0}")]
    SettingsParse(#[from] toml::de::Error),

    #[error("Failed to serialize settings: {0}")]
    SettingsSerialize(#[from] toml::ser::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Overlay(#[from] modswap_overlay::Error),

    /// A required setting has not been configured.
    #[error("Setting '{0}' is not configured")]
    SettingsMissing(&'static str),

    #[error("Not a directory: {0}")]
    NotADirectory(Utf8PathBuf),

    #[error("Unsupported archive format: {0}")]
    UnsupportedArchive(Utf8PathBuf),

    #[error("Archive entry has an unsafe path: {0}")]
    UnsafeArchiveEntry(String),

    #[error("Archive contains no files: {0}")]
    EmptyArchive(Utf8PathBuf),

    #[error("Archive extractor '{0}' was not found")]
    ExtractorNotFound(String),

    #[error("Archive extraction failed ({status}): {output}")]
    ExtractorFailed { status: String, output: String },

    /// The base directory cannot be reconfigured while an overlay is applied to it.
    #[error("Overlay '{0}' is active; deactivate it first")]
    OverlayActive(String),

    /// Manifests of interrupted transitions still reference the base directory.
    #[error("Leftover manifests must be reverted first: {}", .0.join(", "))]
    PendingManifests(Vec<String>),

    /// Another process holds the state lock.
    #[error("State directory is locked by another process: {0}")]
    Locked(Utf8PathBuf),

    #[error("Path is not valid UTF-8: {0}")]
    NonUtf8Path(std::path::PathBuf),
}

impl Error {
    /// Whether the base directory may have been left in a mixed state.
    pub fn needs_inspection(&self) -> bool {
        match self {
            Error::Overlay(e) => e.needs_inspection(),
            _ => false,
        }
    }
}

impl From<Error> for modswap_overlay::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Overlay(inner) => inner,
            Error::Io(inner) => modswap_overlay::Error::Io(inner),
            other => modswap_overlay::Error::Other(other.to_string()),
        }
    }
}
