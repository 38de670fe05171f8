//! Import overlays from archives.
//!
//! `.zip` archives are extracted in-process; `.7z` and `.rar` archives are handed
//! to the external `7z` tool. Extraction happens in a hidden temporary directory
//! inside the overlays root, which is removed again whether or not the import
//! succeeds. Wrapper directories are stripped: while the extracted tree consists
//! of a single directory, the import descends into it.

use crate::error::{Error, Result};
use crate::repository::FsOverlayRepository;
use camino::{Utf8Path, Utf8PathBuf};
use modswap_overlay::utils::is_valid_overlay_name;
use std::fs::{self, File};
use std::io;
use std::process::Command;
use zip::ZipArchive;

/// Prefix of the temporary extraction directories. Hidden, so the overlay
/// repository never lists them.
const TEMP_PREFIX: &str = ".modswap-import-";

/// Program used for `.7z`/`.rar` archives.
pub const SEVEN_ZIP_PROGRAM: &str = "7z";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    SevenZip,
}

impl ArchiveFormat {
    pub fn from_path(path: &Utf8Path) -> Option<Self> {
        match path.extension()?.to_ascii_lowercase().as_str() {
            "zip" => Some(Self::Zip),
            "7z" | "rar" => Some(Self::SevenZip),
            _ => None,
        }
    }
}

/// Extract `archive` into a new overlay under `overlays_dir` and return its name.
pub fn import_archive(overlays_dir: &Utf8Path, archive: &Utf8Path) -> Result<String> {
    if !overlays_dir.as_std_path().is_dir() {
        return Err(Error::NotADirectory(overlays_dir.to_path_buf()));
    }
    if !archive.as_std_path().is_file() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("archive not found: {}", archive),
        )));
    }
    let format = ArchiveFormat::from_path(archive)
        .ok_or_else(|| Error::UnsupportedArchive(archive.to_path_buf()))?;

    tracing::info!("Importing {} into {}", archive, overlays_dir);

    let temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempdir_in(overlays_dir)?;
    let temp_root = Utf8Path::from_path(temp.path())
        .ok_or_else(|| Error::NonUtf8Path(temp.path().to_path_buf()))?;
    let extract_dir = temp_root.join("content");
    fs::create_dir_all(&extract_dir)?;

    match format {
        ArchiveFormat::Zip => extract_zip(archive, &extract_dir)?,
        ArchiveFormat::SevenZip => extract_with_7z(archive, &extract_dir)?,
    }

    let root = content_root(&extract_dir)?;
    if is_dir_empty(&root)? {
        return Err(Error::EmptyArchive(archive.to_path_buf()));
    }

    let base_name = if root == extract_dir {
        archive.file_stem()
    } else {
        root.file_name()
    }
    .map(str::trim)
    .filter(|name| is_valid_overlay_name(name))
    .unwrap_or("overlay");

    let repository = FsOverlayRepository::new(overlays_dir);
    let name = repository.unique_name(base_name);
    fs::rename(&root, overlays_dir.join(&name))?;

    tracing::info!("Imported overlay '{}' from {}", name, archive);
    Ok(name)
}

/// Descend through single-directory wrappers.
fn content_root(extract_dir: &Utf8Path) -> Result<Utf8PathBuf> {
    let mut root = extract_dir.to_path_buf();
    loop {
        let entries: Vec<_> = fs::read_dir(&root)?.collect::<io::Result<_>>()?;
        match entries.as_slice() {
            [only] if only.file_type()?.is_dir() => {
                root = Utf8PathBuf::from_path_buf(only.path()).map_err(Error::NonUtf8Path)?;
            }
            _ => return Ok(root),
        }
    }
}

fn is_dir_empty(dir: &Utf8Path) -> Result<bool> {
    Ok(fs::read_dir(dir)?.next().is_none())
}

fn extract_zip(archive: &Utf8Path, destination: &Utf8Path) -> Result<()> {
    let file = File::open(archive)?;
    let mut zip = ZipArchive::new(file)?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let Some(rel_path) = entry.enclosed_name() else {
            return Err(Error::UnsafeArchiveEntry(entry.name().to_string()));
        };
        let target = destination.as_std_path().join(rel_path);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
        tracing::debug!("Extracted {}", entry.name());
    }

    Ok(())
}

fn extract_with_7z(archive: &Utf8Path, destination: &Utf8Path) -> Result<()> {
    let output = Command::new(SEVEN_ZIP_PROGRAM)
        .arg("x")
        .arg(archive.as_str())
        .arg(format!("-o{}", destination))
        .arg("-y")
        .output()
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::ExtractorNotFound(SEVEN_ZIP_PROGRAM.to_string()),
            _ => Error::Io(e),
        })?;

    if !output.status.success() {
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        return Err(Error::ExtractorFailed {
            status: output.status.to_string(),
            output: text.trim().to_string(),
        });
    }

    Ok(())
}
