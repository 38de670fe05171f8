//! Path normalization and metadata-preserving file copy helpers.
//!
//! Manifests store base-relative paths as `/`-separated strings so the same
//! manifest reads identically on every platform. Everything that turns a path
//! from the filesystem (or from a manifest on disk) into a manifest key goes
//! through [`normalize_rel_path`].

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use std::fs::{self, File, FileTimes, Metadata};
use std::io;
use std::path::Path;

/// Normalize a relative path into a manifest key.
///
/// - Separators become `/`.
/// - `.` components are dropped.
/// - Absolute paths, drive prefixes and `..` components are rejected (returns `None`),
///   so a key can never address anything outside the directory it is joined onto.
/// - An empty result is rejected as well.
pub fn normalize_rel_path(rel_path: &Utf8Path) -> Option<Utf8PathBuf> {
    let mut parts = Vec::new();
    for component in rel_path.components() {
        match component {
            Utf8Component::Normal(part) => {
                // Windows-style separators inside a component (manifests written elsewhere)
                parts.extend(part.split('\\').filter(|p| !p.is_empty() && *p != "."));
            }
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir | Utf8Component::RootDir | Utf8Component::Prefix(_) => {
                return None;
            }
        }
    }

    if parts.is_empty() || parts.contains(&"..") {
        return None;
    }

    Some(Utf8PathBuf::from(parts.join("/")))
}

/// Check that an overlay name can be used as a single directory name.
pub fn is_valid_overlay_name(name: &str) -> bool {
    !name.trim().is_empty()
        && name != "."
        && name != ".."
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
}

/// Convert a `std` path into a `camino` path.
pub fn to_utf8(path: &Path) -> crate::Result<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).map_err(crate::Error::NonUtf8Path)
}

/// `true` if anything (file, directory, dangling symlink) exists at `path`.
pub fn path_exists(path: &Utf8Path) -> bool {
    fs::symlink_metadata(path.as_std_path()).is_ok()
}

/// Timestamps of `meta` that the platform is able to report.
pub fn file_times(meta: &Metadata) -> FileTimes {
    let mut times = FileTimes::new();
    if let Ok(accessed) = meta.accessed() {
        times = times.set_accessed(accessed);
    }
    if let Ok(modified) = meta.modified() {
        times = times.set_modified(modified);
    }
    times
}

/// Copy `src` onto `dst`, preserving permissions and timestamps.
///
/// Missing parent directories of `dst` are created. An existing file at `dst` is
/// replaced, even when it is read-only.
pub fn copy_with_metadata(src: &Utf8Path, dst: &Utf8Path) -> io::Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent.as_std_path())?;
    }

    let meta = fs::metadata(src.as_std_path())?;
    if path_exists(dst) {
        make_writable(dst)?;
    }
    fs::copy(src.as_std_path(), dst.as_std_path())?;
    apply_metadata(dst, &meta.permissions(), file_times(&meta))
}

/// Write `bytes` to `dst`, then restore the given permissions and timestamps.
pub fn write_with_metadata(
    dst: &Utf8Path,
    bytes: &[u8],
    permissions: &fs::Permissions,
    times: FileTimes,
) -> io::Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent.as_std_path())?;
    }

    if path_exists(dst) {
        make_writable(dst)?;
    }
    fs::write(dst.as_std_path(), bytes)?;
    apply_metadata(dst, permissions, times)
}

/// Timestamps can only be set through a writable handle on every platform, so a
/// read-only file is made writable for the duration of the update.
fn apply_metadata(
    dst: &Utf8Path,
    permissions: &fs::Permissions,
    times: FileTimes,
) -> io::Result<()> {
    make_writable(dst)?;
    File::options()
        .write(true)
        .open(dst.as_std_path())?
        .set_times(times)?;
    fs::set_permissions(dst.as_std_path(), permissions.clone())
}

#[allow(clippy::permissions_set_readonly_false)]
fn make_writable(path: &Utf8Path) -> io::Result<()> {
    let mut permissions = fs::metadata(path.as_std_path())?.permissions();
    if permissions.readonly() {
        permissions.set_readonly(false);
        fs::set_permissions(path.as_std_path(), permissions)?;
    }
    Ok(())
}
