//! Atomic file placement.
//!
//! Nothing is ever written directly at a final cache path. Records are
//! written to a hidden temp file in the destination directory and renamed;
//! downloads are staged under the cache's staging directory and moved into
//! place with a no-clobber rename. Temp files are deleted when dropped, so an
//! aborted write never leaves anything that looks like a cache entry.

use crate::Error;
use std::io::Write;
use std::path::Path;
use tempfile::TempPath;

/// Suffix of in-flight download files.
pub const STAGING_SUFFIX: &str = ".part";

/// Outcome of moving a staged file into the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The staged file now occupies the destination.
    Placed,
    /// Another writer got there first; the staged file was discarded.
    AlreadyPresent,
}

/// Ensure all parent directories exist for a path.
pub fn ensure_parent_dirs(path: &Path) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::cache_io(format!("failed to create directory {}", parent.display()), e))?;
    }
    Ok(())
}

/// Write a file atomically (hidden temp file in the same directory, then rename).
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<(), Error> {
    ensure_parent_dirs(path)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::Builder::new()
        .prefix(".")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| Error::cache_io(format!("failed to create temp file in {}", dir.display()), e))?;
    tmp.write_all(contents)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| Error::cache_io(format!("failed to write temp file for {}", path.display()), e))?;
    tmp.persist(path)
        .map_err(|e| Error::cache_io(format!("failed to rename temp file to {}", path.display()), e.error))?;
    Ok(())
}

/// Create an empty staging file for a download.
///
/// The returned [`TempPath`] deletes the file when dropped unless it is
/// handed to [`place_staged`].
pub fn stage_file(staging_dir: &Path) -> Result<(std::fs::File, TempPath), Error> {
    std::fs::create_dir_all(staging_dir)
        .map_err(|e| Error::cache_io(format!("failed to create staging directory {}", staging_dir.display()), e))?;
    let file = tempfile::Builder::new()
        .prefix("download-")
        .suffix(STAGING_SUFFIX)
        .tempfile_in(staging_dir)
        .map_err(|e| Error::cache_io(format!("failed to create staging file in {}", staging_dir.display()), e))?;
    Ok(file.into_parts())
}

/// Move a staged file to `dest` with a single rename.
///
/// With `replace = false` an existing destination wins and the staged file is
/// discarded. `replace = true` is only for superseding a file that failed
/// verification.
pub fn place_staged(staged: TempPath, dest: &Path, replace: bool) -> Result<Placement, Error> {
    ensure_parent_dirs(dest)?;

    if replace {
        staged
            .persist(dest)
            .map_err(|e| Error::cache_io(format!("failed to move download to {}", dest.display()), e.error))?;
        return Ok(Placement::Placed);
    }

    match staged.persist_noclobber(dest) {
        Ok(()) => Ok(Placement::Placed),
        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
            tracing::debug!(path = %dest.display(), "destination already cached by another writer");
            Ok(Placement::AlreadyPresent)
        }
        Err(e) => Err(Error::cache_io(format!("failed to move download to {}", dest.display()), e.error)),
    }
}
