//! Sidecar tag files.
//!
//! Each image `photo.jpg` may have a `photo.txt` next to it holding a comma
//! separated tag list. Line breaks count as separators too, so a caption file
//! hand-edited over several lines still reads as one list. Writes always use
//! the canonical `tag1, tag2, tag3` form.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::SIDECAR_EXTENSION;
use crate::error::{Error, Result};

/// Path of the sidecar belonging to an image
pub fn sidecar_path(image_path: &Path) -> PathBuf {
    image_path.with_extension(SIDECAR_EXTENSION)
}

/// Split sidecar text into trimmed, non-empty tags (duplicates kept).
pub fn parse_tags(text: &str) -> Vec<String> {
    text.trim_start_matches('\u{feff}')
        .split([',', '\n', '\r'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Canonical serialized form of a tag list
pub fn format_tags<S: AsRef<str>>(tags: &[S]) -> String {
    tags.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", ")
}

/// Read and parse a sidecar file.
///
/// Returns `Ok(None)` when no sidecar file exists. Content that is not
/// UTF-8 text (including anything with NUL bytes) is an `IoFailure`.
pub fn read_sidecar(path: &Path) -> Result<Option<Vec<String>>> {
    if !path.is_file() {
        return Ok(None);
    }
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    if bytes.contains(&0) {
        return Err(malformed(path, "contains NUL bytes"));
    }
    let text = String::from_utf8(bytes).map_err(|_| malformed(path, "not valid UTF-8"))?;
    Ok(Some(parse_tags(&text)))
}

/// Write a tag list, creating the file if needed. An empty list leaves an
/// empty file rather than deleting it.
///
/// The text goes to a hidden sibling first and is renamed over the sidecar,
/// so a failed write leaves the previous file intact.
pub fn write_sidecar<S: AsRef<str>>(path: &Path, tags: &[S]) -> Result<()> {
    let staging = staging_path(path);
    fs::write(&staging, format_tags(tags)).map_err(|e| Error::io(&staging, e))?;
    if let Err(err) = fs::rename(&staging, path) {
        let _ = fs::remove_file(&staging);
        return Err(Error::io(path, err));
    }
    debug!(path = %path.display(), count = tags.len(), "wrote sidecar");
    Ok(())
}

/// `dir/.photo.txt.tmp` for `dir/photo.txt`
fn staging_path(path: &Path) -> PathBuf {
    let mut name = std::ffi::OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(".tmp");
    path.with_file_name(name)
}

fn malformed(path: &Path, reason: &str) -> Error {
    Error::IoFailure {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidData, reason.to_string()),
    }
}
