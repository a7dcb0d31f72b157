//! Filesystem helpers shared by checkpoints and run logs.
//!
//! Writes go through a `.tmp` sibling followed by a rename so a crash during
//! a save never leaves a truncated checkpoint under its final name.

use std::io;
use std::path::Path;

/// Serialize `data` as JSON and write it atomically. Returns the bytes written.
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, data: &T) -> io::Result<Vec<u8>> {
    let bytes = serde_json::to_vec(data).map_err(io::Error::other)?;
    atomic_write(path, &bytes)?;
    Ok(bytes)
}

/// Write raw bytes to `path` via a temporary sibling and rename.
///
/// Creates parent directories if they don't exist.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)
}

/// Load and deserialize JSON from a file. `Ok(None)` if the file is missing.
pub fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> io::Result<Option<T>> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let value =
        serde_json::from_slice(&data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(Some(value))
}

/// Remove a file, treating absence as success.
///
/// Returns `true` if a file was actually deleted.
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Empty a directory, creating it if necessary.
pub fn reset_dir(path: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    std::fs::create_dir_all(path)
}
