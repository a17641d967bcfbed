//! Structured-document (de)serialization shared by the store repository and
//! the state store (§6: "All structured documents are line-terminated
//! UTF-8, pretty-printed with two-space indentation, written via atomic
//! replace.").

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::fs::Fs;

/// Serialize `value` as pretty-printed (two-space indent) JSON, terminated
/// with a trailing newline, and write it to `path` atomically.
///
/// # Errors
/// Returns an error if serialization or the underlying write fails.
pub fn write_doc<F: Fs, T: Serialize>(fsys: &F, path: &Path, value: &T) -> std::io::Result<()> {
    let mut bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    bytes.push(b'\n');
    fsys.atomic_write(path, &bytes, 0o644)
}

/// Read and parse a structured document from `path`.
///
/// # Errors
/// Returns an error if the file cannot be read or does not parse.
pub fn read_doc<F: Fs, T: DeserializeOwned>(fsys: &F, path: &Path) -> std::io::Result<T> {
    let bytes = fsys.read_file(path)?;
    serde_json::from_slice(&bytes).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
