//! File access used by source-holding nodes.
//!
//! Nodes never touch the filesystem directly: they go through an
//! [`IoManager`] taken from their [`GraphContext`](crate::GraphContext), so
//! hosts can redirect loads to packed archives or in-memory buffers.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Outcome of a file operation.
///
/// `None` is the success status; it only appears in diagnostics events, never
/// as the `Err` side of an [`IoManager`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Error)]
pub enum IoStatus {
    #[error("no error")]
    None,
    #[error("file not found")]
    FileNotFound,
    #[error("i/o error")]
    IoError,
}

impl From<std::io::Error> for IoStatus {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            ErrorKind::NotFound => IoStatus::FileNotFound,
            _ => IoStatus::IoError,
        }
    }
}

/// File loading and saving.
pub trait IoManager {
    /// Read the whole file into memory.
    fn open_file_to_buffer(&self, path: &Path) -> Result<Vec<u8>, IoStatus>;

    /// Replace the file's contents with `buffer`.
    fn save_file_from_buffer(&self, path: &Path, buffer: &[u8]) -> Result<(), IoStatus>;
}

/// [`IoManager`] over the local filesystem, resolving relative paths against
/// a root directory.
#[derive(Debug, Clone)]
pub struct FsIoManager {
    root: PathBuf,
}

impl FsIoManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

impl IoManager for FsIoManager {
    fn open_file_to_buffer(&self, path: &Path) -> Result<Vec<u8>, IoStatus> {
        let full = self.resolve(path);
        let buffer = fs::read(&full)?;
        debug!(path = %full.display(), bytes = buffer.len(), "loaded file");
        Ok(buffer)
    }

    fn save_file_from_buffer(&self, path: &Path, buffer: &[u8]) -> Result<(), IoStatus> {
        let full = self.resolve(path);
        fs::write(&full, buffer)?;
        debug!(path = %full.display(), bytes = buffer.len(), "saved file");
        Ok(())
    }
}
