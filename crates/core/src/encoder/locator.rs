//! Resolution of the encoder executable.

use std::path::{Path, PathBuf};

/// Supplies the path of the encoder binary for each invocation.
///
/// Installing or discovering a binary is left to implementors.
pub trait BinaryLocator: Send + Sync {
    fn executable_path(&self) -> PathBuf;
}

/// Locator for a fixed, configured path.
///
/// A bare name such as `ffmpeg` is resolved through `PATH` by the OS at spawn time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathLocator {
    path: PathBuf,
}

impl PathLocator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BinaryLocator for PathLocator {
    fn executable_path(&self) -> PathBuf {
        self.path.clone()
    }
}
