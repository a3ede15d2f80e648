//! Per-invocation scratch area for local copies of sources and derivatives.

use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SCRATCH_PREFIX: &str = "pictura-";

/// Scoped scratch directory.
///
/// Removed by [`ScratchDir::cleanup`], or on drop if an invocation unwinds
/// before reaching it.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Create a fresh directory under `root`, creating `root` if needed.
    pub fn create(root: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(root)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a file directly inside the scratch directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Remove the directory and everything in it. Failures are logged, never
    /// returned, so they cannot mask the outcome of the invocation.
    pub fn cleanup(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to remove scratch directory"
            );
        }
    }
}

/// Remove a file if present. Returns whether something was removed.
pub async fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
