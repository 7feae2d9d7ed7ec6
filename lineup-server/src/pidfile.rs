use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

/// File holding the server's process id, removed again on drop
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Write the current process id to `path`, replacing any stale file
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::write(&path, format!("{}\n", std::process::id()))?;
        info!(path = %path.display(), pid = std::process::id(), "Wrote pid file");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Could not remove pid file");
        }
    }
}
