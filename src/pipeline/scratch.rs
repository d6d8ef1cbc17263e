use log::{debug, warn};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

pub fn remove_scratch_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed scratch file {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove scratch file {}: {e}", path.display()),
    }
}

#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn size_bytes(&self) -> std::io::Result<u64> {
        Ok(tokio::fs::metadata(&self.path).await?.len())
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        remove_scratch_file(&self.path);
    }
}

#[derive(Debug)]
pub struct ScratchDir {
    dir: Option<TempDir>,
}

impl ScratchDir {
    pub fn new() -> std::io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("relay-transcribe-")
            .tempdir()?;
        debug!("Created scratch directory {}", dir.path().display());
        Ok(Self { dir: Some(dir) })
    }

    pub fn path(&self) -> &Path {
        match &self.dir {
            Some(dir) => dir.path(),
            None => Path::new(""),
        }
    }

    /// Reserves a file name inside the directory. Nothing is created on disk.
    pub fn file(&self, name: &str) -> ScratchFile {
        ScratchFile::new(self.path().join(name))
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!("Failed to remove scratch directory {}: {e}", path.display());
            }
        }
    }
}
