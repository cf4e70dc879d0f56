//! Host file capabilities used by backups

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::error::Result;

/// File access supplied by the environment the app runs in
pub trait FileHost {
    /// Ask for a file that later exports overwrite in place.
    /// `Ok(None)` when the capability is missing or the user declines.
    fn choose_save_handle(&mut self, suggested_name: &str) -> Result<Option<PathBuf>>;

    /// Overwrite the file behind `handle`
    fn write_handle(&mut self, handle: &Path, bytes: &[u8]) -> Result<()>;

    /// Hand the bytes to the user as a download. Whether the user kept the
    /// file cannot be observed, so this never fails.
    fn offer_download(&mut self, suggested_name: &str, bytes: &[u8]);

    /// Read a user-chosen file. `Ok(None)` when no file was chosen.
    fn choose_open_file(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Filesystem host for the command line: the save handle is a configured
/// backup path and downloads land in a directory.
#[derive(Debug, Clone)]
pub struct LocalFileHost {
    backup_file: Option<PathBuf>,
    download_dir: PathBuf,
    open_file: Option<PathBuf>,
}

impl LocalFileHost {
    pub fn new(backup_file: Option<PathBuf>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            backup_file,
            download_dir: download_dir.into(),
            open_file: None,
        }
    }

    /// File returned by the next `choose_open_file`
    pub fn with_open_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.open_file = Some(path.into());
        self
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }
}

impl FileHost for LocalFileHost {
    fn choose_save_handle(&mut self, _suggested_name: &str) -> Result<Option<PathBuf>> {
        Ok(self.backup_file.clone())
    }

    fn write_handle(&mut self, handle: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = handle.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        // Write next to the target and rename so a crash never leaves half a backup
        let tmp = handle.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, handle)?;
        debug!("Wrote {} bytes to {}", bytes.len(), handle.display());
        Ok(())
    }

    fn offer_download(&mut self, suggested_name: &str, bytes: &[u8]) {
        let path = self.download_dir.join(suggested_name);
        let result = fs::create_dir_all(&self.download_dir).and_then(|_| fs::write(&path, bytes));
        match result {
            Ok(()) => debug!("Saved download {}", path.display()),
            Err(e) => error!("Failed to save download {}: {}", path.display(), e),
        }
    }

    fn choose_open_file(&mut self) -> Result<Option<Vec<u8>>> {
        match self.open_file.take() {
            Some(path) => Ok(Some(fs::read(path)?)),
            None => Ok(None),
        }
    }
}
