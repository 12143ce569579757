// Lock marker file guarding a data file against a second concurrent engine.
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use libc::{EACCES, EPERM};

use crate::core::error::{Error, ErrorKind};

/// Held for the lifetime of an engine; dropping it removes the marker.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    file: Option<File>,
}

impl LockGuard {
    /// Creates the marker, failing with `LockHeld` if it already exists.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|err| match err.kind() {
                io::ErrorKind::AlreadyExists => Error::new(ErrorKind::LockHeld)
                    .with_message("lock marker already present")
                    .with_path(&path)
                    .with_source(err),
                _ => Error::new(lock_error_kind(&err))
                    .with_path(&path)
                    .with_source(err),
            })?;
        if let Err(err) = file.try_lock_exclusive() {
            let _ = fs::remove_file(&path);
            return Err(Error::new(lock_error_kind(&err))
                .with_path(&path)
                .with_source(err));
        }
        tracing::debug!(path = %path.display(), "lock marker acquired");
        Ok(Self {
            path,
            file: Some(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unlocks and removes the marker, reporting a failed removal.
    pub fn release(mut self) -> Result<(), Error> {
        self.unlock();
        fs::remove_file(&self.path).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to remove lock marker")
                .with_path(&self.path)
                .with_source(err)
        })
    }

    fn unlock(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
            tracing::debug!(path = %self.path.display(), "lock marker released");
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.file.is_some() {
            self.unlock();
            let _ = fs::remove_file(&self.path);
        }
    }
}

fn lock_error_kind(err: &io::Error) -> ErrorKind {
    let errno = err.raw_os_error().unwrap_or_default();
    if errno == EACCES || errno == EPERM {
        return ErrorKind::Permission;
    }
    match err.kind() {
        io::ErrorKind::WouldBlock => ErrorKind::LockHeld,
        io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        _ => ErrorKind::Io,
    }
}
