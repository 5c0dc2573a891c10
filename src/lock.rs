//! One responder per profile, enforced with an advisory `flock(2)` on a
//! per-profile lock file. The kernel drops the lock if the process dies.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{AppError, AppResult};

pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl std::fmt::Debug for InstanceLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceLock")
            .field("path", &self.path)
            .finish()
    }
}

impl InstanceLock {
    /// Takes the lock without blocking and records our pid in the file.
    pub fn acquire(path: &Path) -> AppResult<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        if !try_lock(&file)? {
            let mut holder = String::new();
            file.read_to_string(&mut holder)?;
            let holder = holder.trim();
            let detail = if holder.is_empty() {
                "another process".to_string()
            } else {
                format!("pid {holder}")
            };
            return Err(AppError::Locked(format!(
                "responder already running for this profile ({detail}, lock {})",
                path.display()
            )));
        }

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(std::process::id().to_string().as_bytes())?;
        file.flush()?;
        debug!(lock = %path.display(), "instance lock acquired");

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        unlock(&self.file);
    }
}

#[cfg(unix)]
fn try_lock(file: &File) -> AppResult<bool> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the fd is owned by `file` and stays open for the call.
    let ret = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if ret == 0 {
        return Ok(true);
    }

    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        return Ok(false);
    }
    Err(err.into())
}

#[cfg(unix)]
fn unlock(file: &File) {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the fd is owned by `file`. Closing it would release the lock anyway.
    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

#[cfg(not(unix))]
fn try_lock(_file: &File) -> AppResult<bool> {
    Ok(true)
}

#[cfg(not(unix))]
fn unlock(_file: &File) {}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn second_holder_is_refused_until_release() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("default.lock");

        let first = InstanceLock::acquire(&path).expect("first lock");
        let contents = std::fs::read_to_string(first.path()).expect("lock file");
        assert_eq!(contents, std::process::id().to_string());

        let err = InstanceLock::acquire(&path).expect_err("lock is held");
        assert!(matches!(err, AppError::Locked(_)));
        assert!(err.to_string().contains(&std::process::id().to_string()));

        drop(first);
        InstanceLock::acquire(&path).expect("lock after release");
    }
}
