use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::errors::*;

/// Holds an exclusive advisory lock on a `LOCK` file inside a data
/// directory for as long as it is alive, so that two node processes can
/// never be pointed at the same `--data` directory at once.
///
/// Mirrors the role `core::DirLock` played in the teacher repo, minus the
/// parts of that type this workspace has no use for.
pub struct DirLock {
    path: PathBuf,
    file: File,
}

impl DirLock {
    /// Creates `dir` (and the `badger/` subdirectory backing the embedded
    /// store) with mode 0755 if missing, then takes an exclusive lock on
    /// `dir/LOCK`.
    pub fn open(dir: &Path) -> Result<Self> {
        create_dir_all_mode(dir, 0o755)?;
        create_dir_all_mode(&dir.join("badger"), 0o755)?;

        let path = dir.join("LOCK");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)?;

        file.try_lock_exclusive()
            .map_err(|_| ErrorKind::AlreadyLocked(dir.to_owned()))?;

        Ok(DirLock { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

#[cfg(unix)]
fn create_dir_all_mode(dir: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if !dir.exists() {
        fs::create_dir_all(dir)?;
        fs::set_permissions(dir, fs::Permissions::from_mode(mode))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn create_dir_all_mode(dir: &Path, _mode: u32) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locks_exclusively() {
        let tmp = tempfile::tempdir().unwrap();
        let _first = DirLock::open(tmp.path()).unwrap();
        let second = DirLock::open(tmp.path());
        assert!(second.is_err());
    }

    #[test]
    fn creates_badger_subdir() {
        let tmp = tempfile::tempdir().unwrap();
        let _lock = DirLock::open(tmp.path()).unwrap();
        assert!(tmp.path().join("badger").is_dir());
    }
}
