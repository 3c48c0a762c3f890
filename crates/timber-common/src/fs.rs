//! Filesystem helpers shared by the save codec and the history store.
//!
//! Writes go to a sibling temp file which is renamed over the target, so a
//! reader never observes a half-written file. Reads retry once, because the
//! game may replace a save while we are listing or opening it.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{TimberError, TimberResult};

/// Temp file that is removed on drop unless committed.
struct PendingFile {
    temp_path: PathBuf,
    committed: bool,
}

impl PendingFile {
    fn create(target: &Path) -> TimberResult<(Self, fs::File)> {
        let mut name = target
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        let temp_path = target.with_file_name(name);
        let file = fs::File::create(&temp_path).map_err(|e| TimberError::io(&temp_path, e))?;
        Ok((
            Self {
                temp_path,
                committed: false,
            },
            file,
        ))
    }

    fn commit(mut self, target: &Path) -> TimberResult<()> {
        fs::rename(&self.temp_path, target).map_err(|e| TimberError::io(target, e))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PendingFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.temp_path);
        }
    }
}

/// Atomically replaces `target` with `bytes`.
///
/// Uses atomic write (write to temp, then rename) for safety.
pub fn atomic_write(target: &Path, bytes: &[u8]) -> TimberResult<()> {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| TimberError::io(parent, e))?;
    }

    let (pending, mut file) = PendingFile::create(target)?;
    file.write_all(bytes)
        .and_then(|()| file.sync_all())
        .map_err(|e| TimberError::io(&pending.temp_path, e))?;
    drop(file);

    pending.commit(target)?;
    debug!("Wrote {} bytes to {}", bytes.len(), target.display());
    Ok(())
}

/// Runs `op` against `path`, retrying exactly once if it fails.
///
/// The second error is returned as is.
pub fn retry_once<T>(path: &Path, mut op: impl FnMut() -> TimberResult<T>) -> TimberResult<T> {
    match op() {
        Ok(value) => Ok(value),
        Err(first) => {
            warn!("Access to {} failed ({first}), retrying once", path.display());
            op()
        },
    }
}

/// Reads a whole file, retrying exactly once on failure.
pub fn read_with_retry(path: &Path) -> TimberResult<Vec<u8>> {
    retry_once(path, || fs::read(path).map_err(|e| TimberError::io(path, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_replaces_content() {
        let dir = TempDir::new().expect("temp dir");
        let target = dir.path().join("data.json");

        atomic_write(&target, b"first").expect("first write");
        atomic_write(&target, b"second").expect("second write");

        assert_eq!(fs::read(&target).expect("read back"), b"second");
        assert!(!dir.path().join("data.json.tmp").exists());
    }

    #[test]
    fn test_atomic_write_creates_parent() {
        let dir = TempDir::new().expect("temp dir");
        let target = dir.path().join("nested").join("out.bin");

        atomic_write(&target, &[1, 2, 3]).expect("write");
        assert_eq!(fs::read(&target).expect("read back"), vec![1, 2, 3]);
    }

    #[test]
    fn test_failed_commit_leaves_target_intact() {
        let dir = TempDir::new().expect("temp dir");
        // A directory at the target path makes the rename fail
        let target = dir.path().join("blocked");
        fs::create_dir(&target).expect("mkdir");
        fs::write(target.join("keep"), b"x").expect("seed");

        let result = atomic_write(&target, b"payload");
        assert!(matches!(result, Err(TimberError::Io { .. })));
        assert!(target.join("keep").exists());
        assert!(!dir.path().join("blocked.tmp").exists());
    }

    #[test]
    fn test_retry_once_recovers_from_one_failure() {
        let path = Path::new("save.timber");
        let mut attempts = 0;
        let value = retry_once(path, || {
            attempts += 1;
            if attempts == 1 {
                Err(TimberError::Format("truncated".to_string()))
            } else {
                Ok(attempts)
            }
        })
        .expect("second attempt");
        assert_eq!(value, 2);
    }

    #[test]
    fn test_retry_once_gives_up_after_second_failure() {
        let path = Path::new("save.timber");
        let mut attempts = 0;
        let result: TimberResult<()> = retry_once(path, || {
            attempts += 1;
            Err(TimberError::corrupt("world.json", format!("attempt {attempts}")))
        });

        assert_eq!(attempts, 2);
        match result {
            Err(TimberError::CorruptData { reason, .. }) => assert_eq!(reason, "attempt 2"),
            other => panic!("expected the second error, got {other:?}"),
        }
    }

    #[test]
    fn test_read_missing_file_reports_path() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("missing.timber");

        match read_with_retry(&path) {
            Err(TimberError::Io { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected Io error, got {other:?}"),
        }
    }
}
