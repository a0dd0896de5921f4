//! Advisory lock file guarding history read-modify-write across processes.
//!
//! The lock is `{history}.lock`, created exclusively and holding the writer's
//! pid. A lock older than `stale_after` is treated as abandoned and reclaimed
//! through a rename, so two waiters cannot both remove the same lock.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use crate::error::{HistoryError, HistoryResult};

/// Retry and staleness policy for lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    pub attempts: u32,
    pub backoff: Duration,
    pub stale_after: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            attempts: 5,
            backoff: Duration::from_millis(200),
            stale_after: Duration::from_secs(120),
        }
    }
}

/// Lock file path for a history document.
pub fn lock_path_for(history_path: &Path) -> PathBuf {
    let mut name = history_path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// Held lock. The lock file is removed on drop.
#[derive(Debug)]
pub struct HistoryLock {
    path: PathBuf,
}

impl HistoryLock {
    /// Acquire the lock for `history_path`, retrying per `options`.
    pub fn acquire(history_path: &Path, options: &LockOptions) -> HistoryResult<Self> {
        let path = lock_path_for(history_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| HistoryError::Io {
                path: parent.to_path_buf(),
                message: e.to_string(),
            })?;
        }

        let attempts = options.attempts.max(1);
        for attempt in 1..=attempts {
            match try_create(&path) {
                Ok(()) => {
                    debug!(lock = %path.display(), attempt, "acquired history lock");
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if reclaim_if_stale(&path, options.stale_after) && try_create(&path).is_ok() {
                        debug!(lock = %path.display(), attempt, "acquired reclaimed history lock");
                        return Ok(Self { path });
                    }
                    debug!(lock = %path.display(), attempt, attempts, "history lock busy");
                    if attempt < attempts {
                        std::thread::sleep(options.backoff);
                    }
                }
                Err(e) => {
                    return Err(HistoryError::Io {
                        path,
                        message: e.to_string(),
                    });
                }
            }
        }

        let holder = fs::read_to_string(&path)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Err(HistoryError::LockHeld { path, holder })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for HistoryLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(lock = %self.path.display(), error = %e, "failed to remove history lock");
            }
        }
    }
}

fn try_create(path: &Path) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    write!(file, "{}", std::process::id())?;
    Ok(())
}

fn lock_age(path: &Path) -> Option<Duration> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
}

/// Reclaim `path` when its mtime is older than `stale_after`. Returns true if reclaimed.
///
/// The lock is first renamed to a name unique to this process, then its age is
/// checked again. If a concurrent waiter already replaced it with a fresh lock,
/// that lock is linked back into place instead of being removed. A fresh lock
/// created between the rename and the link-back can still be lost.
fn reclaim_if_stale(path: &Path, stale_after: Duration) -> bool {
    let is_stale = |p: &Path| lock_age(p).is_some_and(|age| age > stale_after);
    if !is_stale(path) {
        return false;
    }

    let claimed = claimed_path(path);
    if fs::rename(path, &claimed).is_err() {
        return false;
    }

    if !is_stale(&claimed) {
        debug!(lock = %path.display(), "lock was replaced while reclaiming, restoring");
        let _ = fs::hard_link(&claimed, path);
        let _ = fs::remove_file(&claimed);
        return false;
    }

    warn!(
        lock = %path.display(),
        age_secs = lock_age(&claimed).map_or(0, |age| age.as_secs()),
        "reclaiming stale history lock"
    );
    if let Err(e) = fs::remove_file(&claimed) {
        warn!(lock = %claimed.display(), error = %e, "failed to remove reclaimed lock");
    }
    true
}

fn claimed_path(path: &Path) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |d| d.subsec_nanos());
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".stale-{}-{}", std::process::id(), nanos));
    PathBuf::from(name)
}
