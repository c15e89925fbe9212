// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::error::{KuraError, Result};
use crate::locking::cancellation;
use crate::locking::registry;
use crate::locking::timeout::LockTimeout;
use crate::locking::wait::{self, WaitOutcome};
use crate::paths::prefix::lock_marker_path;
use crate::platform::fs_ops;
use crate::platform::{ByteRangeLock, LockDescriptor};
use log::{debug, error, trace, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Owner of one OS-level lock on a target path.
///
/// Construction performs the acquisition: the marker file is opened
/// (created if absent, remembered either way), a non-blocking attempt is
/// made first, and contention falls back to a bounded cancellable wait.
/// Once constructed the lock is held until [`release`](Self::release) or
/// drop; the marker file is deleted on release only if this handle created
/// it, so a concurrently racing process never loses its own marker.
#[derive(Debug)]
pub struct LockHandle {
    target: PathBuf,
    marker_path: PathBuf,
    timeout: LockTimeout,
    lock: Option<ByteRangeLock>,
    descriptor: LockDescriptor,
    locked: bool,
    marker_preexisted: bool,
    released: bool,
}

impl LockHandle {
    pub(crate) fn acquire(target: &Path, timeout: LockTimeout) -> Result<Self> {
        if !target.exists() {
            return Err(KuraError::LockTargetMissing(target.display().to_string()));
        }

        if target.is_dir() {
            debug!("Locking directory '{}'", target.display());
        } else {
            debug!("Locking file '{}'", target.display());
        }

        let marker_path = lock_marker_path(target);
        let marker_preexisted = fs_ops::lexists(&marker_path);

        let lock = match ByteRangeLock::open(&marker_path) {
            Ok(lock) => lock,
            Err(err) => {
                discard_marker(&marker_path, marker_preexisted);
                return Err(acquisition_error(
                    target,
                    timeout,
                    format!(
                        "could not open lock marker '{}': {err}",
                        marker_path.display()
                    ),
                ));
            }
        };
        let descriptor = lock.descriptor();

        let mut failure = "";
        let first_attempt = if registry::is_path_locked(&marker_path) {
            Ok(registry::note_duplicate_in_process(&marker_path))
        } else {
            lock.try_acquire()
        };
        let mut locked = match first_attempt {
            Ok(acquired) => acquired,
            Err(err) => {
                drop(lock);
                discard_marker(&marker_path, marker_preexisted);
                return Err(acquisition_error(target, timeout, err.to_string()));
            }
        };

        if !locked {
            warn!(
                "Cannot lock '{}'\nWaiting for another process to finish",
                target.display()
            );
            let outcome =
                wait::wait_until(|| lock.try_acquire(), timeout, &cancellation::global_token());
            match outcome {
                Ok(WaitOutcome::Acquired) => locked = true,
                Ok(WaitOutcome::TimedOut) => {
                    failure = "timed out waiting for another process to release it; \
                               changing the lock timeout or cleaning leftovers from \
                               previous runs may help";
                }
                Ok(WaitOutcome::Cancelled) => {
                    failure = "wait was cancelled by a termination signal";
                }
                Err(err) => {
                    drop(lock);
                    discard_marker(&marker_path, marker_preexisted);
                    return Err(acquisition_error(target, timeout, err.to_string()));
                }
            }
        }

        if !locked {
            drop(lock);
            discard_marker(&marker_path, marker_preexisted);
            return Err(acquisition_error(target, timeout, failure));
        }

        trace!("Lock marker created at '{}'", marker_path.display());
        debug!("Successfully locked '{}'", target.display());
        Ok(Self {
            target: target.to_path_buf(),
            marker_path,
            timeout,
            lock: Some(lock),
            descriptor,
            locked: true,
            marker_preexisted,
            released: false,
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn marker_path(&self) -> &Path {
        &self.marker_path
    }

    pub fn timeout(&self) -> LockTimeout {
        self.timeout
    }

    pub fn descriptor(&self) -> LockDescriptor {
        self.descriptor
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn marker_preexisted(&self) -> bool {
        self.marker_preexisted
    }

    /// Unlocks, closes the descriptor, and removes the marker if this
    /// handle created it. Safe to call more than once; later calls are
    /// no-ops.
    pub(crate) fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let mut result = Ok(());
        if let Some(lock) = self.lock.take() {
            if self.locked && let Err(err) = lock.release() {
                warn!(
                    "Failed to release lock on '{}': {err}",
                    self.marker_path.display()
                );
                result = Err(KuraError::LockCleanup {
                    path: self.marker_path.display().to_string(),
                    details: err.to_string(),
                });
            }
            // the descriptor closes when `lock` drops here, before the
            // marker file is removed
        }
        self.locked = false;
        discard_marker(&self.marker_path, self.marker_preexisted);
        result
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        debug!("Unlocking '{}'", self.target.display());
        // failures are logged inside release
        let _ = self.release();
    }
}

fn acquisition_error(target: &Path, timeout: LockTimeout, details: impl Into<String>) -> KuraError {
    KuraError::LockAcquisitionFailed {
        path: target.display().to_string(),
        timeout: timeout.to_string(),
        details: details.into(),
    }
}

fn discard_marker(marker_path: &Path, preexisted: bool) {
    if preexisted {
        return;
    }
    trace!("Removing lock marker '{}'", marker_path.display());
    if let Err(err) = fs::remove_file(marker_path)
        && err.kind() != io::ErrorKind::NotFound
    {
        error!(
            "Removing lock marker '{}' failed: {err}\nYou may need to remove it manually",
            marker_path.display()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_target_fails_without_creating_a_marker() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("missing");
        let err = LockHandle::acquire(&target, LockTimeout::from_secs(5)).unwrap_err();
        assert!(matches!(err, KuraError::LockTargetMissing(_)));
        assert!(!temp.path().join("missing.lock").exists());
    }

    #[test]
    fn directory_lock_creates_and_removes_nested_marker() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("env");
        fs::create_dir(&target).unwrap();

        let mut handle = LockHandle::acquire(&target, LockTimeout::from_secs(5)).unwrap();
        let marker = target.join("env.lock");
        assert!(handle.is_locked());
        assert!(marker.exists());
        assert!(!handle.marker_preexisted());

        handle.release().unwrap();
        assert!(!marker.exists());
    }

    #[test]
    fn preexisting_marker_survives_release() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("env");
        fs::create_dir(&target).unwrap();
        let marker = target.join("env.lock");
        fs::write(&marker, b"").unwrap();

        let mut handle = LockHandle::acquire(&target, LockTimeout::from_secs(5)).unwrap();
        assert!(handle.marker_preexisted());
        handle.release().unwrap();
        assert!(marker.exists());
    }

    #[test]
    fn release_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("data.json");
        fs::write(&target, b"{}").unwrap();

        let mut handle = LockHandle::acquire(&target, LockTimeout::from_secs(5)).unwrap();
        handle.release().unwrap();
        handle.release().unwrap();
        assert!(!handle.is_locked());
    }

    #[test]
    fn file_target_uses_sibling_marker() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("repodata.json");
        fs::write(&target, b"{}").unwrap();

        let handle = LockHandle::acquire(&target, LockTimeout::from_secs(5)).unwrap();
        assert_eq!(handle.marker_path(), temp.path().join("repodata.json.lock"));
        assert!(handle.marker_path().exists());
    }
}
