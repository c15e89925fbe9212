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

use crate::config::KuraConfig;
use crate::error::Result;
use crate::locking::handle::LockHandle;
use crate::locking::registry;
use crate::locking::timeout::LockTimeout;
use crate::platform::LockDescriptor;
use log::debug;
use std::path::Path;
use std::sync::Arc;

#[cfg(windows)]
use crate::paths::prefix::lock_marker_path;

#[cfg(windows)]
use crate::platform::byte_lock;

/// Shared ownership of a prefix lock.
///
/// This is the only entry point callers use. Concurrent requests for the
/// same path within one process receive clones of the same underlying
/// [`LockHandle`]; the OS-level lock is released when the last of them is
/// dropped. With locking disabled by configuration a no-op sentinel is
/// returned, which callers treat exactly like a real lock.
#[derive(Debug)]
pub struct PrefixLock {
    inner: Option<Arc<LockHandle>>,
}

impl PrefixLock {
    /// Acquires the lock for `path` using the configured timeout, or the
    /// no-op sentinel when locking is disabled.
    pub fn acquire(path: &Path, config: &KuraConfig) -> Result<Self> {
        Self::acquire_with_timeout(path, config.locking.timeout(), config.locking.enabled)
    }

    pub fn acquire_with_timeout(
        path: &Path,
        timeout: LockTimeout,
        enabled: bool,
    ) -> Result<Self> {
        if !enabled {
            debug!("Locking disabled; skipping lock on '{}'", path.display());
            return Ok(Self { inner: None });
        }
        let handle = registry::global().acquire(path, timeout)?;
        Ok(Self {
            inner: Some(handle),
        })
    }

    /// True for the sentinel handed out when locking is disabled.
    pub fn is_noop(&self) -> bool {
        self.inner.is_none()
    }

    pub fn target(&self) -> Option<&Path> {
        self.inner.as_ref().map(|handle| handle.target())
    }

    pub fn marker_path(&self) -> Option<&Path> {
        self.inner.as_ref().map(|handle| handle.marker_path())
    }

    pub fn descriptor(&self) -> Option<LockDescriptor> {
        self.inner.as_ref().map(|handle| handle.descriptor())
    }

    /// Point-in-time diagnostic: is `path` locked by this process (or, on
    /// Windows, by anyone)? The answer may be stale immediately after it
    /// returns; never use it for synchronization.
    pub fn is_locked(path: &Path) -> bool {
        #[cfg(windows)]
        {
            if registry::is_path_locked(path) {
                return true;
            }
            // Windows isolates byte-range locks between handles, so a fresh
            // probe of the marker sees other processes too.
            byte_lock::probe_marker(&lock_marker_path(path)).unwrap_or(false)
        }

        #[cfg(not(windows))]
        {
            // A path-based kernel probe on POSIX would need a second
            // descriptor, which clears record locks; only the in-process
            // registry can answer safely.
            registry::is_path_locked(path)
        }
    }

    /// Descriptor-keyed diagnostic, same staleness caveats as
    /// [`is_locked`](Self::is_locked).
    pub fn is_locked_descriptor(descriptor: LockDescriptor) -> bool {
        registry::global().is_descriptor_locked(descriptor)
    }
}
