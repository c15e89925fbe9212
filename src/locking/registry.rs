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

//! Process-wide deduplication of lock handles.
//!
//! Two threads of one process must never open independent OS-level locks on
//! the same path: POSIX record locks are owned per process, so the second
//! "acquisition" would silently succeed and the first close would drop the
//! lock. The registry keys live handles by absolute path and hands the same
//! `Arc` to every requester; it holds only `Weak` references and therefore
//! never extends a handle's lifetime. Entries are pruned lazily on lookup.
//!
//! The registry is a lazily initialized singleton and is never torn down.

use crate::error::Result;
use crate::locking::handle::LockHandle;
use crate::locking::timeout::LockTimeout;
use crate::platform::LockDescriptor;
use log::debug;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};

struct RegistryEntry {
    handle: Weak<LockHandle>,
    descriptor: LockDescriptor,
}

#[derive(Default)]
pub(crate) struct LockRegistry {
    entries: Mutex<HashMap<PathBuf, RegistryEntry>>,
}

static REGISTRY: OnceLock<LockRegistry> = OnceLock::new();

pub(crate) fn global() -> &'static LockRegistry {
    REGISTRY.get_or_init(LockRegistry::default)
}

impl LockRegistry {
    /// Returns the live handle for `path` if one exists, otherwise acquires
    /// a new one and records it. The table lock is held across the whole
    /// acquisition so two threads cannot race a second OS lock onto the
    /// same path.
    pub(crate) fn acquire(&self, path: &Path, timeout: LockTimeout) -> Result<Arc<LockHandle>> {
        let absolute = std::path::absolute(path)?;
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = entries.get(&absolute)
            && let Some(handle) = entry.handle.upgrade()
        {
            note_duplicate_in_process(&absolute);
            return Ok(handle);
        }

        let handle = Arc::new(LockHandle::acquire(&absolute, timeout)?);
        entries.insert(
            absolute,
            RegistryEntry {
                handle: Arc::downgrade(&handle),
                descriptor: handle.descriptor(),
            },
        );
        Ok(handle)
    }

    /// Point-in-time query; the answer can be stale the moment it returns.
    /// Reports `false` when the table is contended: the table lock is held
    /// across acquisitions, so waiting here could stall a diagnostic caller
    /// for a whole lock timeout (or deadlock the acquiring thread itself).
    pub(crate) fn is_path_locked(&self, path: &Path) -> bool {
        let Ok(absolute) = std::path::absolute(path) else {
            return false;
        };
        let Ok(mut entries) = self.entries.try_lock() else {
            return false;
        };
        match entries.get(&absolute) {
            Some(entry) if entry.handle.strong_count() > 0 => true,
            Some(_) => {
                entries.remove(&absolute);
                false
            }
            None => false,
        }
    }

    /// Descriptor-keyed variant of [`is_path_locked`](Self::is_path_locked),
    /// the only reliable in-process form on POSIX where a path-based probe
    /// would need a second descriptor. Linear scan; expired entries found
    /// on the way are pruned.
    pub(crate) fn is_descriptor_locked(&self, descriptor: LockDescriptor) -> bool {
        let Ok(mut entries) = self.entries.try_lock() else {
            return false;
        };
        let mut live = false;
        entries.retain(|_, entry| {
            if entry.handle.strong_count() == 0 {
                return false;
            }
            if entry.descriptor == descriptor {
                live = true;
            }
            true
        });
        live
    }
}

pub(crate) fn is_path_locked(path: &Path) -> bool {
    global().is_path_locked(path)
}

/// Logs that a lock request hit a path this process already holds. Reports
/// `true` unconditionally once logged.
pub(crate) fn note_duplicate_in_process(path: &Path) -> bool {
    debug!("Path already locked by this process: '{}'", path.display());
    true
}
