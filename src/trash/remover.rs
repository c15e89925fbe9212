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

//! Safe removal: delete now, or quarantine for later.
//!
//! Deleting a file that another process still has open fails on Windows
//! (sharing violation) and can fail elsewhere. Rather than dropping the
//! obligation, the file is renamed to a quarantine name and recorded in the
//! trash index so a later reclamation pass can finish the job.

use crate::error::{KuraError, Result};
use crate::paths::prefix::quarantine_candidate;
use crate::platform::fs_ops;
use crate::trash::index::TrashIndex;
use log::{error, info};
use retry::{OperationResult, retry_with_index};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Numbered quarantine candidates tried after the plain name collides.
const MAX_DISAMBIGUATION: u32 = 100;

/// Additional rename attempts after the first failure.
const RENAME_RETRIES: u64 = 3;

/// Serializes trash-index writers within this process. Writers in other
/// processes are expected to hold the prefix lock.
static TRASH_WRITER: Mutex<()> = Mutex::new(());

/// Removes `path`, quarantining it under `prefix` when direct removal
/// fails. Returns the number of entries handled: 0 when nothing existed,
/// 1 when the path was deleted *or* successfully quarantined — a renamed
/// file is tracked in the index and counts as removed.
pub fn remove_or_rename(prefix: &Path, path: &Path) -> Result<usize> {
    if !fs_ops::lexists(path) {
        return Ok(0);
    }

    match fs_ops::remove_any(path) {
        Ok(()) => Ok(1),
        Err(err) => {
            info!(
                "Caught a filesystem error for '{}': {err} (file in use?)",
                path.display()
            );
            let _guard = TRASH_WRITER.lock().unwrap_or_else(PoisonError::into_inner);
            quarantine(prefix, path)?;
            Ok(1)
        }
    }
}

fn quarantine(prefix: &Path, path: &Path) -> Result<()> {
    let outcome = retry_with_index(linear_backoff(), |attempt| {
        let trash_file = match next_quarantine_name(path) {
            Ok(candidate) => candidate,
            Err(err) => return OperationResult::Err(err),
        };
        match fs::rename(path, &trash_file) {
            Ok(()) => match record_quarantine(prefix, &trash_file) {
                Ok(()) => OperationResult::Ok(()),
                Err(err) => OperationResult::Err(err),
            },
            Err(err) => {
                error!(
                    "Trying to remove '{}': {err} (file in use?). Sleeping for {}s",
                    path.display(),
                    attempt * 2
                );
                OperationResult::Retry(KuraError::RemovalRetryExhausted(
                    path.display().to_string(),
                ))
            }
        }
    });
    outcome.map_err(|failed| failed.error)
}

/// Linear backoff: the sleep after attempt N is N * 2 seconds.
fn linear_backoff() -> impl Iterator<Item = Duration> {
    (1..=RENAME_RETRIES).map(|attempt| Duration::from_secs(attempt * 2))
}

/// Picks the first free quarantine name: the plain suffix, then numbered
/// candidates. Exhausting the counters means the prefix needs a force
/// clean.
pub(crate) fn next_quarantine_name(path: &Path) -> Result<PathBuf> {
    let plain = quarantine_candidate(path, None);
    if !fs_ops::lexists(&plain) {
        return Ok(plain);
    }
    for counter in 0..MAX_DISAMBIGUATION {
        let candidate = quarantine_candidate(path, Some(counter));
        if !fs_ops::lexists(&candidate) {
            return Ok(candidate);
        }
    }
    Err(KuraError::TooManyTrashCollisions(
        path.display().to_string(),
    ))
}

fn record_quarantine(prefix: &Path, trash_file: &Path) -> Result<()> {
    // files outside the prefix are recorded by absolute path, which joins
    // back to itself on reclamation
    let relative = trash_file.strip_prefix(prefix).unwrap_or(trash_file);
    TrashIndex::for_prefix(prefix).append(relative)?;
    Ok(())
}
