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

//! Reclamation of quarantined files.
//!
//! Best-effort by contract: a file that still cannot be removed stays
//! quarantined and listed for a future run; nothing here ever fails the
//! caller.

use crate::config::KuraConfig;
use crate::paths::prefix::TRASH_EXTENSION;
use crate::platform::fs_ops;
use crate::trash::index::TrashIndex;
use log::{debug, info, warn};
use serde::Serialize;
use std::path::Path;
use walkdir::WalkDir;

/// Outcome of one reclamation pass.
#[derive(Debug, Default, Clone, Serialize)]
pub struct TrashCleanReport {
    pub deleted_files: usize,
    pub remaining_files: usize,
}

/// Attempts to finish the deletion of quarantined files under `prefix`.
///
/// Shallow mode (`deep == false`) drains the trash index. Deep mode
/// recursively scans the prefix for the quarantine extension instead,
/// recovering files the index lost track of. Both modes reconcile the
/// index afterwards: still-stuck entries are written back, and the index
/// file itself is deleted once nothing remains.
pub fn clean_trash_files(prefix: &Path, deep: bool) -> TrashCleanReport {
    let index = TrashIndex::for_prefix(prefix);
    let mut deleted_files = 0;
    let mut remaining: Vec<String> = Vec::new();

    if !deep && index.exists() {
        match index.read_entries() {
            Ok(entries) => {
                for entry in entries {
                    let full_path = prefix.join(&entry);
                    info!("Trash: removing '{}'", full_path.display());
                    if !fs_ops::lexists(&full_path) || fs_ops::remove_any(&full_path).is_ok() {
                        deleted_files += 1;
                    } else {
                        info!("Trash: could not remove '{}'", full_path.display());
                        remaining.push(entry);
                    }
                }
            }
            Err(err) => warn!(
                "Failed to read trash index '{}': {err}",
                index.path().display()
            ),
        }
    }

    if deep {
        let mut found = Vec::new();
        for entry in WalkDir::new(prefix) {
            match entry {
                Ok(entry)
                    if entry
                        .path()
                        .extension()
                        .is_some_and(|ext| ext == TRASH_EXTENSION) =>
                {
                    found.push(entry.into_path());
                }
                Ok(_) => {}
                Err(err) => warn!("Trash: scan error under '{}': {err}", prefix.display()),
            }
        }
        for path in found {
            info!("Trash: removing '{}'", path.display());
            if fs_ops::remove_any(&path).is_ok() {
                deleted_files += 1;
            } else {
                let relative = path.strip_prefix(prefix).unwrap_or(&path);
                remaining.push(relative.display().to_string());
            }
        }
    }

    if remaining.is_empty() {
        index.delete_quietly();
    } else if let Err(err) = index.rewrite(&remaining) {
        warn!(
            "Failed to rewrite trash index '{}': {err}",
            index.path().display()
        );
    }

    info!(
        "Cleaned {deleted_files} trash files. {} remaining.",
        remaining.len()
    );
    TrashCleanReport {
        deleted_files,
        remaining_files: remaining.len(),
    }
}

/// Shallow reclamation pass for tool startup. Skipped entirely when the
/// configuration asks to preserve quarantined artifacts for debugging.
pub fn run_startup_reclamation(prefix: &Path, config: &KuraConfig) -> Option<TrashCleanReport> {
    if config.trash.preserve {
        debug!("Preserving quarantined files, skipping trash reclamation");
        return None;
    }
    Some(clean_trash_files(prefix, false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn quarantine_file(prefix: &Path, relative: &str) -> PathBuf {
        let path = prefix.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"stale").unwrap();
        let index = TrashIndex::for_prefix(prefix);
        index.append(Path::new(relative)).unwrap();
        path
    }

    #[test]
    fn shallow_pass_drains_index_and_deletes_it() {
        let temp = TempDir::new().unwrap();
        let a = quarantine_file(temp.path(), "pkgs/a.txt.mamba_trash");
        let b = quarantine_file(temp.path(), "pkgs/b.so.mamba_trash");

        let report = clean_trash_files(temp.path(), false);
        assert_eq!(report.deleted_files, 2);
        assert_eq!(report.remaining_files, 0);
        assert!(!a.exists());
        assert!(!b.exists());
        assert!(!TrashIndex::for_prefix(temp.path()).exists());
    }

    #[test]
    fn entries_already_gone_still_count_as_deleted() {
        let temp = TempDir::new().unwrap();
        let index = TrashIndex::for_prefix(temp.path());
        index
            .append(Path::new("pkgs/vanished.txt.mamba_trash"))
            .unwrap();

        let report = clean_trash_files(temp.path(), false);
        assert_eq!(report.deleted_files, 1);
        assert!(!index.exists());
    }

    #[test]
    fn missing_index_makes_shallow_pass_a_noop() {
        let temp = TempDir::new().unwrap();
        let report = clean_trash_files(temp.path(), false);
        assert_eq!(report.deleted_files, 0);
        assert_eq!(report.remaining_files, 0);
    }

    #[test]
    fn deep_pass_finds_files_without_an_index() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("lib").join("libfoo.so.mamba_trash");
        fs::create_dir_all(nested.parent().unwrap()).unwrap();
        fs::write(&nested, b"stale").unwrap();
        let numbered = temp.path().join("bin").join("foo.txt3.mamba_trash");
        fs::create_dir_all(numbered.parent().unwrap()).unwrap();
        fs::write(&numbered, b"stale").unwrap();
        let untouched = temp.path().join("bin").join("keep.txt");
        fs::write(&untouched, b"live").unwrap();

        let report = clean_trash_files(temp.path(), true);
        assert_eq!(report.deleted_files, 2);
        assert!(!nested.exists());
        assert!(!numbered.exists());
        assert!(untouched.exists());
    }

    #[test]
    fn deep_pass_reconciles_a_stale_index() {
        let temp = TempDir::new().unwrap();
        let trash = quarantine_file(temp.path(), "pkgs/a.txt.mamba_trash");

        let report = clean_trash_files(temp.path(), true);
        assert_eq!(report.deleted_files, 1);
        assert!(!trash.exists());
        assert!(!TrashIndex::for_prefix(temp.path()).exists());
    }

    #[test]
    fn preserve_skips_startup_reclamation() {
        let temp = TempDir::new().unwrap();
        let trash = quarantine_file(temp.path(), "pkgs/a.txt.mamba_trash");

        let mut config = KuraConfig::default();
        config.trash.preserve = true;
        assert!(run_startup_reclamation(temp.path(), &config).is_none());
        assert!(trash.exists());

        config.trash.preserve = false;
        let report = run_startup_reclamation(temp.path(), &config).unwrap();
        assert_eq!(report.deleted_files, 1);
        assert!(!trash.exists());
    }
}
