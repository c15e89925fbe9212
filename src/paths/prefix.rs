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

//! Path derivation for prefix metadata, lock markers, and quarantine names.
//!
//! The on-disk names are a fixed protocol shared with other processes
//! operating on the same prefix; do not change them.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Metadata directory kept inside every managed prefix.
pub const METADATA_DIR: &str = "conda-meta";

/// Index of quarantined files pending removal, one relative path per line.
pub const TRASH_INDEX_FILE: &str = "mamba_trash.txt";

/// Extension carried by quarantined files (without the leading dot).
pub const TRASH_EXTENSION: &str = "mamba_trash";

const LOCK_SUFFIX: &str = ".lock";
const TRASH_SUFFIX: &str = ".mamba_trash";

pub fn metadata_dir(prefix: &Path) -> PathBuf {
    prefix.join(METADATA_DIR)
}

pub fn trash_index_path(prefix: &Path) -> PathBuf {
    metadata_dir(prefix).join(TRASH_INDEX_FILE)
}

/// Returns the marker file guarding `target`.
///
/// Directory targets are guarded by a marker inside the directory named
/// after it; file targets by a sibling with `.lock` appended to the full
/// file name.
pub fn lock_marker_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("prefix"));
    name.push(LOCK_SUFFIX);
    if target.is_dir() {
        target.join(name)
    } else {
        target.with_file_name(name)
    }
}

/// Builds a quarantine name for `path`: the original file name with the
/// trash suffix appended, optionally carrying a numeric disambiguator
/// between the extension and the suffix.
pub fn quarantine_candidate(path: &Path, disambiguator: Option<u32>) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    if let Some(counter) = disambiguator {
        name.push(counter.to_string());
    }
    name.push(TRASH_SUFFIX);
    path.with_file_name(name)
}
