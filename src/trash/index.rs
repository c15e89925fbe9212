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

use crate::paths::prefix::trash_index_path;
use log::debug;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// The durable list of quarantined files pending removal: one prefix-relative
/// path per line, appended to as quarantines happen and rewritten whole
/// during reclamation.
pub(crate) struct TrashIndex {
    path: PathBuf,
}

impl TrashIndex {
    pub(crate) fn for_prefix(prefix: &Path) -> Self {
        Self {
            path: trash_index_path(prefix),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Reads the listed paths. Blank lines are skipped and Windows line
    /// endings are tolerated.
    pub(crate) fn read_entries(&self) -> io::Result<Vec<String>> {
        let contents = fs::read_to_string(&self.path)?;
        Ok(contents
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub(crate) fn append(&self, relative: &Path) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        writeln!(file, "{}", relative.display())
    }

    pub(crate) fn rewrite(&self, remaining: &[String]) -> io::Result<()> {
        let mut contents = String::new();
        for entry in remaining {
            contents.push_str(entry);
            contents.push('\n');
        }
        fs::write(&self.path, contents)
    }

    /// Best-effort deletion once the list is empty.
    pub(crate) fn delete_quietly(&self) {
        if let Err(err) = fs::remove_file(&self.path)
            && err.kind() != io::ErrorKind::NotFound
        {
            debug!(
                "Could not delete trash index '{}': {err}",
                self.path.display()
            );
        }
    }
}
