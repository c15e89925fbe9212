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

//! Filesystem primitives shared by the locking and trash subsystems.

use std::fs;
use std::io;
use std::path::Path;

/// Weak existence test: reports true for dangling symlinks, which still
/// occupy their directory entry and must be removed like any other file.
pub fn lexists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Removes `path`, recursing into directories. Symlinks are removed as
/// entries, never followed.
pub fn remove_any(path: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lexists_false_for_missing_path() {
        let temp = TempDir::new().unwrap();
        assert!(!lexists(&temp.path().join("nothing")));
    }

    #[test]
    fn remove_any_deletes_files_and_directories() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.txt");
        fs::write(&file, b"x").unwrap();
        remove_any(&file).unwrap();
        assert!(!file.exists());

        let dir = temp.path().join("pkg");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("inner.txt"), b"y").unwrap();
        remove_any(&dir).unwrap();
        assert!(!dir.exists());
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_counts_as_existing() {
        let temp = TempDir::new().unwrap();
        let link = temp.path().join("broken");
        std::os::unix::fs::symlink(temp.path().join("gone"), &link).unwrap();
        assert!(lexists(&link));
        remove_any(&link).unwrap();
        assert!(!lexists(&link));
    }
}
