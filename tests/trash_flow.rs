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

use kura::trash::{clean_trash_files, remove_or_rename};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn index_path(prefix: &Path) -> std::path::PathBuf {
    prefix.join("conda-meta").join("mamba_trash.txt")
}

fn seed_quarantined(prefix: &Path, relative: &str) {
    let path = prefix.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, b"stale").unwrap();

    fs::create_dir_all(prefix.join("conda-meta")).unwrap();
    let mut contents = fs::read_to_string(index_path(prefix)).unwrap_or_default();
    contents.push_str(relative);
    contents.push('\n');
    fs::write(index_path(prefix), contents).unwrap();
}

#[test]
fn remove_is_idempotent_once_the_path_is_gone() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("pkgs").join("foo-1.0").join("bin").join("foo");
    fs::create_dir_all(file.parent().unwrap()).unwrap();
    fs::write(&file, b"payload").unwrap();

    assert_eq!(remove_or_rename(temp.path(), &file).unwrap(), 1);
    assert!(!file.exists());
    assert_eq!(remove_or_rename(temp.path(), &file).unwrap(), 0);
    // a pure no-op: no index appeared either
    assert!(!index_path(temp.path()).exists());
}

#[test]
fn shallow_reclamation_drains_every_indexed_file() {
    let temp = TempDir::new().unwrap();
    let entries = [
        "pkgs/foo-1.0/bin/foo.mamba_trash",
        "pkgs/bar-2.1/lib/libbar.so.mamba_trash",
        "etc/profile.d/bar.sh.mamba_trash",
    ];
    for entry in entries {
        seed_quarantined(temp.path(), entry);
    }

    let report = clean_trash_files(temp.path(), false);
    assert_eq!(report.deleted_files, entries.len());
    assert_eq!(report.remaining_files, 0);
    for entry in entries {
        assert!(!temp.path().join(entry).exists());
    }
    assert!(!index_path(temp.path()).exists());
}

#[test]
fn deep_reclamation_recovers_from_a_lost_index() {
    let temp = TempDir::new().unwrap();
    // quarantined files on disk, but no index at all
    let plain = temp.path().join("bin").join("tool.mamba_trash");
    let numbered = temp.path().join("bin").join("tool.exe4.mamba_trash");
    fs::create_dir_all(plain.parent().unwrap()).unwrap();
    fs::write(&plain, b"stale").unwrap();
    fs::write(&numbered, b"stale").unwrap();
    let survivor = temp.path().join("bin").join("tool.exe");
    fs::write(&survivor, b"live").unwrap();

    let report = clean_trash_files(temp.path(), true);
    assert_eq!(report.deleted_files, 2);
    assert!(!plain.exists());
    assert!(!numbered.exists());
    assert!(survivor.exists());
}

#[test]
fn deep_reclamation_reconciles_a_corrupted_index() {
    let temp = TempDir::new().unwrap();
    seed_quarantined(temp.path(), "pkgs/baz.dll.mamba_trash");
    // garbage in the index must not stop the deep scan
    fs::write(index_path(temp.path()), b"\xff\xfenot utf8\n").unwrap();

    let report = clean_trash_files(temp.path(), true);
    assert_eq!(report.deleted_files, 1);
    assert!(!temp.path().join("pkgs/baz.dll.mamba_trash").exists());
    assert!(!index_path(temp.path()).exists());
}

#[test]
fn directories_are_removed_recursively_in_one_call() {
    let temp = TempDir::new().unwrap();
    let pkg = temp.path().join("pkgs").join("foo-1.0");
    fs::create_dir_all(pkg.join("bin")).unwrap();
    fs::write(pkg.join("bin").join("foo"), b"bin").unwrap();
    fs::write(pkg.join("info.json"), b"{}").unwrap();

    assert_eq!(remove_or_rename(temp.path(), &pkg).unwrap(), 1);
    assert!(!pkg.exists());
}
