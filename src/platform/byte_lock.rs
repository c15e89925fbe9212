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

//! Exclusive byte-range lock on a marker file.
//!
//! Mutual exclusion between processes is carried by an OS-level lock on a
//! single byte at a fixed offset of the marker file. POSIX record locks and
//! Windows byte-range locks satisfy one contract here; nothing outside this
//! module branches on the platform.
//!
//! POSIX caveat: record locks are owned per process, so a second descriptor
//! opened on the same marker would silently succeed, and closing any
//! descriptor on the file drops the process's locks. The in-process lock
//! registry exists to keep callers away from both edges.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

#[cfg(windows)]
use std::os::windows::io::AsRawHandle;

#[cfg(windows)]
use winapi::um::fileapi::{LockFileEx, UnlockFileEx};

#[cfg(windows)]
use winapi::um::minwinbase::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, OVERLAPPED};

#[cfg(windows)]
use winapi::shared::winerror::ERROR_LOCK_VIOLATION;

#[cfg(windows)]
use winapi::um::winnt::HANDLE;

/// Offset of the locked byte inside the marker file. Fixed protocol value
/// shared with other processes; do not change.
const LOCK_BYTE_OFFSET: i64 = 21;

/// Raw descriptor/handle value, used only as a registry lookup key.
pub type LockDescriptor = u64;

/// Owns the marker file descriptor and the byte-range lock taken on it.
#[derive(Debug)]
pub struct ByteRangeLock {
    file: File,
}

impl ByteRangeLock {
    /// Opens (creating if absent, never truncating) the marker file.
    pub fn open(marker_path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(marker_path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(marker_path, permissions)?;
        }

        Ok(Self { file })
    }

    #[cfg(unix)]
    pub fn descriptor(&self) -> LockDescriptor {
        self.file.as_raw_fd() as LockDescriptor
    }

    #[cfg(windows)]
    pub fn descriptor(&self) -> LockDescriptor {
        self.file.as_raw_handle() as usize as LockDescriptor
    }

    /// Attempts the exclusive lock without blocking. `Ok(false)` means the
    /// byte is held elsewhere; any other failure is a real error.
    #[cfg(unix)]
    pub fn try_acquire(&self) -> io::Result<bool> {
        let record = lock_record(libc::F_WRLCK as libc::c_short);
        let ret = unsafe { libc::fcntl(self.file.as_raw_fd(), libc::F_SETLK, &record) };
        if ret == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(code) if code == libc::EACCES || code == libc::EAGAIN => Ok(false),
            _ => Err(err),
        }
    }

    #[cfg(windows)]
    pub fn try_acquire(&self) -> io::Result<bool> {
        let mut overlapped = overlapped_at_offset();
        let ret = unsafe {
            LockFileEx(
                self.file.as_raw_handle() as HANDLE,
                LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY,
                0,
                1,
                0,
                &mut overlapped,
            )
        };
        if ret != 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(code) if code == ERROR_LOCK_VIOLATION as i32 => Ok(false),
            _ => Err(err),
        }
    }

    /// Releases the byte-range lock. Required on Windows, where closing the
    /// handle does not reliably drop byte-range locks; harmless on POSIX.
    #[cfg(unix)]
    pub fn release(&self) -> io::Result<()> {
        let record = lock_record(libc::F_UNLCK as libc::c_short);
        let ret = unsafe { libc::fcntl(self.file.as_raw_fd(), libc::F_SETLK, &record) };
        if ret == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(windows)]
    pub fn release(&self) -> io::Result<()> {
        let mut overlapped = overlapped_at_offset();
        let ret = unsafe {
            UnlockFileEx(
                self.file.as_raw_handle() as HANDLE,
                0,
                1,
                0,
                &mut overlapped,
            )
        };
        if ret != 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    /// Asks the kernel whether another process holds the byte. Own locks are
    /// invisible to `F_GETLK`, so a `false` here says nothing about this
    /// process; the registry answers that side.
    #[cfg(unix)]
    pub fn probe_external(&self) -> io::Result<bool> {
        let mut record = lock_record(libc::F_WRLCK as libc::c_short);
        let ret = unsafe { libc::fcntl(self.file.as_raw_fd(), libc::F_GETLK, &mut record) };
        if ret == -1 {
            return Err(io::Error::last_os_error());
        }
        if record.l_type == libc::F_UNLCK as libc::c_short {
            let own_pid = unsafe { libc::getpid() };
            if record.l_pid != 0 && record.l_pid != own_pid {
                log::debug!(
                    "Marker reports no lock but names owner PID {} (own PID {own_pid})",
                    record.l_pid
                );
            }
            Ok(false)
        } else {
            Ok(true)
        }
    }
}

#[cfg(unix)]
fn lock_record(lock_type: libc::c_short) -> libc::flock {
    let mut record: libc::flock = unsafe { std::mem::zeroed() };
    record.l_type = lock_type;
    record.l_whence = libc::SEEK_SET as libc::c_short;
    record.l_start = LOCK_BYTE_OFFSET as libc::off_t;
    record.l_len = 1;
    record
}

#[cfg(windows)]
fn overlapped_at_offset() -> OVERLAPPED {
    let mut overlapped: OVERLAPPED = unsafe { std::mem::zeroed() };
    unsafe {
        overlapped.u.s_mut().Offset = LOCK_BYTE_OFFSET as u32;
    }
    overlapped
}

/// Probes a marker from a fresh handle. Windows isolates byte-range locks
/// between handles, so reading the locked byte through a new one fails iff
/// some process (including this one) holds the lock.
#[cfg(windows)]
pub fn probe_marker(marker_path: &Path) -> io::Result<bool> {
    use std::io::{Read, Seek, SeekFrom};

    let mut file = match OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(marker_path)
    {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::PermissionDenied => return Ok(true),
        Err(err) => return Err(err),
    };
    file.seek(SeekFrom::Start(LOCK_BYTE_OFFSET as u64))?;
    let mut buffer = [0u8; 1];
    Ok(file.read(&mut buffer).is_err())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn acquire_and_release_on_fresh_marker() {
        let temp = TempDir::new().unwrap();
        let marker = temp.path().join("env.lock");
        let lock = ByteRangeLock::open(&marker).unwrap();
        assert!(lock.try_acquire().unwrap());
        lock.release().unwrap();
        assert!(marker.exists());
    }

    #[test]
    fn open_does_not_truncate_existing_marker() {
        let temp = TempDir::new().unwrap();
        let marker = temp.path().join("env.lock");
        std::fs::write(&marker, b"owner hint").unwrap();
        let _lock = ByteRangeLock::open(&marker).unwrap();
        assert_eq!(std::fs::read(&marker).unwrap(), b"owner hint");
    }

    #[cfg(unix)]
    #[test]
    fn probe_reports_unlocked_marker() {
        let temp = TempDir::new().unwrap();
        let marker = temp.path().join("env.lock");
        let lock = ByteRangeLock::open(&marker).unwrap();
        assert!(!lock.probe_external().unwrap());
    }
}
