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

use crate::config::{KuraConfig, kura_home};
use crate::error::Result;
use crate::locking::{LockTimeout, PrefixLock, global_token};
use log::info;
use std::io::{self, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

/// Holds the prefix lock until the process is interrupted. Useful for
/// reproducing contention when testing other tools against a prefix.
pub struct LockCommand;

impl LockCommand {
    pub fn new() -> Result<Self> {
        Ok(Self)
    }

    pub fn execute(&self, path: &Path, timeout_secs: Option<u64>) -> Result<()> {
        let config = KuraConfig::load(&kura_home())?;
        let timeout = timeout_secs
            .map(LockTimeout::from_secs)
            .unwrap_or_else(|| config.locking.timeout());

        let lock = PrefixLock::acquire_with_timeout(path, timeout, config.locking.enabled)?;
        if lock.is_noop() {
            println!("Locking is disabled; nothing to hold");
            return Ok(());
        }

        // parsed by tooling that waits for the lock to be in place; flush
        // so a piped reader sees it immediately
        println!("locked {}", path.display());
        let _ = io::stdout().flush();
        info!("Holding lock on '{}' until interrupted", path.display());

        let token = global_token();
        while !token.is_cancelled() {
            thread::sleep(Duration::from_millis(100));
        }
        drop(lock);
        println!("released");
        Ok(())
    }
}
