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
use crate::error::{KuraError, Result};
use crate::locking::PrefixLock;
use crate::trash::remove_or_rename;
use log::info;
use std::path::Path;

pub struct RemoveCommand;

impl RemoveCommand {
    pub fn new() -> Result<Self> {
        Ok(Self)
    }

    pub fn execute(&self, prefix: &Path, path: &Path) -> Result<()> {
        if !prefix.is_dir() {
            return Err(KuraError::PrefixNotFound(prefix.display().to_string()));
        }

        info!("Removing '{}' under '{}'", path.display(), prefix.display());
        let config = KuraConfig::load(&kura_home())?;
        // the safe remover relies on the prefix lock to serialize writers
        // from other processes
        let _lock = PrefixLock::acquire(prefix, &config)?;

        let removed = remove_or_rename(prefix, path)?;
        if removed == 0 {
            println!("Nothing to remove at '{}'", path.display());
        } else {
            println!("Removed '{}'", path.display());
        }
        Ok(())
    }
}
