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
use crate::trash::clean_trash_files;
use log::info;
use std::path::Path;

pub struct CleanTrashCommand;

impl CleanTrashCommand {
    pub fn new() -> Result<Self> {
        Ok(Self)
    }

    pub fn execute(&self, prefix: &Path, deep: bool, json: bool) -> Result<()> {
        if !prefix.is_dir() {
            return Err(KuraError::PrefixNotFound(prefix.display().to_string()));
        }

        info!("Cleaning trash under '{}' (deep: {deep})", prefix.display());
        let config = KuraConfig::load(&kura_home())?;
        let _lock = PrefixLock::acquire(prefix, &config)?;

        let report = clean_trash_files(prefix, deep);
        if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!(
                "Cleaned {} trash files. {} remaining.",
                report.deleted_files, report.remaining_files
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_prefix_is_rejected() {
        let command = CleanTrashCommand::new().unwrap();
        let err = command
            .execute(Path::new("/definitely/not/here"), false, false)
            .unwrap_err();
        assert!(matches!(err, KuraError::PrefixNotFound(_)));
    }
}
