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

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KuraError {
    #[error("Cannot lock missing path '{0}'")]
    LockTargetMissing(String),

    #[error("Failed to acquire lock on '{path}' ({timeout} timeout): {details}")]
    LockAcquisitionFailed {
        path: String,
        timeout: String,
        details: String,
    },

    #[error("Failed to clean up lock state for '{path}': {details}")]
    LockCleanup { path: String, details: String },

    #[error("Too many existing trash files for '{0}'. Please force clean the prefix")]
    TooManyTrashCollisions(String),

    #[error("Could not delete file '{0}'")]
    RemovalRetryExhausted(String),

    #[error("Prefix directory not found: {0}")]
    PrefixNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, KuraError>;

/// Renders an error and its source chain for terminal output.
pub fn format_error_chain(error: &KuraError) -> String {
    let mut output = format!("Error: {error}");
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        output.push_str(&format!("\nCaused by: {cause}"));
        source = cause.source();
    }
    output
}
