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

use std::fmt;
use std::time::{Duration, Instant};

/// Wall-clock budget for a blocking lock acquisition.
///
/// A configured value of zero seconds means "wait indefinitely"; only
/// cancellation interrupts an infinite wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockTimeout {
    Finite(Duration),
    Infinite,
}

impl LockTimeout {
    pub fn from_secs(seconds: u64) -> Self {
        if seconds == 0 {
            Self::Infinite
        } else {
            Self::Finite(Duration::from_secs(seconds))
        }
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, LockTimeout::Infinite)
    }
}

impl fmt::Display for LockTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockTimeout::Infinite => f.write_str("infinite"),
            LockTimeout::Finite(duration) => write!(f, "{}s", duration.as_secs()),
        }
    }
}

/// Tracks elapsed and remaining time against a [`LockTimeout`].
#[derive(Debug, Clone)]
pub(crate) struct TimeoutBudget {
    value: LockTimeout,
    started_at: Instant,
}

impl TimeoutBudget {
    pub(crate) fn new(value: LockTimeout) -> Self {
        Self {
            value,
            started_at: Instant::now(),
        }
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// `None` for an infinite budget; otherwise the time left, saturating
    /// at zero once expired.
    pub(crate) fn remaining(&self) -> Option<Duration> {
        match self.value {
            LockTimeout::Infinite => None,
            LockTimeout::Finite(limit) => Some(limit.saturating_sub(self.elapsed())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn zero_seconds_means_infinite() {
        assert!(LockTimeout::from_secs(0).is_infinite());
        assert_eq!(
            LockTimeout::from_secs(30),
            LockTimeout::Finite(Duration::from_secs(30))
        );
    }

    #[test]
    fn display_forms() {
        assert_eq!(LockTimeout::from_secs(0).to_string(), "infinite");
        assert_eq!(LockTimeout::from_secs(5).to_string(), "5s");
    }

    #[test]
    fn finite_budget_runs_down() {
        let budget = TimeoutBudget::new(LockTimeout::Finite(Duration::from_millis(40)));
        assert!(budget.remaining().is_some());
        thread::sleep(Duration::from_millis(60));
        assert_eq!(budget.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn infinite_budget_never_expires() {
        let budget = TimeoutBudget::new(LockTimeout::Infinite);
        assert_eq!(budget.remaining(), None);
    }
}
