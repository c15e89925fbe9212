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

//! Bounded, cancellable wait for a contended lock.
//!
//! A blocking `fcntl(F_SETLKW)` cannot be given a timeout and can only be
//! interrupted by signalling the thread stuck in it, so the blocking path
//! is implemented as a poll: repeat the non-blocking attempt under an
//! exponential backoff clamped to the remaining budget, observing the
//! cancellation token between probes. No worker thread exists, so none can
//! outlive the wait, and the descriptor is only ever touched by the caller.

use crate::locking::cancellation::CancellationToken;
use crate::locking::timeout::{LockTimeout, TimeoutBudget};
use std::cmp;
use std::io;
use std::thread;
use std::time::Duration;

/// Exponential backoff between lock probes.
#[derive(Debug, Clone)]
pub(crate) struct PollingBackoff {
    factor: u32,
    cap: Duration,
    current: Duration,
}

impl PollingBackoff {
    pub(crate) fn new(initial: Duration, factor: u32, cap: Duration) -> Self {
        Self {
            factor: cmp::max(factor, 1),
            cap,
            current: initial,
        }
    }

    /// Returns the current delay and advances the sequence.
    pub(crate) fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        let next = self.current.saturating_mul(self.factor);
        self.current = cmp::min(next, self.cap);
        delay
    }
}

impl Default for PollingBackoff {
    fn default() -> Self {
        // Cap keeps the steady-state probe rate around one per second.
        Self::new(Duration::from_millis(10), 2, Duration::from_millis(1_100))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitOutcome {
    Acquired,
    TimedOut,
    Cancelled,
}

/// Repeats `attempt` until it reports success, the budget runs out, or the
/// token is cancelled. The final probe happens at the deadline, so the call
/// returns within `timeout` plus one backoff interval.
pub(crate) fn wait_until<F>(
    mut attempt: F,
    timeout: LockTimeout,
    cancellation: &CancellationToken,
) -> io::Result<WaitOutcome>
where
    F: FnMut() -> io::Result<bool>,
{
    let budget = TimeoutBudget::new(timeout);
    let mut backoff = PollingBackoff::default();

    loop {
        if cancellation.is_cancelled() {
            return Ok(WaitOutcome::Cancelled);
        }
        if attempt()? {
            return Ok(WaitOutcome::Acquired);
        }
        let Some(delay) = next_sleep(&budget, &mut backoff) else {
            return Ok(WaitOutcome::TimedOut);
        };
        thread::sleep(delay);
    }
}

/// The next sleep interval, clamped to the remaining budget; `None` once
/// the budget is exhausted.
fn next_sleep(budget: &TimeoutBudget, backoff: &mut PollingBackoff) -> Option<Duration> {
    let delay = backoff.next_delay();
    match budget.remaining() {
        None => Some(delay),
        Some(remaining) if remaining.is_zero() => None,
        Some(remaining) => Some(cmp::min(delay, remaining)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn backoff_doubles_until_cap() {
        let mut backoff =
            PollingBackoff::new(Duration::from_millis(10), 2, Duration::from_millis(40));
        assert_eq!(backoff.next_delay(), Duration::from_millis(10));
        assert_eq!(backoff.next_delay(), Duration::from_millis(20));
        assert_eq!(backoff.next_delay(), Duration::from_millis(40));
        assert_eq!(backoff.next_delay(), Duration::from_millis(40));
    }

    #[test]
    fn acquires_after_a_few_probes() {
        let mut probes = 0;
        let outcome = wait_until(
            || {
                probes += 1;
                Ok(probes >= 3)
            },
            LockTimeout::Finite(Duration::from_secs(5)),
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(outcome, WaitOutcome::Acquired);
        assert_eq!(probes, 3);
    }

    #[test]
    fn times_out_within_budget_plus_backoff() {
        let started = Instant::now();
        let outcome = wait_until(
            || Ok(false),
            LockTimeout::Finite(Duration::from_millis(80)),
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(outcome, WaitOutcome::TimedOut);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(80));
        assert!(waited < Duration::from_secs(2));
    }

    #[test]
    fn cancellation_wins_over_waiting() {
        let token = CancellationToken::new();
        token.cancel();
        let outcome = wait_until(|| Ok(false), LockTimeout::Infinite, &token).unwrap();
        assert_eq!(outcome, WaitOutcome::Cancelled);
    }

    #[test]
    fn probe_errors_propagate() {
        let result = wait_until(
            || Err(io::Error::other("bad descriptor")),
            LockTimeout::Infinite,
            &CancellationToken::new(),
        );
        assert!(result.is_err());
    }
}
