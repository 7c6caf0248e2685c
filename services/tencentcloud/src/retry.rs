// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Retry policy for dispatching API calls.
//!
//! A logical call owns one [`RetryState`]. After every failed attempt the
//! [`RetryPolicy`] looks at the error kind and decides whether another attempt
//! is allowed, charging the matching budget:
//!
//! - [`ErrorKind::Network`] uses the network failure budget, and only when the
//!   request is idempotent.
//! - [`ErrorKind::Throttled`] uses the rate limit budget. The server rejected the
//!   call before running it, so it's always safe to resend.
//! - Everything else is fatal.

use std::time::Duration;

use rand::Rng;
use tcapi_core::{Error, ErrorKind};

use crate::Profile;

/// Exponential backoff with an upper bound and optional jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    jitter: bool,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(32),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Create a backoff with default settings: 1s, doubled up to 32s, with jitter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Backoff that always waits for the same duration.
    pub fn constant(delay: Duration) -> Self {
        Self {
            initial: delay,
            max: delay,
            jitter: false,
        }
    }

    /// Backoff that never waits.
    pub fn zero() -> Self {
        Self::constant(Duration::ZERO)
    }

    /// Set the delay before the first retry.
    pub fn with_initial(mut self, initial: Duration) -> Self {
        self.initial = initial;
        self
    }

    /// Set the upper bound of the computed delay before jitter.
    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = max;
        self
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before the retry numbered `retry`, starting from 0.
    pub fn delay(&self, retry: u32) -> Duration {
        let initial_ms = self.initial.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;

        let base_ms = initial_ms.saturating_mul(2u64.saturating_pow(retry));
        let capped_ms = base_ms.min(max_ms);

        let final_ms = if self.jitter && capped_ms > 0 {
            // Up to 25% jitter.
            let jitter = rand::thread_rng().gen_range(0..=capped_ms / 4);
            capped_ms.saturating_add(jitter)
        } else {
            capped_ms
        };

        Duration::from_millis(final_ms)
    }
}

/// Progress of one logical call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// Attempt counter, starts from 0.
    pub attempt: u32,
    /// Remaining retries for network failures.
    pub network_failure_retries_left: u32,
    /// Remaining retries for throttled calls.
    pub rate_limit_retries_left: u32,
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for `delay` and rebuild the request.
    Retry {
        /// Time to wait before the next attempt.
        delay: Duration,
    },
    /// The error is retryable but its budget is used up.
    Exhausted,
    /// The error must be returned to the caller immediately.
    Fatal,
}

/// Budgets and backoff curves for one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    network_failure_max_retries: u32,
    network_failure_backoff: Backoff,
    rate_limit_max_retries: u32,
    rate_limit_backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            network_failure_max_retries: 0,
            network_failure_backoff: Backoff::default(),
            rate_limit_max_retries: 0,
            rate_limit_backoff: Backoff::default(),
        }
    }
}

impl RetryPolicy {
    /// Build the policy described by a profile.
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            network_failure_max_retries: profile.network_failure_max_retries,
            network_failure_backoff: profile.network_failure_backoff,
            rate_limit_max_retries: profile.rate_limit_max_retries,
            rate_limit_backoff: profile.rate_limit_backoff,
        }
    }

    /// Set the network failure budget and its backoff.
    pub fn with_network_failure(mut self, max_retries: u32, backoff: Backoff) -> Self {
        self.network_failure_max_retries = max_retries;
        self.network_failure_backoff = backoff;
        self
    }

    /// Set the rate limit budget and its backoff.
    pub fn with_rate_limit(mut self, max_retries: u32, backoff: Backoff) -> Self {
        self.rate_limit_max_retries = max_retries;
        self.rate_limit_backoff = backoff;
        self
    }

    /// Returns true if any retry budget is configured.
    ///
    /// Idempotent requests get a client token in that case.
    pub fn is_enabled(&self) -> bool {
        self.network_failure_max_retries > 0 || self.rate_limit_max_retries > 0
    }

    /// Fresh state for a new logical call.
    pub fn start(&self) -> RetryState {
        RetryState {
            attempt: 0,
            network_failure_retries_left: self.network_failure_max_retries,
            rate_limit_retries_left: self.rate_limit_max_retries,
        }
    }

    /// Decide what to do with the error of the current attempt.
    ///
    /// On [`RetryDecision::Retry`] the matching budget has been charged and the
    /// attempt counter advanced.
    pub fn decide(&self, state: &mut RetryState, err: &Error, idempotent: bool) -> RetryDecision {
        match err.kind() {
            ErrorKind::Network if idempotent => {
                if state.network_failure_retries_left == 0 {
                    return RetryDecision::Exhausted;
                }
                let retry = self.network_failure_max_retries - state.network_failure_retries_left;
                state.network_failure_retries_left -= 1;
                state.attempt += 1;
                RetryDecision::Retry {
                    delay: self.network_failure_backoff.delay(retry),
                }
            }
            ErrorKind::Throttled => {
                if state.rate_limit_retries_left == 0 {
                    return RetryDecision::Exhausted;
                }
                let retry = self.rate_limit_max_retries - state.rate_limit_retries_left;
                state.rate_limit_retries_left -= 1;
                state.attempt += 1;
                RetryDecision::Retry {
                    delay: self.rate_limit_backoff.delay(retry),
                }
            }
            _ => RetryDecision::Fatal,
        }
    }
}

/// Generate an idempotency token for a logical call.
pub(crate) fn new_client_token() -> String {
    let mut rng = rand::thread_rng();
    let bs: [u8; 16] = rng.gen();
    bs.iter().map(|b| format!("{b:02x}")).collect()
}
