// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hub configuration.
//!
//! Every knob has a documented default, so `HubConfig::default()` is a
//! working configuration. Embedders that keep their settings in a file can
//! deserialize the same structure with `serde_json`; missing keys fall back
//! to the defaults.
//!
//! # Examples
//!
//! ```
//! use homehub_lib::config::{HubConfig, LeaseConfig};
//!
//! let config = HubConfig::default()
//!     .with_lease(LeaseConfig::default().with_requested_secs(600));
//! assert_eq!(config.lease().requested_secs(), 600);
//!
//! let loaded: HubConfig =
//!     serde_json::from_str(r#"{"lease": {"error_threshold": 5}}"#).unwrap();
//! assert_eq!(loaded.lease().error_threshold(), 5);
//! assert_eq!(loaded.lease().requested_secs(), 1800);
//! ```

use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration shared by every device of a hub.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    lease: LeaseConfig,
    poll: PollConfig,
}

impl HubConfig {
    /// Replaces the lease settings.
    #[must_use]
    pub fn with_lease(mut self, lease: LeaseConfig) -> Self {
        self.lease = lease;
        self
    }

    /// Replaces the polling settings.
    #[must_use]
    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Returns the lease settings.
    #[must_use]
    pub fn lease(&self) -> &LeaseConfig {
        &self.lease
    }

    /// Returns the polling settings.
    #[must_use]
    pub fn poll(&self) -> &PollConfig {
        &self.poll
    }
}

/// Event subscription lease timing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LeaseConfig {
    requested_secs: u64,
    min_renewal_secs: u64,
    retry_multiplier: u64,
    min_retry_secs: u64,
    error_threshold: u32,
}

impl LeaseConfig {
    /// Lease length asked of the device.
    pub const DEFAULT_REQUESTED_SECS: u64 = 1800;
    /// Floor of the renewal delay.
    pub const DEFAULT_MIN_RENEWAL_SECS: u64 = 10;
    /// Retry backoff as a multiple of the last known lease.
    pub const DEFAULT_RETRY_MULTIPLIER: u64 = 30;
    /// Floor of the retry backoff.
    pub const DEFAULT_MIN_RETRY_SECS: u64 = 10;
    /// Consecutive failures before the lease reports `Error`.
    pub const DEFAULT_ERROR_THRESHOLD: u32 = 3;

    /// Sets the lease length asked of the device.
    #[must_use]
    pub fn with_requested_secs(mut self, secs: u64) -> Self {
        self.requested_secs = secs;
        self
    }

    /// Sets the floor of the renewal delay.
    #[must_use]
    pub fn with_min_renewal_secs(mut self, secs: u64) -> Self {
        self.min_renewal_secs = secs;
        self
    }

    /// Sets the retry backoff multiplier.
    #[must_use]
    pub fn with_retry_multiplier(mut self, multiplier: u64) -> Self {
        self.retry_multiplier = multiplier;
        self
    }

    /// Sets the floor of the retry backoff.
    #[must_use]
    pub fn with_min_retry_secs(mut self, secs: u64) -> Self {
        self.min_retry_secs = secs;
        self
    }

    /// Sets how many consecutive failures mark the lease as failed.
    #[must_use]
    pub fn with_error_threshold(mut self, threshold: u32) -> Self {
        self.error_threshold = threshold;
        self
    }

    /// Returns the lease length asked of the device.
    #[must_use]
    pub fn requested_secs(&self) -> u64 {
        self.requested_secs
    }

    /// Returns the consecutive failure threshold.
    #[must_use]
    pub fn error_threshold(&self) -> u32 {
        self.error_threshold
    }

    /// Delay before renewing a lease of `lease_secs`: one second early,
    /// never sooner than the configured floor.
    ///
    /// ```
    /// use homehub_lib::config::LeaseConfig;
    /// use std::time::Duration;
    ///
    /// let config = LeaseConfig::default();
    /// assert_eq!(config.renewal_delay(120), Duration::from_secs(119));
    /// assert_eq!(config.renewal_delay(5), Duration::from_secs(10));
    /// ```
    #[must_use]
    pub fn renewal_delay(&self, lease_secs: u64) -> Duration {
        Duration::from_secs(lease_secs.saturating_sub(1).max(self.min_renewal_secs))
    }

    /// Delay before retrying a failed acquire, given the last known lease.
    #[must_use]
    pub fn retry_delay(&self, last_lease_secs: u64) -> Duration {
        Duration::from_secs(
            last_lease_secs
                .saturating_mul(self.retry_multiplier)
                .max(self.min_retry_secs),
        )
    }
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            requested_secs: Self::DEFAULT_REQUESTED_SECS,
            min_renewal_secs: Self::DEFAULT_MIN_RENEWAL_SECS,
            retry_multiplier: Self::DEFAULT_RETRY_MULTIPLIER,
            min_retry_secs: Self::DEFAULT_MIN_RETRY_SECS,
            error_threshold: Self::DEFAULT_ERROR_THRESHOLD,
        }
    }
}

/// Intervals of polling-based status retrieval.
///
/// Intervals are kept in milliseconds so they deserialize from plain
/// numbers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    idle_ms: u64,
    active_ms: u64,
}

impl PollConfig {
    /// Poll interval while the device is idle.
    pub const DEFAULT_IDLE: Duration = Duration::from_secs(5);
    /// Poll interval while the device is active.
    pub const DEFAULT_ACTIVE: Duration = Duration::from_millis(350);

    /// Sets the idle interval.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn with_idle(mut self, interval: Duration) -> Self {
        self.idle_ms = interval.as_millis() as u64;
        self
    }

    /// Sets the active interval.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn with_active(mut self, interval: Duration) -> Self {
        self.active_ms = interval.as_millis() as u64;
        self
    }

    /// Returns the idle interval.
    #[must_use]
    pub fn idle(&self) -> Duration {
        Duration::from_millis(self.idle_ms)
    }

    /// Returns the active interval.
    #[must_use]
    pub fn active(&self) -> Duration {
        Duration::from_millis(self.active_ms)
    }
}

impl Default for PollConfig {
    #[allow(clippy::cast_possible_truncation)]
    fn default() -> Self {
        Self {
            idle_ms: Self::DEFAULT_IDLE.as_millis() as u64,
            active_ms: Self::DEFAULT_ACTIVE.as_millis() as u64,
        }
    }
}
