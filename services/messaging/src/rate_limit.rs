//! Client-local send-rate limiting
//!
//! Fixed window per (match, device): up to `max_messages` sends inside
//! `window_nanos`, reset automatically once the window elapses. The check
//! runs before any store round-trip. Counters live only on the sending
//! client, so a hostile client can bypass them; server-side enforcement is
//! explicitly out of scope.

use dashmap::DashMap;
use types::errors::ExchangeError;
use types::ids::{DeviceId, MatchId};

/// Default cap: 10 messages per trailing 60 seconds
pub const DEFAULT_MAX_MESSAGES: u32 = 10;
pub const DEFAULT_WINDOW_NANOS: i64 = 60 * 1_000_000_000;

/// Rate-limit window parameters
#[derive(Debug, Clone)]
pub struct QuotaConfig {
    pub max_messages: u32,
    pub window_nanos: i64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_MAX_MESSAGES,
            window_nanos: DEFAULT_WINDOW_NANOS,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    window_start: i64,
}

/// Per-(match, device) fixed-window send quota
pub struct SendQuota {
    config: QuotaConfig,
    windows: DashMap<(MatchId, DeviceId), Window>,
}

impl SendQuota {
    pub fn new(config: QuotaConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    /// Consume one send slot, or fail with `RateLimited`.
    ///
    /// The window resets when `now` has moved past its end; a successful
    /// check counts against the quota immediately.
    pub fn check(&self, match_id: MatchId, device: DeviceId, now: i64) -> Result<(), ExchangeError> {
        let mut window = self.windows.entry((match_id, device)).or_insert(Window {
            count: 0,
            window_start: now,
        });

        if now - window.window_start >= self.config.window_nanos {
            window.count = 0;
            window.window_start = now;
        }

        if window.count < self.config.max_messages {
            window.count += 1;
            Ok(())
        } else {
            Err(ExchangeError::RateLimited {
                retry_after_nanos: window.window_start + self.config.window_nanos - now,
            })
        }
    }

    /// Sends left in the current window without consuming one.
    pub fn remaining(&self, match_id: MatchId, device: DeviceId, now: i64) -> u32 {
        match self.windows.get(&(match_id, device)) {
            Some(window) if now - window.window_start < self.config.window_nanos => {
                self.config.max_messages.saturating_sub(window.count)
            }
            _ => self.config.max_messages,
        }
    }
}

impl Default for SendQuota {
    fn default() -> Self {
        Self::new(QuotaConfig::default())
    }
}
