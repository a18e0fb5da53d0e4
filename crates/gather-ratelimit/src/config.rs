use std::collections::HashMap;

use gather_coord::RateWindow;
use serde::{Deserialize, Serialize};

pub const GLOBAL_DEFAULT_PER_MINUTE: u32 = 60;

/// Effective limits for one `(arena, provider, suffix)` scope.
///
/// `burst_size` is headroom on top of the steady per-minute rate; the minute
/// window admits `requests_per_minute + burst_size` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    #[serde(default)]
    pub burst_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_per_hour: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_per_day: Option<u32>,
}

impl RateLimitConfig {
    pub const fn per_minute(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
            burst_size: 0,
            requests_per_hour: None,
            requests_per_day: None,
        }
    }

    pub const fn with_burst(mut self, burst_size: u32) -> Self {
        self.burst_size = burst_size;
        self
    }

    pub const fn with_hourly(mut self, requests_per_hour: u32) -> Self {
        self.requests_per_hour = Some(requests_per_hour);
        self
    }

    pub const fn with_daily(mut self, requests_per_day: u32) -> Self {
        self.requests_per_day = Some(requests_per_day);
        self
    }

    /// Configured windows, shortest first, with their capacities.
    pub fn windows(&self) -> Vec<(RateWindow, u64)> {
        let mut windows = vec![(
            RateWindow::Minute,
            u64::from(self.requests_per_minute) + u64::from(self.burst_size),
        )];
        if let Some(hourly) = self.requests_per_hour {
            windows.push((RateWindow::Hour, u64::from(hourly)));
        }
        if let Some(daily) = self.requests_per_day {
            windows.push((RateWindow::Day, u64::from(daily)));
        }
        windows
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::per_minute(GLOBAL_DEFAULT_PER_MINUTE)
    }
}

/// Per-provider default limits plus the global fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderLimits {
    #[serde(default)]
    pub default: RateLimitConfig,
    #[serde(default)]
    pub providers: HashMap<String, RateLimitConfig>,
}

impl ProviderLimits {
    pub fn new(default: RateLimitConfig) -> Self {
        Self {
            default,
            providers: HashMap::new(),
        }
    }

    pub fn with(mut self, provider: impl Into<String>, config: RateLimitConfig) -> Self {
        self.providers.insert(provider.into(), config);
        self
    }

    /// Caller config wins, then the provider's default, then the global default.
    pub fn resolve(&self, provider: &str, explicit: Option<&RateLimitConfig>) -> RateLimitConfig {
        if let Some(config) = explicit {
            return *config;
        }
        self.providers
            .get(provider)
            .copied()
            .unwrap_or(self.default)
    }

    /// Published limits of the platforms the collectors talk to.
    pub fn builtin() -> Self {
        Self::new(RateLimitConfig::default())
            .with("reddit", RateLimitConfig::per_minute(100).with_burst(10))
            .with(
                "youtube",
                RateLimitConfig::per_minute(60).with_daily(10_000),
            )
            .with(
                "x_twitter",
                RateLimitConfig::per_minute(15).with_hourly(300),
            )
            .with(
                "bluesky",
                RateLimitConfig::per_minute(300).with_hourly(5_000),
            )
            .with("mastodon", RateLimitConfig::per_minute(60).with_burst(15))
            .with("telegram", RateLimitConfig::per_minute(20))
            .with("tiktok", RateLimitConfig::per_minute(30).with_daily(1_000))
            .with(
                "google_search",
                RateLimitConfig::per_minute(100).with_daily(10_000),
            )
            .with("gdelt", RateLimitConfig::per_minute(60))
            .with("rss", RateLimitConfig::per_minute(120).with_burst(30))
            .with(
                "event_registry",
                RateLimitConfig::per_minute(30).with_daily(2_000),
            )
            .with("facebook", RateLimitConfig::per_minute(10).with_hourly(200))
            .with("instagram", RateLimitConfig::per_minute(10).with_hourly(200))
            .with("threads", RateLimitConfig::per_minute(10).with_hourly(250))
            .with("wikipedia", RateLimitConfig::per_minute(200))
    }
}

impl Default for ProviderLimits {
    fn default() -> Self {
        Self::builtin()
    }
}
