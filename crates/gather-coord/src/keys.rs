//! Key namespace of the coordination store.
//!
//! | key | value | ttl |
//! |---|---|---|
//! | `lease:{credential_id}:{task_id}` | provider tag | lease ttl |
//! | `quota:{credential_id}:daily\|monthly` | counter | until window boundary |
//! | `cooldown:{credential_id}` | error count | backoff |
//! | `ratelimit:{arena}:{provider}:{suffix}:{minute\|hour\|day}` | sorted set | window + buffer |

use std::fmt;
use std::time::Duration;

pub fn lease(credential_id: &str, task_id: &str) -> String {
    format!("lease:{credential_id}:{task_id}")
}

/// Prefix matching every lease of one credential.
pub fn lease_prefix(credential_id: &str) -> String {
    format!("lease:{credential_id}:")
}

pub fn quota(credential_id: &str, window: QuotaWindow) -> String {
    format!("quota:{credential_id}:{window}")
}

pub fn cooldown(credential_id: &str) -> String {
    format!("cooldown:{credential_id}")
}

pub fn rate_window(arena: &str, provider: &str, suffix: &str, window: RateWindow) -> String {
    format!("ratelimit:{arena}:{provider}:{suffix}:{window}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuotaWindow {
    Daily,
    Monthly,
}

impl QuotaWindow {
    pub const ALL: [QuotaWindow; 2] = [QuotaWindow::Daily, QuotaWindow::Monthly];

    pub fn as_str(self) -> &'static str {
        match self {
            QuotaWindow::Daily => "daily",
            QuotaWindow::Monthly => "monthly",
        }
    }
}

impl fmt::Display for QuotaWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateWindow {
    Minute,
    Hour,
    Day,
}

impl RateWindow {
    pub const ALL: [RateWindow; 3] = [RateWindow::Minute, RateWindow::Hour, RateWindow::Day];

    pub fn as_str(self) -> &'static str {
        match self {
            RateWindow::Minute => "minute",
            RateWindow::Hour => "hour",
            RateWindow::Day => "day",
        }
    }

    pub fn duration(self) -> Duration {
        match self {
            RateWindow::Minute => Duration::from_secs(60),
            RateWindow::Hour => Duration::from_secs(3_600),
            RateWindow::Day => Duration::from_secs(86_400),
        }
    }
}

impl fmt::Display for RateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_namespace() {
        assert_eq!(lease("c1", "t1"), "lease:c1:t1");
        assert!(lease("c1", "t1").starts_with(&lease_prefix("c1")));
        assert_eq!(quota("c1", QuotaWindow::Daily), "quota:c1:daily");
        assert_eq!(quota("c1", QuotaWindow::Monthly), "quota:c1:monthly");
        assert_eq!(cooldown("c1"), "cooldown:c1");
        assert_eq!(
            rate_window("social_media", "reddit", "default", RateWindow::Hour),
            "ratelimit:social_media:reddit:default:hour"
        );
    }

    #[test]
    fn lease_prefix_does_not_match_longer_ids() {
        assert!(!lease("c10", "t").starts_with(&lease_prefix("c1")));
    }
}
