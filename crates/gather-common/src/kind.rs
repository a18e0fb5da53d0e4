use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Classification of an outbound call failure, decided by the collector that
/// made the call. The pool never inspects provider responses itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RateLimit,
    AuthInvalid,
    Timeout,
    Upstream5xx,
    Unknown,
}

impl ErrorKind {
    /// Rate-limit and auth failures cool an environment credential down
    /// immediately instead of waiting for the breaker threshold.
    pub fn forces_cooldown(self) -> bool {
        matches!(self, ErrorKind::RateLimit | ErrorKind::AuthInvalid)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::AuthInvalid => "auth_invalid",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Upstream5xx => "upstream_5xx",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rate_limit" | "ratelimit" | "429" => Ok(ErrorKind::RateLimit),
            "auth_invalid" | "auth" | "401" | "403" => Ok(ErrorKind::AuthInvalid),
            "timeout" => Ok(ErrorKind::Timeout),
            "upstream_5xx" | "5xx" => Ok(ErrorKind::Upstream5xx),
            "unknown" => Ok(ErrorKind::Unknown),
            other => Err(format!("unknown error kind: {other}")),
        }
    }
}

/// Environment variable stem for a `(platform, tier)` pair:
/// `reddit` + `oauth2` -> `REDDIT_OAUTH2_API_KEY`.
pub fn env_key_prefix(platform: &str, tier: &str) -> String {
    format!("{}_{}_API_KEY", env_segment(platform), env_segment(tier))
}

fn env_segment(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() {
                ch.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
