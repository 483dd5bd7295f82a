use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use validator::Validate;

use crate::config_validator::ConfigValidator;
use crate::error::Result;

/// Process configuration. Read once at startup from flags or the environment.
#[derive(Parser, Debug, Clone, Validate)]
#[command(name = "textgate")]
#[command(about = "Rate limit and daily free-tier gate in front of a text-generation API")]
pub struct Config {
    /// Server bind address
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:8000")]
    pub bind_addr: SocketAddr,

    /// Default log level when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Requests allowed per client inside one sliding window
    #[arg(long, env = "GATE_MAX_REQUESTS", default_value_t = 10)]
    #[validate(range(min = 1))]
    pub max_requests: u32,

    /// Sliding window length in seconds
    #[arg(long, env = "GATE_WINDOW_SECS", default_value_t = 600)]
    #[validate(range(min = 1, max = 86_400))]
    pub window_secs: u64,

    /// Free-tier requests per client per calendar day
    #[arg(long = "daily-limit", env = "GATE_FREE_TIER_DAILY_LIMIT", default_value_t = 5)]
    #[validate(range(min = 1))]
    pub free_tier_daily_limit: u32,

    /// Minimum spacing between accepted requests in milliseconds (0 disables)
    #[arg(long, env = "GATE_MIN_INTERVAL_MS", default_value_t = 0)]
    pub min_interval_ms: u64,

    /// How often expired entries are evicted, in seconds (0 disables)
    #[arg(long, env = "GATE_SWEEP_INTERVAL_SECS", default_value_t = 300)]
    pub sweep_interval_secs: u64,

    /// Header carrying the caller's own provider key
    #[arg(long, env = "GATE_CREDENTIAL_HEADER", default_value = "x-openai-key")]
    #[validate(length(min = 1))]
    pub credential_header: String,

    /// Derive the client key from X-Forwarded-For / X-Real-IP
    #[arg(
        long,
        env = "GATE_TRUST_PROXY_HEADERS",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub trust_proxy_headers: bool,
}

impl Config {
    /// Parse flags and environment, then validate.
    pub fn load() -> Result<Self> {
        let config = Config::parse();
        config.validate_all()?;
        Ok(config)
    }

    /// Field ranges first, then the rules that span fields.
    pub fn validate_all(&self) -> Result<()> {
        self.validate()?;
        ConfigValidator::validate_credential_header(&self.credential_header)?;
        ConfigValidator::validate_limits(&self.limits())?;
        Ok(())
    }

    pub fn limits(&self) -> Limits {
        Limits {
            max_requests: self.max_requests,
            window: Duration::from_secs(self.window_secs),
            daily_limit: self.free_tier_daily_limit,
            min_interval: Duration::from_millis(self.min_interval_ms),
        }
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}

/// Tunables of the admission path, fixed for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub max_requests: u32,
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    pub daily_limit: u32,
    #[serde(with = "humantime_serde", default)]
    pub min_interval: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(600),
            daily_limit: 5,
            min_interval: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::parse_from(["textgate"]);
        assert_eq!(config.limits(), Limits::default());
        assert_eq!(config.credential_header, "x-openai-key");
        assert!(config.trust_proxy_headers);
        assert_eq!(config.sweep_interval(), Some(Duration::from_secs(300)));
        assert!(config.validate_all().is_ok());
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = Config::parse_from([
            "textgate",
            "--max-requests",
            "30",
            "--window-secs",
            "60",
            "--daily-limit",
            "7",
            "--min-interval-ms",
            "1000",
            "--sweep-interval-secs",
            "0",
            "--trust-proxy-headers",
            "false",
        ]);
        let limits = config.limits();
        assert_eq!(limits.max_requests, 30);
        assert_eq!(limits.window, Duration::from_secs(60));
        assert_eq!(limits.daily_limit, 7);
        assert_eq!(limits.min_interval, Duration::from_secs(1));
        assert_eq!(config.sweep_interval(), None);
        assert!(!config.trust_proxy_headers);
    }

    #[test]
    fn test_zero_limits_rejected() {
        let config = Config::parse_from(["textgate", "--max-requests", "0"]);
        assert!(config.validate_all().is_err());

        let config = Config::parse_from(["textgate", "--daily-limit", "0"]);
        assert!(config.validate_all().is_err());
    }

    #[test]
    fn test_min_interval_must_fit_window() {
        let config = Config::parse_from([
            "textgate",
            "--window-secs",
            "10",
            "--min-interval-ms",
            "10000",
        ]);
        assert!(config.validate_all().is_err());
    }

    #[test]
    fn test_limits_humantime_serde() {
        let json = serde_json::to_value(Limits::default()).unwrap();
        assert_eq!(json["window"], "10m");
        assert_eq!(json["max_requests"], 10);

        let parsed: Limits = serde_json::from_str(
            r#"{"max_requests": 3, "window": "1m 30s", "daily_limit": 2}"#,
        )
        .unwrap();
        assert_eq!(parsed.window, Duration::from_secs(90));
        assert_eq!(parsed.min_interval, Duration::ZERO);
    }
}
