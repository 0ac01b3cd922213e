//! Feed and API settings, resolved and validated from configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::domain::error::ChartdeskError;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api";
pub const DEFAULT_WS_BASE: &str = "ws://localhost:8000/api";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1400);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_LOG_FILTER: &str = "info";

/// How live updates are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedMode {
    #[default]
    Polling,
    Push,
}

impl fmt::Display for FeedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FeedMode::Polling => "poll",
            FeedMode::Push => "push",
        })
    }
}

impl FromStr for FeedMode {
    type Err = ChartdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "poll" | "polling" => Ok(FeedMode::Polling),
            "push" | "ws" | "websocket" => Ok(FeedMode::Push),
            _ => Err(ChartdeskError::InvalidMode {
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    pub api_base: Url,
    pub ws_base: Url,
    pub mode: FeedMode,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub log_filter: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            api_base: Url::parse(DEFAULT_API_BASE).expect("default api base is a valid url"),
            ws_base: Url::parse(DEFAULT_WS_BASE).expect("default ws base is a valid url"),
            mode: FeedMode::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// Every key is optional; present keys must be valid.
pub fn build_feed_config(config: &dyn ConfigPort) -> Result<FeedConfig, ChartdeskError> {
    let defaults = FeedConfig::default();

    let api_base = match config.get_string("api", "base_url") {
        Some(raw) => parse_base_url(&raw, "api", "base_url", &["http", "https"])?,
        None => defaults.api_base,
    };
    let ws_base = match config.get_string("api", "ws_url") {
        Some(raw) => parse_base_url(&raw, "api", "ws_url", &["ws", "wss"])?,
        None => defaults.ws_base,
    };
    let mode = match config.get_string("feed", "mode") {
        Some(raw) => raw.parse().map_err(|_| ChartdeskError::ConfigInvalid {
            section: "feed".to_string(),
            key: "mode".to_string(),
            reason: format!("unknown mode {raw:?}, expected poll or push"),
        })?,
        None => defaults.mode,
    };
    let poll_interval = parse_millis(config, "feed", "poll_interval_ms", defaults.poll_interval)?;
    let request_timeout =
        parse_millis(config, "api", "request_timeout_ms", defaults.request_timeout)?;
    let log_filter = config
        .get_string("log", "filter")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(defaults.log_filter);

    Ok(FeedConfig {
        api_base,
        ws_base,
        mode,
        poll_interval,
        request_timeout,
        log_filter,
    })
}

fn parse_base_url(
    raw: &str,
    section: &str,
    key: &str,
    schemes: &[&str],
) -> Result<Url, ChartdeskError> {
    let invalid = |reason: String| ChartdeskError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    };
    let url = Url::parse(raw.trim()).map_err(|e| invalid(format!("{e}")))?;
    if !schemes.contains(&url.scheme()) {
        return Err(invalid(format!(
            "scheme {} not one of {}",
            url.scheme(),
            schemes.join(", ")
        )));
    }
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(invalid("url has no host".to_string()));
    }
    Ok(url)
}

fn parse_millis(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: Duration,
) -> Result<Duration, ChartdeskError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(ChartdeskError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("{key} must be a positive number of milliseconds"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MockConfig {
        values: HashMap<(String, String), String>,
    }

    impl MockConfig {
        fn new(entries: &[(&str, &str, &str)]) -> Self {
            let values = entries
                .iter()
                .map(|(s, k, v)| ((s.to_string(), k.to_string()), v.to_string()))
                .collect();
            MockConfig { values }
        }
    }

    impl ConfigPort for MockConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.values
                .get(&(section.to_string(), key.to_string()))
                .cloned()
        }
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = build_feed_config(&MockConfig::new(&[])).unwrap();
        assert_eq!(config, FeedConfig::default());
        assert_eq!(config.poll_interval, Duration::from_millis(1400));
        assert_eq!(config.mode, FeedMode::Polling);
    }

    #[test]
    fn reads_all_keys() {
        let config = build_feed_config(&MockConfig::new(&[
            ("api", "base_url", "https://example.test/api"),
            ("api", "ws_url", "wss://example.test/api"),
            ("api", "request_timeout_ms", "2500"),
            ("feed", "mode", "push"),
            ("feed", "poll_interval_ms", "500"),
            ("log", "filter", "chartdesk=debug"),
        ]))
        .unwrap();
        assert_eq!(config.api_base.as_str(), "https://example.test/api");
        assert_eq!(config.ws_base.scheme(), "wss");
        assert_eq!(config.request_timeout, Duration::from_millis(2500));
        assert_eq!(config.mode, FeedMode::Push);
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.log_filter, "chartdesk=debug");
    }

    #[test]
    fn rejects_wrong_scheme() {
        let err = build_feed_config(&MockConfig::new(&[(
            "api",
            "ws_url",
            "http://example.test/api",
        )]))
        .unwrap_err();
        assert!(matches!(
            err,
            ChartdeskError::ConfigInvalid { ref key, .. } if key == "ws_url"
        ));
    }

    #[test]
    fn rejects_unparseable_url() {
        let err =
            build_feed_config(&MockConfig::new(&[("api", "base_url", "not a url")])).unwrap_err();
        assert!(matches!(err, ChartdeskError::ConfigInvalid { .. }));
    }

    #[test]
    fn rejects_zero_and_garbage_intervals() {
        for raw in ["0", "-5", "fast"] {
            let err = build_feed_config(&MockConfig::new(&[("feed", "poll_interval_ms", raw)]))
                .unwrap_err();
            assert!(matches!(
                err,
                ChartdeskError::ConfigInvalid { ref key, .. } if key == "poll_interval_ms"
            ));
        }
    }

    #[test]
    fn millis_use_the_validated_value() {
        let config = build_feed_config(&MockConfig::new(&[
            ("feed", "poll_interval_ms", " 750 "),
            ("api", "request_timeout_ms", "18446744073709551615"),
        ]))
        .unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(750));
        assert_eq!(config.request_timeout, Duration::from_millis(u64::MAX));
    }

    #[test]
    fn rejects_unknown_mode() {
        let err =
            build_feed_config(&MockConfig::new(&[("feed", "mode", "carrier-pigeon")])).unwrap_err();
        assert!(matches!(
            err,
            ChartdeskError::ConfigInvalid { ref key, .. } if key == "mode"
        ));
    }

    #[test]
    fn mode_spellings() {
        assert_eq!("Polling".parse::<FeedMode>().unwrap(), FeedMode::Polling);
        assert_eq!("ws".parse::<FeedMode>().unwrap(), FeedMode::Push);
        assert_eq!(FeedMode::Push.to_string(), "push");
    }
}
