//! Candle samples, bucket intervals and subscription keys.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::ChartdeskError;

/// Bucket start, unix seconds.
pub type Timestamp = i64;

/// One OHLC sample for a fixed time bucket.
///
/// `buy_price` is the offer quote the live feed attaches to the most recent
/// bucket; history rows normally carry none.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub time: Timestamp,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy_price: Option<f64>,
}

impl Candle {
    pub fn usable_close(&self) -> Option<f64> {
        self.close.is_finite().then_some(self.close)
    }

    pub fn usable_buy_price(&self) -> Option<f64> {
        self.buy_price.filter(|p| p.is_finite())
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Timestamp, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTime {
        Int(i64),
        Float(f64),
        Text(String),
    }

    match RawTime::deserialize(deserializer)? {
        RawTime::Int(t) => Ok(t),
        RawTime::Float(t) if t.is_finite() && t.fract() == 0.0 => Ok(t as i64),
        RawTime::Float(t) => Err(D::Error::custom(format!("non-integral timestamp {t}"))),
        RawTime::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("unparseable timestamp {s:?}"))),
    }
}

/// A single live-feed payload: either a candle or the backend's error envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum FeedMessage {
    Candle(Candle),
    Error { error: String },
}

/// Parse one tick payload. The backend reports failures in-band as
/// `{"error": "..."}`; those come back as `Parse` errors like any other
/// malformed message.
pub fn parse_tick(payload: &str) -> Result<Candle, ChartdeskError> {
    match serde_json::from_str::<FeedMessage>(payload) {
        Ok(FeedMessage::Candle(candle)) => Ok(candle),
        Ok(FeedMessage::Error { error }) => {
            Err(ChartdeskError::parse(format!("feed reported: {error}")))
        }
        Err(_) => Err(ChartdeskError::parse(format!(
            "not a candle: {}",
            truncate(payload, 120)
        ))),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    FourHours,
    OneDay,
    OneWeek,
    OneMonth,
}

impl Interval {
    pub const ALL: [Interval; 9] = [
        Interval::OneMinute,
        Interval::FiveMinutes,
        Interval::FifteenMinutes,
        Interval::ThirtyMinutes,
        Interval::OneHour,
        Interval::FourHours,
        Interval::OneDay,
        Interval::OneWeek,
        Interval::OneMonth,
    ];

    /// Wire spelling used in query strings.
    pub fn as_str(self) -> &'static str {
        match self {
            Interval::OneMinute => "1m",
            Interval::FiveMinutes => "5m",
            Interval::FifteenMinutes => "15m",
            Interval::ThirtyMinutes => "30m",
            Interval::OneHour => "1h",
            Interval::FourHours => "4h",
            Interval::OneDay => "1d",
            Interval::OneWeek => "1wk",
            Interval::OneMonth => "1mo",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = ChartdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Interval::ALL
            .into_iter()
            .find(|iv| iv.as_str() == wanted)
            .ok_or_else(|| ChartdeskError::InvalidInterval {
                value: s.to_string(),
            })
    }
}

/// The `(instrument, interval)` pair a series and its live feed belong to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    ticker: String,
    interval: Interval,
}

impl SubscriptionKey {
    /// Tickers are trimmed and upper-cased; anything beyond letters, digits
    /// and `. - ^ =` is rejected.
    pub fn new(ticker: &str, interval: Interval) -> Result<Self, ChartdeskError> {
        let normalized = ticker.trim().to_uppercase();
        let valid = !normalized.is_empty()
            && normalized
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='));
        if !valid {
            return Err(ChartdeskError::InvalidTicker {
                ticker: ticker.to_string(),
            });
        }
        Ok(SubscriptionKey {
            ticker: normalized,
            interval,
        })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn with_interval(&self, interval: Interval) -> Self {
        SubscriptionKey {
            ticker: self.ticker.clone(),
            interval,
        }
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.ticker, self.interval)
    }
}
