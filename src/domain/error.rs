//! Domain error types.

use super::trade::{Action, TradeId};

/// Top-level error type for chartdesk.
///
/// Nothing here is fatal to a running session: feed errors degrade to "the
/// series did not change this cycle", trade errors leave the ledger as it was.
#[derive(Debug, thiserror::Error)]
pub enum ChartdeskError {
    #[error("transport error: {reason}")]
    Transport { reason: String },

    #[error("malformed payload: {reason}")]
    Parse { reason: String },

    #[error("invalid {action} price: latest candle has no usable number for that side")]
    InvalidPrice { action: Action },

    #[error("trade request failed: {reason}")]
    TradeApi { reason: String },

    #[error("unknown trade #{id}")]
    UnknownTrade { id: TradeId },

    #[error("no active subscription")]
    NotSubscribed,

    #[error("invalid ticker symbol {ticker:?}")]
    InvalidTicker { ticker: String },

    #[error("unsupported interval {value:?}")]
    InvalidInterval { value: String },

    #[error("unknown feed mode {value:?} (expected poll or push)")]
    InvalidMode { value: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ChartdeskError {
    pub fn transport(reason: impl Into<String>) -> Self {
        ChartdeskError::Transport {
            reason: reason.into(),
        }
    }

    pub fn parse(reason: impl Into<String>) -> Self {
        ChartdeskError::Parse {
            reason: reason.into(),
        }
    }

    pub fn trade_api(reason: impl Into<String>) -> Self {
        ChartdeskError::TradeApi {
            reason: reason.into(),
        }
    }
}

impl From<&ChartdeskError> for std::process::ExitCode {
    fn from(err: &ChartdeskError) -> Self {
        let code: u8 = match err {
            ChartdeskError::Io(_) => 1,
            ChartdeskError::ConfigParse { .. } | ChartdeskError::ConfigInvalid { .. } => 2,
            ChartdeskError::Transport { .. } | ChartdeskError::Parse { .. } => 3,
            ChartdeskError::InvalidPrice { .. }
            | ChartdeskError::TradeApi { .. }
            | ChartdeskError::UnknownTrade { .. } => 4,
            ChartdeskError::NotSubscribed
            | ChartdeskError::InvalidTicker { .. }
            | ChartdeskError::InvalidInterval { .. }
            | ChartdeskError::InvalidMode { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
