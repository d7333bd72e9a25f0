//! Error taxonomy shared by the gateway and the strategy engines.

use thiserror::Error;

/// Errors raised while talking to the simulator or interpreting its data.
#[derive(Debug, Error)]
pub enum TradingError {
    /// Non-2xx status, connection failure or undecodable body.
    #[error("request to {endpoint} failed: {reason}")]
    Transient { endpoint: String, reason: String },

    /// The simulator answered but the data needed is not there
    /// (empty book, unknown ticker, no limits row).
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    /// A headline did not match the expected keyword/number pattern.
    #[error("failed to parse: {0}")]
    Parse(String),

    /// A multi-leg submission failed after some legs were filled.
    /// Filled legs have already been offset when this is returned.
    #[error("multi-leg execution failed after {completed}/{total} legs: {source}")]
    PartialExecution {
        completed: usize,
        total: usize,
        #[source]
        source: Box<TradingError>,
    },
}

impl TradingError {
    pub fn transient(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        TradingError::Transient {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    /// Short label used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TradingError::Transient { .. } => "transient",
            TradingError::DataUnavailable(_) => "data_unavailable",
            TradingError::Parse(_) => "parse",
            TradingError::PartialExecution { .. } => "partial_execution",
        }
    }
}

pub type Result<T> = std::result::Result<T, TradingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_execution_message_includes_cause() {
        let err = TradingError::PartialExecution {
            completed: 1,
            total: 3,
            source: Box::new(TradingError::transient("/orders", "HTTP 500")),
        };
        let msg = err.to_string();
        assert!(msg.contains("1/3"));
        assert!(msg.contains("/orders"));
        assert_eq!(err.kind(), "partial_execution");
    }
}
