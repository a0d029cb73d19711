//! Error types for swing screening operations

use thiserror::Error;

/// Errors raised by the screening library
#[derive(Debug, Error)]
pub enum StockError {
    /// Invalid stock symbol provided
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Data not available for the requested symbol
    #[error("Data not available for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// Not enough price bars to compute the indicator set
    #[error("Insufficient data: need {needed} bars, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Network or HTTP error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Yahoo Finance API error
    #[error("Yahoo Finance error: {0}")]
    YahooFinanceError(String),

    /// Technical indicator calculation error
    #[error("Technical indicator error: {0}")]
    IndicatorError(String),

    /// RSS/Atom feed could not be parsed
    #[error("Feed error: {0}")]
    FeedError(#[from] feed_rs::parser::ParseFeedError),

    /// Web search backend failure
    #[error("Search error: {0}")]
    SearchError(String),

    /// LLM provider failure
    #[error("LLM error: {0}")]
    LlmError(#[from] swing_llm::LLMError),

    /// Prompt template error
    #[error("Template error: {0}")]
    TemplateError(#[from] minijinja::Error),

    /// Learning database error
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Filesystem error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Record already exists
    #[error("Already recorded: {0}")]
    Duplicate(String),
}

/// Result type alias for stock operations
pub type Result<T> = std::result::Result<T, StockError>;

impl From<ta::errors::TaError> for StockError {
    fn from(err: ta::errors::TaError) -> Self {
        StockError::IndicatorError(format!("{err:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StockError::InvalidSymbol("???".to_string());
        assert_eq!(err.to_string(), "Invalid symbol: ???");

        let err = StockError::DataUnavailable {
            symbol: "TCS.NS".to_string(),
            reason: "No data found".to_string(),
        };
        assert_eq!(err.to_string(), "Data not available for TCS.NS: No data found");

        let err = StockError::InsufficientData { needed: 30, got: 12 };
        assert_eq!(err.to_string(), "Insufficient data: need 30 bars, got 12");
    }

    #[test]
    fn test_llm_error_conversion() {
        let err: StockError = swing_llm::LLMError::Timeout(5).into();
        assert!(matches!(err, StockError::LlmError(_)));
        assert!(err.to_string().contains("Timed out after 5s"));
    }
}
