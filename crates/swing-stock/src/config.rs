//! Configuration for the swing screener
//!
//! Loaded from `.swing.json` (camelCase keys) with environment overrides for
//! secrets and deployment paths.
//!
//! ```json
//! {
//!   "ai": { "providers": ["cli", "anthropic"], "cliCommand": "claude -p" },
//!   "news": { "maxAgeHours": 24 },
//!   "output": { "dir": "reports", "topN": 15 },
//!   "correction": { "boostThreshold": 65.0 }
//! }
//! ```

use crate::error::{Result, StockError};
use crate::market::HistoryRange;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Project-level config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = ".swing.json";

/// Upper bound for `network.maxRetries`
pub const MAX_RETRIES: u32 = 10;

/// Longest single wait between retries
pub const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(60);

/// `base * 2^attempt`, saturating and capped at [`MAX_RETRY_BACKOFF`]
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2_u32.saturating_pow(attempt)).min(MAX_RETRY_BACKOFF)
}

/// LLM backend kinds, in the order they may appear in `ai.providers`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    #[serde(rename = "openai")]
    OpenAI,
    Gemini,
    Cli,
}

/// AI scoring settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AiConfig {
    /// Disable to score news with the keyword heuristic only
    pub enabled: bool,
    /// Providers tried in order
    pub providers: Vec<ProviderKind>,
    pub anthropic_model: String,
    pub openai_model: String,
    pub gemini_model: String,
    /// Shell command for the CLI backend, e.g. `claude -p`
    pub cli_command: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: usize,
    /// Headlines sent per ticker
    pub max_articles: usize,
    #[serde(skip_serializing)]
    pub anthropic_api_key: Option<String>,
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,
    pub openai_api_base: Option<String>,
    #[serde(skip_serializing)]
    pub gemini_api_key: Option<String>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            providers: vec![
                ProviderKind::Anthropic,
                ProviderKind::OpenAI,
                ProviderKind::Gemini,
                ProviderKind::Cli,
            ],
            anthropic_model: "claude-sonnet-4-5".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            gemini_model: "gemini-2.0-flash".to_string(),
            cli_command: None,
            timeout_secs: 90,
            temperature: 0.2,
            max_tokens: 1024,
            max_articles: 8,
            anthropic_api_key: None,
            openai_api_key: None,
            openai_api_base: None,
            gemini_api_key: None,
        }
    }
}

/// News collection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewsConfig {
    pub feeds: Vec<String>,
    /// Also query Google News for every universe ticker
    pub google_news: bool,
    pub max_age_hours: i64,
    pub max_articles_per_ticker: usize,
    /// Download article bodies for the top headlines of each ticker
    pub fetch_bodies: bool,
    pub fetch_concurrency: usize,
    pub article_char_limit: usize,
    pub cache_dir: PathBuf,
    /// Per-host request budget
    pub requests_per_minute: u32,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            feeds: crate::news::DEFAULT_FEEDS.iter().map(|s| (*s).to_string()).collect(),
            google_news: false,
            max_age_hours: 48,
            max_articles_per_ticker: 5,
            fetch_bodies: true,
            fetch_concurrency: 4,
            article_char_limit: 4000,
            cache_dir: PathBuf::from(".swing-cache/articles"),
            requests_per_minute: 30,
        }
    }
}

/// Market data settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MarketConfig {
    pub history_range: HistoryRange,
    /// Index used for market context
    pub benchmark: String,
    /// Suffix appended to bare symbols
    pub default_suffix: String,
    /// Tickers analysed in parallel
    pub concurrency: usize,
    /// CSV listing the screened companies
    pub universe: PathBuf,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            history_range: HistoryRange::OneYear,
            benchmark: "^NSEI".to_string(),
            default_suffix: ".NS".to_string(),
            concurrency: 4,
            universe: PathBuf::from("data/universe.csv"),
        }
    }
}

/// Blend weights of the five correction sub-scores
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CorrectionWeights {
    pub correction: f64,
    pub reversal: f64,
    pub oversold: f64,
    pub fundamental: f64,
    pub catalyst: f64,
}

impl Default for CorrectionWeights {
    fn default() -> Self {
        Self {
            correction: 0.15,
            reversal: 0.25,
            oversold: 0.20,
            fundamental: 0.15,
            catalyst: 0.25,
        }
    }
}

impl CorrectionWeights {
    pub fn sum(&self) -> f64 {
        self.correction + self.reversal + self.oversold + self.fundamental + self.catalyst
    }
}

/// Thresholds for the correction analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CorrectionConfig {
    /// Depth (% below 60-bar high) at which each level starts
    pub mild_pct: f64,
    pub moderate_pct: f64,
    pub deep_pct: f64,
    pub crash_pct: f64,
    pub min_reversal_signals: usize,
    pub weights: CorrectionWeights,
    /// Hard reject below this close (rupees)
    pub min_price: f64,
    /// Hard reject below this average daily turnover (rupees)
    pub min_turnover: f64,
    pub max_atr_pct: f64,
    pub boost_threshold: f64,
    pub max_boost: f64,
    /// Ceiling for the final score of rejected tickers
    pub rejected_score_cap: f64,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            mild_pct: 5.0,
            moderate_pct: 10.0,
            deep_pct: 20.0,
            crash_pct: 35.0,
            min_reversal_signals: 3,
            weights: CorrectionWeights::default(),
            min_price: 20.0,
            min_turnover: 5.0e7,
            max_atr_pct: 6.0,
            boost_threshold: 60.0,
            max_boost: 15.0,
            rejected_score_cap: 40.0,
        }
    }
}

impl CorrectionConfig {
    pub fn validate(&self) -> Result<()> {
        if (self.weights.sum() - 1.0).abs() > 0.01 {
            return Err(StockError::ConfigError(format!(
                "correction weights must sum to 1.0, got {:.3}",
                self.weights.sum()
            )));
        }
        if !(self.mild_pct < self.moderate_pct
            && self.moderate_pct < self.deep_pct
            && self.deep_pct < self.crash_pct)
        {
            return Err(StockError::ConfigError(
                "correction level thresholds must be strictly increasing".to_string(),
            ));
        }
        if self.min_reversal_signals == 0 || self.min_reversal_signals > 6 {
            return Err(StockError::ConfigError(
                "minReversalSignals must be between 1 and 6".to_string(),
            ));
        }
        Ok(())
    }
}

/// Web verification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VerificationConfig {
    pub enabled: bool,
    pub max_results: usize,
    /// Claims checked per ticker
    pub max_claims: usize,
    pub requests_per_minute: u32,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_results: 5,
            max_claims: 4,
            requests_per_minute: 20,
        }
    }
}

/// Report output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub top_n: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            top_n: 10,
        }
    }
}

/// Learning database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LearningConfig {
    pub enabled: bool,
    pub db_url: String,
    /// Return (%) at or above which a recommendation counts as a success
    pub success_threshold_pct: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            db_url: "sqlite://swing_learning.db".to_string(),
            success_threshold_pct: 2.0,
        }
    }
}

/// Cache lifetimes in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    pub prices_ttl_secs: u64,
    pub news_ttl_secs: u64,
    pub articles_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prices_ttl_secs: 15 * 60,
            news_ttl_secs: 30 * 60,
            articles_ttl_secs: 6 * 60 * 60,
        }
    }
}

/// Top-level screener configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SwingConfig {
    pub ai: AiConfig,
    pub news: NewsConfig,
    pub market: MarketConfig,
    pub correction: CorrectionConfig,
    pub verification: VerificationConfig,
    pub output: OutputConfig,
    pub learning: LearningConfig,
    pub cache: CacheConfig,
    pub network: NetworkConfig,
}

/// HTTP and retry settings shared by the collectors
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkConfig {
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff_base_ms: 1000,
            request_timeout_secs: 30,
            user_agent: concat!("niftyswing/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl SwingConfig {
    /// Create a new configuration builder
    pub fn builder() -> SwingConfigBuilder {
        SwingConfigBuilder::default()
    }

    /// Parse a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            StockError::ConfigError(format!(
                "Failed to read config file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| StockError::ConfigError(format!("Failed to parse config file: {e}")))
    }

    /// Load config from `path`, or `.swing.json` if present, then apply env overrides
    ///
    /// An explicit path must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE)?,
            None => {
                debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                Self::default()
            }
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from the process environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok().filter(|v| !v.is_empty()));
    }

    /// Overlay values from an arbitrary key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ANTHROPIC_API_KEY") {
            self.ai.anthropic_api_key = Some(v);
        }
        if let Some(v) = lookup("OPENAI_API_KEY") {
            self.ai.openai_api_key = Some(v);
        }
        if let Some(v) = lookup("OPENAI_API_BASE") {
            self.ai.openai_api_base = Some(v);
        }
        if let Some(v) = lookup("GEMINI_API_KEY") {
            self.ai.gemini_api_key = Some(v);
        }
        if let Some(v) = lookup("SWING_AI_CLI") {
            self.ai.cli_command = Some(v);
        }
        if let Some(v) = lookup("SWING_DB_URL") {
            self.learning.db_url = v;
        }
        if let Some(v) = lookup("SWING_OUTPUT_DIR") {
            self.output.dir = PathBuf::from(v);
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.correction.validate()?;

        if self.network.max_retries == 0 || self.network.max_retries > MAX_RETRIES {
            return Err(StockError::ConfigError(format!(
                "maxRetries must be between 1 and {MAX_RETRIES}"
            )));
        }
        if self.output.top_n == 0 {
            return Err(StockError::ConfigError("topN must be greater than 0".to_string()));
        }
        if self.news.fetch_concurrency == 0 || self.market.concurrency == 0 {
            return Err(StockError::ConfigError(
                "concurrency settings must be greater than 0".to_string(),
            ));
        }
        if self.news.requests_per_minute == 0 || self.verification.requests_per_minute == 0 {
            return Err(StockError::ConfigError(
                "requestsPerMinute must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Get retry backoff duration for attempt number
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        backoff_delay(Duration::from_millis(self.network.retry_backoff_base_ms), attempt)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.network.request_timeout_secs)
    }
}

/// Builder for SwingConfig
#[derive(Debug, Default)]
pub struct SwingConfigBuilder {
    ai_enabled: Option<bool>,
    providers: Option<Vec<ProviderKind>>,
    cli_command: Option<String>,
    feeds: Option<Vec<String>>,
    correction: Option<CorrectionConfig>,
    verification: Option<bool>,
    output_dir: Option<PathBuf>,
    top_n: Option<usize>,
    db_url: Option<String>,
    max_retries: Option<u32>,
    retry_backoff_base: Option<Duration>,
    request_timeout: Option<Duration>,
}

impl SwingConfigBuilder {
    /// Enable or disable AI scoring
    pub fn ai_enabled(mut self, enabled: bool) -> Self {
        self.ai_enabled = Some(enabled);
        self
    }

    /// Set provider priority order
    pub fn providers(mut self, providers: Vec<ProviderKind>) -> Self {
        self.providers = Some(providers);
        self
    }

    /// Set the CLI backend command line
    pub fn cli_command(mut self, command: impl Into<String>) -> Self {
        self.cli_command = Some(command.into());
        self
    }

    /// Replace the feed list
    pub fn feeds(mut self, feeds: Vec<String>) -> Self {
        self.feeds = Some(feeds);
        self
    }

    /// Set correction thresholds
    pub fn correction(mut self, correction: CorrectionConfig) -> Self {
        self.correction = Some(correction);
        self
    }

    /// Enable web verification
    pub fn verification(mut self, enabled: bool) -> Self {
        self.verification = Some(enabled);
        self
    }

    /// Set the report directory
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Set how many tickers the report keeps
    pub fn top_n(mut self, n: usize) -> Self {
        self.top_n = Some(n);
        self
    }

    /// Set the learning database URL
    pub fn db_url(mut self, url: impl Into<String>) -> Self {
        self.db_url = Some(url.into());
        self
    }

    /// Set maximum retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Set retry backoff base duration
    pub fn retry_backoff_base(mut self, duration: Duration) -> Self {
        self.retry_backoff_base = Some(duration);
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<SwingConfig> {
        let mut config = SwingConfig::default();

        if let Some(enabled) = self.ai_enabled {
            config.ai.enabled = enabled;
        }
        if let Some(providers) = self.providers {
            config.ai.providers = providers;
        }
        if self.cli_command.is_some() {
            config.ai.cli_command = self.cli_command;
        }
        if let Some(feeds) = self.feeds {
            config.news.feeds = feeds;
        }
        if let Some(correction) = self.correction {
            config.correction = correction;
        }
        if let Some(enabled) = self.verification {
            config.verification.enabled = enabled;
        }
        if let Some(dir) = self.output_dir {
            config.output.dir = dir;
        }
        if let Some(n) = self.top_n {
            config.output.top_n = n;
        }
        if let Some(url) = self.db_url {
            config.learning.db_url = url;
        }
        if let Some(retries) = self.max_retries {
            config.network.max_retries = retries;
        }
        if let Some(base) = self.retry_backoff_base {
            config.network.retry_backoff_base_ms = base.as_millis() as u64;
        }
        if let Some(timeout) = self.request_timeout {
            config.network.request_timeout_secs = timeout.as_secs();
        }

        config.validate()?;
        Ok(config)
    }
}
