use std::time::Duration;

use thiserror::Error;

pub mod chunker;
pub mod config_file;
pub mod enrich;
pub mod extractor;
pub mod keywords;
pub mod oracle;
pub mod pool;
pub mod section;
pub mod venue;

// Re-export for convenience
pub use chunker::{MAX_CHUNK_LENGTH, split};
pub use enrich::{EnrichedPaper, Enricher, FullTextProvider, InMemoryProvider, Paper};
pub use extractor::{ExtractionOutcome, MethodExtractor, Provenance};
pub use keywords::{KeywordQuery, format_query, parse_keywords_reply, suggest_query};
pub use oracle::{CozeOracle, OracleClient, OracleError, OracleReply, OracleRequest};
pub use pool::{EnrichmentPool, ProgressEvent, enrich_papers};
pub use section::{Section, locate};
pub use venue::{TOP_VENUES, VenueClassifier, VenueMatch, is_top_venue};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("configuration error: {0}")]
    Config(String),
}

/// Immutable paper text handed to the extraction pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    text: String,
    length: usize,
}

impl Document {
    /// Validate `text` as a document. Empty or whitespace-only text is
    /// rejected before any oracle call is made.
    pub fn new(text: impl Into<String>) -> Result<Self, CoreError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(CoreError::MalformedInput("document text is empty".into()));
        }
        let length = chunker::char_len(&text);
        Ok(Self { text, length })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// Connection settings for the oracle.
#[derive(Clone)]
pub struct OracleConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub bot_id: String,
    pub user_id: String,
    /// Per-request timeout; an elapsed timeout counts as a transport failure.
    pub timeout: Duration,
}

impl std::fmt::Debug for OracleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("bot_id", &self.bot_id)
            .field("user_id", &self.user_id)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.coze.com".into(),
            api_key: None,
            bot_id: String::new(),
            user_id: String::new(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Tunables for the extraction pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionConfig {
    /// Largest text (in characters) sent to the oracle in one request.
    pub max_chunk_length: usize,
    /// Delay between consecutive chunk requests.
    pub chunk_pacing: Duration,
    /// Retries after a transport failure (so `retry_count + 1` attempts).
    pub retry_count: u32,
    /// Flat delay before each retry.
    pub retry_delay: Duration,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_chunk_length: MAX_CHUNK_LENGTH,
            chunk_pacing: Duration::from_millis(1000),
            retry_count: 3,
            retry_delay: Duration::from_millis(2000),
        }
    }
}

/// Process-wide configuration, built once at startup and read-only afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub oracle: OracleConfig,
    pub extraction: ExtractionConfig,
    pub num_workers: usize,
    /// Canonical top-venue list, in match priority order.
    pub venues: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            oracle: OracleConfig::default(),
            extraction: ExtractionConfig::default(),
            num_workers: 4,
            venues: TOP_VENUES.iter().map(|v| v.to_string()).collect(),
        }
    }
}

impl Config {
    /// Check that the oracle can actually be called.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.oracle.api_key.as_deref().is_none_or(str::is_empty) {
            return Err(CoreError::Config("oracle API key is not set".into()));
        }
        if self.oracle.bot_id.is_empty() {
            return Err(CoreError::Config("oracle bot id is not set".into()));
        }
        if self.extraction.max_chunk_length == 0 {
            return Err(CoreError::Config("max_chunk_length must be > 0".into()));
        }
        Ok(())
    }
}

/// Build the shared HTTP client used for oracle calls.
pub fn build_http_client() -> Result<reqwest::Client, CoreError> {
    Ok(reqwest::Client::builder()
        .pool_max_idle_per_host(2)
        .pool_idle_timeout(Duration::from_secs(30))
        .build()?)
}
