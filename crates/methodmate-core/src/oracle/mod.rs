//! Boundary to the external text-analysis oracle.
//!
//! The oracle answers a free-text prompt with free text, a refusal, or a
//! transport failure. Refusals are classified here, once, so callers only
//! ever branch on [`OracleReply`] and [`OracleError`].

pub mod coze;
#[cfg(test)]
pub mod mock;
pub mod response;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

pub use coze::CozeOracle;
pub use response::ChatResponse;

/// Case-insensitive phrases that mark an answer as a refusal.
pub const REFUSAL_MARKERS: &[&str] = &["i'm sorry", "cannot assist", "can't assist"];

/// What a request is for. Used to tag conversation ids and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    ExtractMethod,
    SummarizeMethod,
    Keywords,
}

impl Purpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::ExtractMethod => "extract_method",
            Purpose::SummarizeMethod => "generate_summary",
            Purpose::Keywords => "keywords",
        }
    }
}

/// A single prompt sent to the oracle.
#[derive(Debug, Clone)]
pub struct OracleRequest {
    pub prompt: String,
    pub conversation_id: String,
    pub purpose: Purpose,
}

impl OracleRequest {
    /// Build a request with a fresh conversation id derived from `purpose`.
    pub fn new(purpose: Purpose, prompt: impl Into<String>) -> Self {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        Self {
            prompt: prompt.into(),
            conversation_id: format!("{}_{}", purpose.as_str(), millis),
            purpose,
        }
    }
}

/// A classified oracle answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleReply {
    Answer(String),
    /// The oracle declined. Deterministic; never retried.
    Refused(String),
}

impl OracleReply {
    /// Classify raw answer text as an answer or a refusal.
    pub fn classify(text: String) -> Self {
        if is_refusal(&text) {
            OracleReply::Refused(text)
        } else {
            OracleReply::Answer(text)
        }
    }
}

/// Transport-level failures. All of these are retryable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("request timed out after {:.1}s", .0.as_secs_f64())]
    Timeout(Duration),
    #[error("oracle responded with status {0}")]
    Status(u16),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unrecognized response payload: {0}")]
    Malformed(String),
    #[error("oracle returned no answer")]
    EmptyAnswer,
}

impl From<reqwest::Error> for OracleError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            // reqwest does not report the configured duration; callers
            // that know it map timeouts themselves.
            OracleError::Timeout(Duration::ZERO)
        } else if let Some(status) = e.status() {
            OracleError::Status(status.as_u16())
        } else {
            OracleError::Transport(e.to_string())
        }
    }
}

/// Whether `text` contains one of the [`REFUSAL_MARKERS`].
pub fn is_refusal(text: &str) -> bool {
    let lower = text.to_lowercase();
    REFUSAL_MARKERS.iter().any(|m| lower.contains(m))
}

/// An oracle that answers prompts.
pub trait OracleClient: Send + Sync {
    /// Name used in logs (e.g., "Coze").
    fn name(&self) -> &str;

    /// Send `request` and classify the answer.
    ///
    /// Implementations must bound the call with a timeout and report it as
    /// [`OracleError::Timeout`].
    fn ask<'a>(
        &'a self,
        request: &'a OracleRequest,
    ) -> Pin<Box<dyn Future<Output = Result<OracleReply, OracleError>> + Send + 'a>>;
}
