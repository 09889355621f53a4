//! Per-paper enrichment: venue classification, full-text lookup and
//! methodology extraction.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::extractor::{ExtractionOutcome, MethodExtractor};
use crate::venue::{VenueClassifier, VenueMatch};

/// A paper as returned by a search provider.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Paper {
    pub title: String,
    pub doi: Option<String>,
    pub venue: Option<String>,
    pub abstract_text: Option<String>,
}

impl Paper {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Source of paper full text, looked up by title and optional DOI.
///
/// `Ok(None)` means the provider has no text for the paper; `Err` carries a
/// provider-specific failure description.
pub trait FullTextProvider: Send + Sync {
    fn name(&self) -> &str;

    fn fetch<'a>(
        &'a self,
        title: &'a str,
        doi: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, String>> + Send + 'a>>;
}

/// Full text held in memory, keyed by lowercased title.
#[derive(Debug, Default)]
pub struct InMemoryProvider {
    texts: HashMap<String, String>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, title: &str, text: impl Into<String>) {
        self.texts.insert(title.trim().to_lowercase(), text.into());
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

impl FullTextProvider for InMemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    fn fetch<'a>(
        &'a self,
        title: &'a str,
        _doi: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, String>> + Send + 'a>> {
        let text = self.texts.get(&title.trim().to_lowercase()).cloned();
        Box::pin(async move { Ok(text) })
    }
}

/// A paper together with everything learned about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedPaper {
    pub paper: Paper,
    pub venue: VenueMatch,
    pub full_text: Option<String>,
    pub method: ExtractionOutcome,
    /// Full-text lookup failure, if any.
    pub fetch_error: Option<String>,
    /// Set when enrichment was skipped because the run was cancelled.
    pub cancelled: bool,
}

impl EnrichedPaper {
    /// A paper that was classified but not looked up or extracted.
    pub fn not_enriched(paper: Paper, venue: VenueMatch) -> Self {
        Self {
            paper,
            venue,
            full_text: None,
            method: ExtractionOutcome::NotFound,
            fetch_error: None,
            cancelled: false,
        }
    }
}

/// Runs the enrichment steps for one paper at a time.
pub struct Enricher {
    provider: Arc<dyn FullTextProvider>,
    extractor: MethodExtractor,
    venues: VenueClassifier,
}

impl Enricher {
    pub fn new(
        provider: Arc<dyn FullTextProvider>,
        extractor: MethodExtractor,
        venues: VenueClassifier,
    ) -> Self {
        Self {
            provider,
            extractor,
            venues,
        }
    }

    pub fn venues(&self) -> &VenueClassifier {
        &self.venues
    }

    /// Classify the paper's venue.
    pub fn classify(&self, paper: &Paper) -> VenueMatch {
        paper
            .venue
            .as_deref()
            .map(|v| self.venues.classify(v))
            .unwrap_or_default()
    }

    /// Classify, fetch full text and extract the methodology.
    ///
    /// Never fails: a provider error or missing text leaves `method` as
    /// [`ExtractionOutcome::NotFound`].
    pub async fn enrich(&self, paper: Paper) -> EnrichedPaper {
        let mut enriched = EnrichedPaper::not_enriched(paper, VenueMatch::none());
        enriched.venue = self.classify(&enriched.paper);

        let fetched = self
            .provider
            .fetch(&enriched.paper.title, enriched.paper.doi.as_deref())
            .await;
        let text = match fetched {
            Ok(Some(text)) if !text.trim().is_empty() => text,
            Ok(_) => {
                tracing::info!(
                    title = %enriched.paper.title,
                    provider = self.provider.name(),
                    "no full text"
                );
                return enriched;
            }
            Err(e) => {
                tracing::warn!(
                    title = %enriched.paper.title,
                    provider = self.provider.name(),
                    error = %e,
                    "full text lookup failed"
                );
                enriched.fetch_error = Some(e);
                return enriched;
            }
        };

        enriched.method = self.extractor.extract(&text).await;
        enriched.full_text = Some(text);
        enriched
    }
}
