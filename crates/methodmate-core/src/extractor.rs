//! Methodology extraction: section location, chunking, and oracle calls with
//! retry and summarization fallback.
//!
//! Every failure inside the pipeline is absorbed into [`ExtractionOutcome`];
//! [`MethodExtractor::extract`] never returns an error.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::chunker::{self, PARAGRAPH_SEPARATOR, char_len};
use crate::oracle::{OracleClient, OracleReply, OracleRequest, Purpose};
use crate::section;
use crate::{Document, ExtractionConfig};

/// Which code path produced an extracted methodology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// The whole document fit in one request.
    Direct,
    /// A located methodology section fit in one request.
    SectionDirect,
    /// Per-chunk results were merged.
    ChunkedMerged,
    /// The text came from the summarization prompt.
    SummarizedFallback,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Direct => "direct",
            Provenance::SectionDirect => "section-direct",
            Provenance::ChunkedMerged => "chunked-merged",
            Provenance::SummarizedFallback => "summarized-fallback",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one extraction call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Found { text: String, provenance: Provenance },
    NotFound,
}

impl ExtractionOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, ExtractionOutcome::Found { .. })
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            ExtractionOutcome::Found { text, .. } => Some(text),
            ExtractionOutcome::NotFound => None,
        }
    }

    pub fn provenance(&self) -> Option<Provenance> {
        match self {
            ExtractionOutcome::Found { provenance, .. } => Some(*provenance),
            ExtractionOutcome::NotFound => None,
        }
    }
}

impl fmt::Display for ExtractionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionOutcome::Found { provenance, .. } => write!(f, "found ({provenance})"),
            ExtractionOutcome::NotFound => f.write_str("no methodology found"),
        }
    }
}

/// Text produced for one segment, and whether it came from summarization.
#[derive(Debug, Clone)]
struct SegmentResult {
    text: String,
    summarized: bool,
}

static BOILERPLATE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:here is the research methodology section|i've extracted the research methodology section|the research methodology section is as follows|以下是(?:论文的)?研究方法部分|研究方法部分如下)\s*[:：]?",
    )
    .unwrap()
});

/// Strip known boilerplate lead-ins from an oracle answer.
pub fn clean_answer(answer: &str) -> &str {
    let stripped = match BOILERPLATE_PREFIX.find(answer) {
        Some(m) => &answer[m.end()..],
        None => answer,
    };
    stripped.trim()
}

/// Answers meaning "nothing here" (the extraction prompt asks for `null`).
fn is_no_result(answer: &str) -> bool {
    answer.is_empty()
        || answer.eq_ignore_ascii_case("null")
        || answer.eq_ignore_ascii_case("none")
}

pub fn extraction_prompt(text: &str) -> String {
    format!(
        "You are a research methodology expert. Identify and extract the methodology section \
         of the following academic paper text.\n\n\
         Look for passages that describe:\n\
         1. Research design or methodology\n\
         2. Data collection methods\n\
         3. Analysis procedures\n\
         4. Experimental setup\n\n\
         Return the relevant passages verbatim. If there is no methodology content, return null.\n\n\
         Paper text:\n{text}\n\n\
         Only extract and return the relevant text; do not analyze, summarize, or modify it."
    )
}

pub fn summary_prompt(text: &str) -> String {
    format!(
        "As a research assistant, read the following text and produce a concise methodology \
         summary of the research it describes.\n\
         Cover:\n\
         - The type of research (e.g., experimental, survey, case study)\n\
         - Data collection methods\n\
         - Analysis approaches\n\
         - Key methodological steps\n\n\
         Text:\n{text}\n\n\
         Please provide a concise summary of the methodology."
    )
}

/// Extracts methodology text from papers through an oracle.
pub struct MethodExtractor {
    oracle: Arc<dyn OracleClient>,
    config: ExtractionConfig,
}

impl MethodExtractor {
    pub fn new(oracle: Arc<dyn OracleClient>, config: ExtractionConfig) -> Self {
        Self { oracle, config }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract the methodology from raw paper text.
    ///
    /// Empty text is rejected without contacting the oracle.
    pub async fn extract(&self, text: &str) -> ExtractionOutcome {
        match Document::new(text) {
            Ok(doc) => self.extract_document(&doc).await,
            Err(e) => {
                tracing::warn!(error = %e, "skipping extraction");
                ExtractionOutcome::NotFound
            }
        }
    }

    /// Extract the methodology from a validated document.
    pub async fn extract_document(&self, doc: &Document) -> ExtractionOutcome {
        let max = self.config.max_chunk_length;
        tracing::debug!(chars = doc.len(), "extracting methodology");

        let outcome = if doc.len() <= max {
            self.process_single(doc.text(), Provenance::Direct).await
        } else {
            match section::locate(doc.text()) {
                Some(section) if section.len() <= max => {
                    tracing::debug!(chars = section.len(), "section fits, sending directly");
                    self.process_single(section.text(), Provenance::SectionDirect)
                        .await
                }
                Some(section) => {
                    tracing::debug!(chars = section.len(), "section too long, chunking");
                    self.process_chunks(section.text()).await
                }
                None => {
                    tracing::debug!("no section located, chunking whole document");
                    self.process_chunks(doc.text()).await
                }
            }
        };

        match &outcome {
            ExtractionOutcome::Found { text, provenance } => {
                tracing::info!(%provenance, chars = char_len(text), "methodology extracted")
            }
            ExtractionOutcome::NotFound => tracing::info!("no methodology found"),
        }
        outcome
    }

    async fn process_single(&self, text: &str, provenance: Provenance) -> ExtractionOutcome {
        match self.process_segment(text).await {
            Some(SegmentResult {
                text,
                summarized: true,
            }) => ExtractionOutcome::Found {
                text,
                provenance: Provenance::SummarizedFallback,
            },
            Some(SegmentResult { text, .. }) => ExtractionOutcome::Found { text, provenance },
            None => ExtractionOutcome::NotFound,
        }
    }

    /// Send chunks one at a time, pacing requests, and merge the results.
    async fn process_chunks(&self, text: &str) -> ExtractionOutcome {
        let mut chunks = chunker::split(text, self.config.max_chunk_length).peekable();
        let mut results = Vec::new();
        let mut index = 0;

        while let Some(chunk) = chunks.next() {
            tracing::debug!(chunk = index, chars = char_len(&chunk), "processing chunk");
            if let Some(result) = self.process_segment(&chunk).await {
                results.push(result.text);
            }
            index += 1;
            if chunks.peek().is_some() {
                tokio::time::sleep(self.config.chunk_pacing).await;
            }
        }

        if results.is_empty() {
            tracing::debug!(chunks = index, "no chunk yielded a result");
            return ExtractionOutcome::NotFound;
        }

        let merged = results.join(PARAGRAPH_SEPARATOR);
        tracing::debug!(
            chunks = index,
            with_result = results.len(),
            chars = char_len(&merged),
            "merged chunk results"
        );

        if char_len(&merged) > self.config.max_chunk_length {
            return match self.summarize(&merged).await {
                Some(summary) => ExtractionOutcome::Found {
                    text: summary,
                    provenance: Provenance::SummarizedFallback,
                },
                None => {
                    tracing::warn!("summarizing oversized merged result failed");
                    ExtractionOutcome::NotFound
                }
            };
        }

        ExtractionOutcome::Found {
            text: merged,
            provenance: Provenance::ChunkedMerged,
        }
    }

    /// One extraction request for `text`, retried on transport failure.
    ///
    /// Refusals go straight to summarization; exhausted retries do too.
    async fn process_segment(&self, text: &str) -> Option<SegmentResult> {
        let prompt = extraction_prompt(text);
        let mut attempt = 0;

        loop {
            let request = OracleRequest::new(Purpose::ExtractMethod, prompt.as_str());
            match self.oracle.ask(&request).await {
                Ok(OracleReply::Answer(answer)) => {
                    let cleaned = clean_answer(&answer);
                    if is_no_result(cleaned) {
                        tracing::debug!("oracle found no methodology in segment");
                        return None;
                    }
                    return Some(SegmentResult {
                        text: cleaned.to_string(),
                        summarized: false,
                    });
                }
                Ok(OracleReply::Refused(_)) => {
                    tracing::warn!(oracle = self.oracle.name(), "oracle refused, summarizing instead");
                    break;
                }
                Err(e) if attempt < self.config.retry_count => {
                    attempt += 1;
                    tracing::warn!(
                        oracle = self.oracle.name(),
                        error = %e,
                        attempt,
                        max = self.config.retry_count,
                        "oracle request failed, retrying"
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(e) => {
                    tracing::warn!(
                        oracle = self.oracle.name(),
                        error = %e,
                        "retries exhausted, summarizing instead"
                    );
                    break;
                }
            }
        }

        self.summarize(text).await.map(|text| SegmentResult {
            text,
            summarized: true,
        })
    }

    /// Ask the oracle for a concise methodology summary of `text`. Not retried.
    pub async fn summarize(&self, text: &str) -> Option<String> {
        let request = OracleRequest::new(Purpose::SummarizeMethod, summary_prompt(text));
        match self.oracle.ask(&request).await {
            Ok(OracleReply::Answer(answer)) => {
                let cleaned = clean_answer(&answer);
                (!is_no_result(cleaned)).then(|| cleaned.to_string())
            }
            Ok(OracleReply::Refused(_)) => {
                tracing::warn!(oracle = self.oracle.name(), "oracle refused summarization");
                None
            }
            Err(e) => {
                tracing::warn!(oracle = self.oracle.name(), error = %e, "summarization failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::mock::{MockOracle, MockResponse};
    use std::time::Duration;

    fn extractor(oracle: &Arc<MockOracle>) -> MethodExtractor {
        MethodExtractor::new(oracle.clone(), ExtractionConfig::default())
    }

    fn small_config(max: usize) -> ExtractionConfig {
        ExtractionConfig {
            max_chunk_length: max,
            ..ExtractionConfig::default()
        }
    }

    // ── clean_answer ───────────────────────────────────────────────────

    #[test]
    fn strips_boilerplate_prefix() {
        assert_eq!(
            clean_answer("Here is the research methodology section: We ran a survey."),
            "We ran a survey."
        );
        assert_eq!(
            clean_answer("  I've extracted the research methodology section:\nInterviews."),
            "Interviews."
        );
        assert_eq!(clean_answer("以下是研究方法部分：问卷调查。"), "问卷调查。");
        assert_eq!(clean_answer("Plain answer."), "Plain answer.");
    }

    // ── direct path ────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn short_document_is_sent_directly() {
        let oracle = Arc::new(MockOracle::answering("We interviewed 12 designers."));
        let outcome = extractor(&oracle).extract("A short paper.").await;
        assert_eq!(
            outcome,
            ExtractionOutcome::Found {
                text: "We interviewed 12 designers.".into(),
                provenance: Provenance::Direct,
            }
        );
        assert_eq!(oracle.call_count(), 1);
        assert!(oracle.prompts()[0].contains("A short paper."));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_document_makes_no_calls() {
        let oracle = Arc::new(MockOracle::answering("unused"));
        let outcome = extractor(&oracle).extract("   ").await;
        assert_eq!(outcome, ExtractionOutcome::NotFound);
        assert_eq!(oracle.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn null_answer_is_not_found() {
        let oracle = Arc::new(MockOracle::answering("null"));
        let outcome = extractor(&oracle).extract("A paper without methods.").await;
        assert_eq!(outcome, ExtractionOutcome::NotFound);
        assert_eq!(oracle.call_count(), 1);
    }

    // ── retry and fallback ─────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn retry_exhaustion_then_summary_failure() {
        let oracle = Arc::new(MockOracle::new(MockResponse::Timeout));
        let ex = extractor(&oracle);
        let outcome = ex.extract("A short paper.").await;

        assert_eq!(outcome, ExtractionOutcome::NotFound);
        let retries = ex.config().retry_count as usize;
        assert_eq!(oracle.calls_for(Purpose::ExtractMethod), retries + 1);
        assert_eq!(oracle.calls_for(Purpose::SummarizeMethod), 1);
        assert_eq!(oracle.call_count(), retries + 2);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_waits_flat_delay() {
        let oracle = Arc::new(MockOracle::new(MockResponse::Status(503)));
        let ex = extractor(&oracle);
        let start = tokio::time::Instant::now();
        ex.extract("A short paper.").await;
        // Three flat 2s delays, no exponential growth.
        assert_eq!(start.elapsed(), Duration::from_millis(6000));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_recovers() {
        let oracle = Arc::new(MockOracle::with_sequence(vec![
            MockResponse::Timeout,
            MockResponse::Status(502),
            MockResponse::Answer("Mixed methods.".into()),
        ]));
        let outcome = extractor(&oracle).extract("A short paper.").await;
        assert_eq!(outcome.text(), Some("Mixed methods."));
        assert_eq!(outcome.provenance(), Some(Provenance::Direct));
        assert_eq!(oracle.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_exhaustion_then_summary_success() {
        let oracle = Arc::new(MockOracle::with_sequence(vec![
            MockResponse::Timeout,
            MockResponse::Timeout,
            MockResponse::Timeout,
            MockResponse::Timeout,
            MockResponse::Answer("A survey study.".into()),
        ]));
        let outcome = extractor(&oracle).extract("A short paper.").await;
        assert_eq!(
            outcome,
            ExtractionOutcome::Found {
                text: "A survey study.".into(),
                provenance: Provenance::SummarizedFallback,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn refusal_short_circuits_to_summary() {
        let oracle = Arc::new(MockOracle::with_sequence(vec![
            MockResponse::Refused,
            MockResponse::Answer("Case study with interviews.".into()),
        ]));
        let outcome = extractor(&oracle).extract("A short paper.").await;

        assert_eq!(
            oracle.purposes(),
            vec![Purpose::ExtractMethod, Purpose::SummarizeMethod]
        );
        assert_eq!(outcome.provenance(), Some(Provenance::SummarizedFallback));
        assert_eq!(outcome.text(), Some("Case study with interviews."));
    }

    #[tokio::test(start_paused = true)]
    async fn refused_summary_is_not_found() {
        let oracle = Arc::new(MockOracle::new(MockResponse::Refused));
        let outcome = extractor(&oracle).extract("A short paper.").await;
        assert_eq!(outcome, ExtractionOutcome::NotFound);
        assert_eq!(oracle.call_count(), 2);
    }

    // ── section and chunked paths ──────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn long_document_sends_located_section() {
        let filler = "Background sentence. ".repeat(20);
        let text = format!(
            "1. Introduction\n{filler}\n3. Method\nWe ran a diary study.\n4. Results\n{filler}"
        );
        let oracle = Arc::new(MockOracle::answering("We ran a diary study."));
        let ex = MethodExtractor::new(oracle.clone(), small_config(200));
        let outcome = ex.extract(&text).await;

        assert_eq!(outcome.provenance(), Some(Provenance::SectionDirect));
        assert_eq!(oracle.call_count(), 1);
        let prompt = &oracle.prompts()[0];
        assert!(prompt.contains("3. Method\nWe ran a diary study."));
        assert!(!prompt.contains("4. Results"));
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_section_is_chunked_alone() {
        let body = "s".repeat(80);
        let text = format!(
            "1. Introduction\n\n{}\n\n3. Method\n\n{body}\n\n{body}\n\n4. Results\n\n{}",
            "q".repeat(150),
            "z".repeat(150),
        );
        let oracle = Arc::new(MockOracle::with_sequence(vec![
            MockResponse::Answer("alpha".into()),
            MockResponse::Answer("beta".into()),
        ]));
        let ex = MethodExtractor::new(oracle.clone(), small_config(120));
        let outcome = ex.extract(&text).await;

        // The 175-char section splits into "3. Method" + one body, then the other body.
        assert_eq!(
            outcome,
            ExtractionOutcome::Found {
                text: "alpha\n\nbeta".into(),
                provenance: Provenance::ChunkedMerged,
            }
        );
        let prompts = oracle.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("3. Method"));
        for prompt in &prompts {
            assert!(prompt.contains(&body));
            assert!(!prompt.contains("qqq"));
            assert!(!prompt.contains("zzz"));
            assert!(!prompt.contains("4. Results"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unlocated_document_is_chunked_and_merged() {
        // No heading and no keyword-rich paragraph, so the whole text is chunked.
        let para = "x".repeat(40);
        let text = vec![para.as_str(); 6].join("\n\n");
        let oracle = Arc::new(MockOracle::with_sequence(vec![
            MockResponse::Answer("first".into()),
            MockResponse::Answer("null".into()),
            MockResponse::Answer("third".into()),
        ]));
        let ex = MethodExtractor::new(oracle.clone(), small_config(90));
        let start = tokio::time::Instant::now();
        let outcome = ex.extract(&text).await;

        // 40 + 40 + 2 = 82 fits, so six paragraphs make three chunks.
        assert_eq!(oracle.call_count(), 3);
        assert_eq!(
            outcome,
            ExtractionOutcome::Found {
                text: "first\n\nthird".into(),
                provenance: Provenance::ChunkedMerged,
            }
        );
        // Two pacing delays between three chunks.
        assert_eq!(start.elapsed(), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn all_chunks_empty_is_not_found() {
        let para = "y".repeat(40);
        let text = vec![para.as_str(); 4].join("\n\n");
        let oracle = Arc::new(MockOracle::answering("null"));
        let ex = MethodExtractor::new(oracle.clone(), small_config(50));
        assert_eq!(ex.extract(&text).await, ExtractionOutcome::NotFound);
        assert_eq!(oracle.call_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_merge_is_summarized() {
        let para = "z".repeat(40);
        let text = vec![para.as_str(); 4].join("\n\n");
        let long_answer = "m".repeat(30);
        let oracle = Arc::new(MockOracle::with_sequence(vec![
            MockResponse::Answer(long_answer.clone()),
            MockResponse::Answer(long_answer.clone()),
            MockResponse::Answer(long_answer.clone()),
            MockResponse::Answer(long_answer),
            MockResponse::Answer("short summary".into()),
        ]));
        let ex = MethodExtractor::new(oracle.clone(), small_config(50));
        let outcome = ex.extract(&text).await;

        assert_eq!(
            outcome,
            ExtractionOutcome::Found {
                text: "short summary".into(),
                provenance: Provenance::SummarizedFallback,
            }
        );
        assert_eq!(oracle.calls_for(Purpose::SummarizeMethod), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_summary_of_oversized_merge_is_not_found() {
        let para = "z".repeat(40);
        let text = vec![para.as_str(); 2].join("\n\n");
        let long_answer = "m".repeat(30);
        let oracle = Arc::new(MockOracle::with_sequence(vec![
            MockResponse::Answer(long_answer.clone()),
            MockResponse::Answer(long_answer.clone()),
            MockResponse::Refused,
        ]));
        let ex = MethodExtractor::new(oracle.clone(), small_config(50));
        let outcome = ex.extract(&text).await;

        // 30 + 2 + 30 = 62 exceeds the bound of 50 and the summary is refused.
        assert_eq!(outcome, ExtractionOutcome::NotFound);
        assert_eq!(oracle.calls_for(Purpose::SummarizeMethod), 1);
    }
}
