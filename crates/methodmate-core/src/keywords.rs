//! Turning oracle keyword output into a phrase-preserving search query.
//!
//! Search providers treat commas as phrase delimiters and spaces inside a
//! phrase as part of the phrase, so multi-word terms must keep their spaces.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::oracle::{OracleClient, OracleError, OracleReply, OracleRequest, Purpose};

/// Query used when nothing usable can be parsed from a reply.
pub const DEFAULT_QUERY: &str = "research methodology quantitative analysis experimental design";

/// Connectives that extend the current phrase instead of starting one.
pub const PHRASE_STOPWORDS: &[&str] = &["and", "or", "the", "in", "on", "at", "to", "of", "for", "with"];

/// A search query as an ordered list of phrases, each an ordered list of words.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeywordQuery {
    phrases: Vec<Vec<String>>,
}

impl KeywordQuery {
    pub fn phrases(&self) -> &[Vec<String>] {
        &self.phrases
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    /// Parse raw keyword output, dispatching on its shape.
    pub fn parse(raw: &str) -> Self {
        if raw.contains(',') {
            Self::from_comma_separated(raw)
        } else if raw.contains('"') || raw.contains('\'') {
            Self::from_quoted(raw)
        } else {
            Self::from_free_text(raw)
        }
    }

    /// Already comma-separated: kept verbatim, spaces included.
    fn from_comma_separated(raw: &str) -> Self {
        Self {
            phrases: raw
                .split(',')
                .map(|phrase| phrase.split(' ').map(str::to_string).collect())
                .collect(),
        }
    }

    /// `"machine learning" 'user study' survey` → three phrases.
    fn from_quoted(raw: &str) -> Self {
        static TOKEN: Lazy<Regex> =
            Lazy::new(|| Regex::new(r#""([^"]+)"|'([^']+)'|([^\s,]+)"#).unwrap());

        let phrases = TOKEN
            .find_iter(raw)
            .map(|m| strip_quotes(m.as_str()).trim())
            .filter(|token| !token.is_empty())
            .map(|token| token.split(' ').map(str::to_string).collect())
            .collect();
        Self { phrases }
    }

    /// Group space-separated words into phrases.
    ///
    /// Short words and stopwords join the current phrase (and are dropped
    /// when no phrase is open); a word ending in `,` or `.` closes it.
    fn from_free_text(raw: &str) -> Self {
        let mut phrases = Vec::new();
        let mut current: Vec<String> = Vec::new();

        for word in raw.split_whitespace() {
            if word.chars().count() <= 2 || is_stopword(word) {
                if !current.is_empty() {
                    current.push(word.to_string());
                }
            } else if current.last().is_some_and(|w| w.ends_with([',', '.'])) {
                phrases.push(close_phrase(std::mem::take(&mut current)));
                current.push(word.to_string());
            } else {
                current.push(word.to_string());
            }
        }
        if !current.is_empty() {
            phrases.push(close_phrase(current));
        }

        Self { phrases }
    }
}

impl fmt::Display for KeywordQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, phrase) in self.phrases.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(&phrase.join(" "))?;
        }
        Ok(())
    }
}

fn is_stopword(word: &str) -> bool {
    PHRASE_STOPWORDS
        .iter()
        .any(|s| s.eq_ignore_ascii_case(word))
}

fn strip_quotes(token: &str) -> &str {
    let token = token.strip_prefix(['"', '\'']).unwrap_or(token);
    token.strip_suffix(['"', '\'']).unwrap_or(token)
}

/// Drop the terminating punctuation from a finished phrase.
fn close_phrase(mut words: Vec<String>) -> Vec<String> {
    if let Some(last) = words.last_mut() {
        let trimmed = last.trim_end_matches([',', '.']).len();
        last.truncate(trimmed);
        if last.is_empty() {
            words.pop();
        }
    }
    words
}

/// Format raw keyword output as a comma-delimited search query.
///
/// Comma-separated input is returned unchanged, so formatting is idempotent
/// on its own output whenever that output contains a comma.
pub fn format_query(raw: &str) -> String {
    let formatted = KeywordQuery::parse(raw).to_string();
    tracing::debug!(raw, formatted = %formatted, "formatted keyword query");
    formatted
}

#[derive(Deserialize)]
struct KeywordsJson {
    keywords: Vec<serde_json::Value>,
}

/// Pull keywords out of a free-form oracle reply.
///
/// Tries, in order: a JSON object with a `keywords` array (fenced or bare),
/// a `keywords:` line, a numbered list, and plain English words. Falls back
/// to [`DEFAULT_QUERY`].
pub fn parse_keywords_reply(reply: &str) -> String {
    static FENCED_JSON: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?is)```json\s*(.*?)\s*```").unwrap());
    static BARE_JSON: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());
    static KEYWORDS_LINE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)(?:关键词|keywords|key\s*words)[:：]\s*([^\n]+)").unwrap()
    });
    static LIST_ITEM: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\d+\.\s*([^\n,]+)(?:,|\n|$)").unwrap());

    let json = FENCED_JSON
        .captures(reply)
        .and_then(|c| c.get(1))
        .or_else(|| BARE_JSON.find(reply))
        .map(|m| m.as_str());
    if let Some(json) = json {
        match serde_json::from_str::<KeywordsJson>(json) {
            Ok(parsed) => {
                let keywords: Vec<&str> = parsed
                    .keywords
                    .iter()
                    .filter_map(|v| v.as_str())
                    .filter(|k| !k.trim().is_empty())
                    .collect();
                if !keywords.is_empty() {
                    return keywords.join(",");
                }
            }
            Err(e) => tracing::debug!(error = %e, "keyword reply JSON did not parse"),
        }
    }

    if let Some(line) = KEYWORDS_LINE.captures(reply).and_then(|c| c.get(1)) {
        let line = line.as_str().trim();
        if !line.is_empty() {
            return line.to_string();
        }
    }

    let items: Vec<&str> = LIST_ITEM
        .captures_iter(reply)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|item| !item.is_empty())
        .collect();
    if !items.is_empty() {
        return items.join(" ");
    }

    let words: Vec<&str> = reply
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .filter(|w| w.len() > 3 && w.chars().all(|c| c.is_ascii_alphabetic()))
        .take(10)
        .collect();
    if !words.is_empty() {
        return words.join(" ");
    }

    tracing::debug!("no keywords in reply, using default query");
    DEFAULT_QUERY.to_string()
}

fn keywords_prompt(description: &str) -> String {
    format!(
        "Extract 3 to 5 academic search keywords for the following research description. \
         Keep multi-word terms together. Reply with JSON of the form \
         {{\"keywords\": [\"...\"]}}.\n\n\
         Description:\n{description}"
    )
}

/// Ask the oracle for search keywords describing `description` and format
/// them as a query. A refusal yields the default query.
pub async fn suggest_query(
    oracle: &dyn OracleClient,
    description: &str,
) -> Result<String, OracleError> {
    let request = OracleRequest::new(Purpose::Keywords, keywords_prompt(description));
    let raw = match oracle.ask(&request).await? {
        OracleReply::Answer(answer) => parse_keywords_reply(&answer),
        OracleReply::Refused(_) => {
            tracing::warn!(oracle = oracle.name(), "oracle refused keyword request");
            DEFAULT_QUERY.to_string()
        }
    };
    Ok(format_query(&raw))
}
