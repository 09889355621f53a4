//! Locating the methodology section inside raw paper text.
//!
//! Two strategies, tried in order: a titled-section search (high precision)
//! and, when no title is found, a paragraph keyword scan (higher recall).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::chunker::{PARAGRAPH_SEPARATOR, char_len, paragraph_spans};

/// Section titles that introduce a methodology section, in priority order.
pub const METHOD_TITLES: &[&str] = &[
    "method",
    "methodology",
    "research design",
    "experimental design",
    "research methodology",
    "data collection",
    "procedure",
    "experimental setup",
    "research approach",
    "study design",
    "research procedure",
    "materials and methods",
    "方法",
    "研究方法",
    "实验方法",
    "实验设计",
    "研究设计",
    "数据收集",
    "实验程序",
];

/// Keywords scored by the paragraph fallback.
pub const METHOD_KEYWORDS: &[&str] = &[
    "participant",
    "procedure",
    "measure",
    "analysis",
    "collect data",
    "sample",
    "experiment",
    "survey",
    "interview",
    "questionnaire",
    "observation",
    "statistical analysis",
    "research design",
    "study design",
    "method",
    "参与者",
    "程序",
    "测量",
    "分析",
    "收集数据",
    "样本",
    "实验",
    "调查",
    "访谈",
    "问卷",
    "观察",
    "统计分析",
    "研究设计",
    "研究方法",
];

/// Minimum distinct keyword hits for a paragraph to count as methodology.
pub const MIN_KEYWORD_HITS: usize = 3;

/// How far past the title a section extends when no next heading is found.
pub const SECTION_FALLBACK_CHARS: usize = 10_000;

/// Which strategy produced a [`Section`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateStrategy {
    /// A methodology heading was found.
    Titled,
    /// Paragraphs were selected by keyword score.
    KeywordParagraphs,
}

/// Title format a heading matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleFormat {
    /// `3. Method`
    Numbered,
    /// `Method`
    Bare,
    /// `III. Method`
    Roman,
}

/// A located methodology section.
///
/// `start..end` is a byte range into the source text (always on char
/// boundaries), with `0 <= start < end <= source_len`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub start: usize,
    pub end: usize,
    pub matched_title: Option<String>,
    pub source_len: usize,
    pub strategy: LocateStrategy,
    text: String,
}

impl Section {
    /// The section text. For [`LocateStrategy::KeywordParagraphs`] this is the
    /// selected paragraphs joined by a blank line, not the raw range.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length of the section text in characters.
    pub fn len(&self) -> usize {
        char_len(&self.text)
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

struct TitlePattern {
    title: &'static str,
    format: TitleFormat,
    re: Regex,
}

static TITLE_PATTERNS: Lazy<Vec<TitlePattern>> = Lazy::new(|| {
    let mut patterns = Vec::with_capacity(METHOD_TITLES.len() * 3);
    for &title in METHOD_TITLES {
        let escaped = regex::escape(title);
        // CJK headings have no word boundaries around them.
        let b = if title.is_ascii() { r"\b" } else { "" };
        for (format, pattern) in [
            (TitleFormat::Numbered, format!(r"(?i)\b\d+\.?\s+{escaped}{b}")),
            (TitleFormat::Bare, format!(r"(?i){b}{escaped}{b}")),
            (
                TitleFormat::Roman,
                format!(r"(?i)\b[ivxlcdm]+\.?\s+{escaped}{b}"),
            ),
        ] {
            patterns.push(TitlePattern {
                title,
                format,
                re: Regex::new(&pattern).unwrap(),
            });
        }
    }
    patterns
});

/// Start of the next top-level heading. Matched case-sensitively on the
/// original text, anywhere in it: extracted full text often has its line
/// breaks collapsed. Dotted subsection numbers ("2.1 Participants") never match.
static NEXT_SECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\d+\.\s+|[IVX]+\.\s+|[Cc]hapter\s+\d+\s*[:.]\s*|\d+\s*[:.]\s*)\p{Lu}")
        .unwrap()
});

/// A heading match: byte range of the heading plus what it matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleMatch {
    pub start: usize,
    pub end: usize,
    pub title: &'static str,
    pub format: TitleFormat,
}

/// Find the earliest methodology heading in `text`.
///
/// On equal offsets the first title (then first format) checked wins.
pub fn find_method_title(text: &str) -> Option<TitleMatch> {
    let mut best: Option<TitleMatch> = None;
    for pattern in TITLE_PATTERNS.iter() {
        if let Some(m) = pattern.re.find(text)
            && best.as_ref().is_none_or(|b| m.start() < b.start)
        {
            best = Some(TitleMatch {
                start: m.start(),
                end: m.end(),
                title: pattern.title,
                format: pattern.format,
            });
        }
    }
    best
}

/// Locate the methodology section of `text`.
///
/// Returns `None` when neither a heading nor any paragraph with at least
/// [`MIN_KEYWORD_HITS`] method keywords is found.
pub fn locate(text: &str) -> Option<Section> {
    if let Some(title) = find_method_title(text) {
        let end = section_end(text, title.end);
        tracing::debug!(
            title = title.title,
            start = title.start,
            end,
            "found methodology heading"
        );
        return Some(Section {
            start: title.start,
            end,
            matched_title: Some(text[title.start..title.end].to_string()),
            source_len: text.len(),
            strategy: LocateStrategy::Titled,
            text: text[title.start..end].to_string(),
        });
    }

    tracing::debug!("no methodology heading, scanning paragraphs");
    locate_by_keywords(text)
}

/// Byte offset where the section starting after `title_end` stops.
fn section_end(text: &str, title_end: usize) -> usize {
    let rest = &text[title_end..];
    if let Some(m) = NEXT_SECTION.find(rest)
        && m.start() > 0
    {
        return title_end + m.start();
    }
    rest.char_indices()
        .nth(SECTION_FALLBACK_CHARS)
        .map_or(text.len(), |(i, _)| title_end + i)
}

/// Count distinct method keywords occurring in `paragraph`.
pub fn keyword_score(paragraph: &str) -> usize {
    let lower = paragraph.to_lowercase();
    METHOD_KEYWORDS
        .iter()
        .filter(|kw| lower.contains(*kw))
        .count()
}

fn locate_by_keywords(text: &str) -> Option<Section> {
    let selected: Vec<(usize, usize)> = paragraph_spans(text)
        .filter(|&(s, e)| keyword_score(&text[s..e]) >= MIN_KEYWORD_HITS)
        .collect();

    let (first, last) = (selected.first()?, selected.last()?);
    tracing::debug!(paragraphs = selected.len(), "selected keyword paragraphs");

    let joined = selected
        .iter()
        .map(|&(s, e)| &text[s..e])
        .collect::<Vec<_>>()
        .join(PARAGRAPH_SEPARATOR);

    Some(Section {
        start: first.0,
        end: last.1,
        matched_title: None,
        source_len: text.len(),
        strategy: LocateStrategy::KeywordParagraphs,
        text: joined,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_section_ends_before_next_heading() {
        let text = "1. Introduction\nSome intro text.\n3. Method\nWe used X.\n4. Results\nIt worked.";
        let section = locate(text).unwrap();
        assert_eq!(section.strategy, LocateStrategy::Titled);
        assert_eq!(section.matched_title.as_deref(), Some("3. Method"));
        assert_eq!(section.text(), "3. Method\nWe used X.\n");
        assert_eq!(&text[section.start..section.end], section.text());
        assert!(section.start < section.end && section.end <= section.source_len);
    }

    #[test]
    fn test_section_ends_at_inline_heading() {
        let text = "1. Introduction Some intro text. 3. Method We used X. 4. Results It worked.";
        let section = locate(text).unwrap();
        assert_eq!(section.matched_title.as_deref(), Some("3. Method"));
        assert_eq!(section.text(), "3. Method We used X. ");
    }

    #[test]
    fn test_inline_subsection_does_not_end_section() {
        let text = "2. Method 2.1 Participants Twelve people. 2.2 Procedure Tasks. 3. Results Ok.";
        let section = locate(text).unwrap();
        assert_eq!(
            section.text(),
            "2. Method 2.1 Participants Twelve people. 2.2 Procedure Tasks. "
        );
    }

    #[test]
    fn test_roman_heading_and_roman_end() {
        let text = "I. Introduction\nContext.\nII. Methodology\nWe surveyed people.\nIII. Findings\nDone.";
        let section = locate(text).unwrap();
        assert_eq!(section.matched_title.as_deref(), Some("II. Methodology"));
        assert!(section.text().ends_with("We surveyed people.\n"));
    }

    #[test]
    fn test_chapter_heading_ends_section() {
        let text = "Overview\n\nResearch Design\nA mixed design.\nChapter 4: Analysis\nMore.";
        let section = locate(text).unwrap();
        assert_eq!(section.matched_title.as_deref(), Some("Research Design"));
        assert_eq!(section.text(), "Research Design\nA mixed design.\n");
    }

    #[test]
    fn test_subsection_numbers_do_not_end_section() {
        let text = "2. Method\n2.1 Participants\nTwelve people.\n3. Results\nOk.";
        let section = locate(text).unwrap();
        assert!(section.text().contains("2.1 Participants"));
        assert!(!section.text().contains("Results"));
    }

    #[test]
    fn test_earliest_title_wins() {
        let text = "We describe the study design first.\n\n5. Method\nDetails.";
        let title = find_method_title(text).unwrap();
        assert_eq!(title.title, "study design");
        assert_eq!(title.format, TitleFormat::Bare);
    }

    #[test]
    fn test_numbered_format_preferred_over_bare_at_heading() {
        let title = find_method_title("3. Method\ntext").unwrap();
        assert_eq!(title.start, 0);
        assert_eq!(title.format, TitleFormat::Numbered);
    }

    #[test]
    fn test_bare_match_requires_word_boundary() {
        assert!(find_method_title("methodical thinking").is_none());
        let title = find_method_title("a methodology note").unwrap();
        assert_eq!(title.title, "methodology");
    }

    #[test]
    fn test_case_insensitive_title() {
        let title = find_method_title("MATERIALS AND METHODS\n...").unwrap();
        assert_eq!(title.title, "materials and methods");
    }

    #[test]
    fn test_chinese_title() {
        let text = "引言\n背景介绍。\n研究方法\n我们采用问卷调查。";
        let section = locate(text).unwrap();
        // "方法" is checked before "研究方法" but starts two chars later.
        assert_eq!(section.matched_title.as_deref(), Some("研究方法"));
        assert!(section.text().contains("问卷调查"));
    }

    #[test]
    fn test_without_next_heading_caps_at_fallback_length() {
        let body = "z".repeat(SECTION_FALLBACK_CHARS + 500);
        let text = format!("Method\n{body}");
        let section = locate(&text).unwrap();
        assert_eq!(section.end, "Method".len() + SECTION_FALLBACK_CHARS);

        let short = "Method\nshort body";
        let section = locate(short).unwrap();
        assert_eq!(section.end, short.len());
    }

    #[test]
    fn test_keyword_fallback_selects_scoring_paragraphs() {
        let text = concat!(
            "Intro paragraph about nothing in particular.\n\n",
            "Each participant completed a survey and an interview.\n\n",
            "A closing remark.\n\n",
            "The questionnaire sample was used for statistical analysis."
        );
        let section = locate(text).unwrap();
        assert_eq!(section.strategy, LocateStrategy::KeywordParagraphs);
        assert!(section.matched_title.is_none());
        assert_eq!(
            section.text(),
            "Each participant completed a survey and an interview.\n\nThe questionnaire sample was used for statistical analysis."
        );
        assert!(section.start < section.end);
    }

    #[test]
    fn test_keyword_score_counts_distinct_hits() {
        assert_eq!(keyword_score("survey survey survey"), 1);
        // "statistical analysis" also contains "analysis".
        assert_eq!(keyword_score("Statistical Analysis"), 2);
        assert_eq!(keyword_score("参与者完成了问卷调查"), 3);
    }

    #[test]
    fn test_nothing_found() {
        assert!(locate("Just a story.\n\nWith two paragraphs.").is_none());
    }
}
