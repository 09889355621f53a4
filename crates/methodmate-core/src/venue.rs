//! Classifying publication venues against a curated top-venue list.
//!
//! Entries are tried in list order and the first entry that matches decides
//! the canonical name. Against each entry the rules are tried in precedence
//! order:
//! 1. exact (case-insensitive) match,
//! 2. known abbreviation pairs,
//! 3. the entry appearing as a space-delimited phrase in the venue.
//!
//! Rule 3 accepts superstrings such as "Design Studies in Earth Science" for
//! the entry "Design Studies". That recall/precision trade-off is intentional
//! and pinned by tests.

/// Default top conferences and journals (full names and abbreviations).
pub const TOP_VENUES: &[&str] = &[
    // Conferences
    "Computer-Supported Cooperative Work",
    "CSCW",
    "Human Factors in Computing Systems",
    "CHI",
    "Pervasive and Ubiquitous Computing",
    "UbiComp",
    "User Interface Software and Technology",
    "UIST",
    // Journals
    "Computers in Human Behavior",
    "CoDesign",
    "Technovation",
    "Design Studies",
    "Journal of Mixed Methods Research",
    "ACM Transactions on Computer-Human Interaction",
    "TOCHI",
    "International Journal of Human-Computer Studies",
    "Design Issues",
    "Human-Computer Interaction",
    "Computer-Aided Design",
    "Applied Ergonomics",
    "International Journal of Design",
    "Human Factors",
    "Leonardo",
    "The Design Journal",
];

/// Abbreviations whose full name may appear anywhere in a venue string
/// (e.g., "Proceedings of the 2023 CHI Conference on Human Factors in Computing Systems").
/// Lowercase; hand-curated.
pub const ABBREVIATIONS: &[(&str, &str)] = &[
    ("cscw", "computer-supported cooperative work"),
    ("chi", "human factors in computing systems"),
    ("ubicomp", "pervasive and ubiquitous computing"),
    ("uist", "user interface software and technology"),
    ("tochi", "transactions on computer-human interaction"),
];

/// Result of classifying one venue string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VenueMatch {
    pub matched: bool,
    pub canonical_name: Option<String>,
}

impl VenueMatch {
    fn hit(name: &str) -> Self {
        Self {
            matched: true,
            canonical_name: Some(name.to_string()),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

/// Rule that produced a match, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    Exact,
    Abbreviation,
    Phrase,
}

/// Classifier over a fixed canonical list.
#[derive(Debug, Clone)]
pub struct VenueClassifier {
    /// (canonical name, lowercased name), in list order.
    entries: Vec<(String, String)>,
}

impl Default for VenueClassifier {
    fn default() -> Self {
        Self::new(TOP_VENUES)
    }
}

impl VenueClassifier {
    pub fn new<S: AsRef<str>>(list: &[S]) -> Self {
        Self {
            entries: list
                .iter()
                .map(|v| {
                    let name = v.as_ref().trim().to_string();
                    let lower = name.to_lowercase();
                    (name, lower)
                })
                .filter(|(name, _)| !name.is_empty())
                .collect(),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Classify `venue`.
    pub fn classify(&self, venue: &str) -> VenueMatch {
        match self.find(venue) {
            Some((name, rule)) => {
                tracing::trace!(venue, canonical = name, ?rule, "top venue");
                VenueMatch::hit(name)
            }
            None => VenueMatch::none(),
        }
    }

    /// Find the matching canonical entry and the rule that matched.
    pub fn find(&self, venue: &str) -> Option<(&str, MatchRule)> {
        let venue = venue.trim().to_lowercase();
        if venue.is_empty() {
            return None;
        }

        let rules: [(MatchRule, fn(&str, &str) -> bool); 3] = [
            (MatchRule::Exact, |v, e| v == e),
            (MatchRule::Abbreviation, abbreviation_match),
            (MatchRule::Phrase, phrase_match),
        ];

        self.entries.iter().find_map(|(name, lower)| {
            rules
                .iter()
                .find(|(_, matches)| matches(&venue, lower))
                .map(|(rule, _)| (name.as_str(), *rule))
        })
    }

    /// The canonical list joined with commas, for search APIs that accept a
    /// venue filter parameter.
    pub fn filter_param(&self) -> String {
        self.entries().collect::<Vec<_>>().join(",")
    }
}

/// `entry` is a known abbreviation and `venue` is that abbreviation or
/// mentions the full name.
fn abbreviation_match(venue: &str, entry: &str) -> bool {
    ABBREVIATIONS
        .iter()
        .find(|(abbr, _)| *abbr == entry)
        .is_some_and(|(abbr, full)| venue == *abbr || venue.contains(full))
}

/// `entry` occurs in `venue` bounded by spaces or the string edges.
fn phrase_match(venue: &str, entry: &str) -> bool {
    venue == entry
        || venue.contains(&format!(" {entry} "))
        || venue.starts_with(&format!("{entry} "))
        || venue.ends_with(&format!(" {entry}"))
}

/// Classify `venue` against `list`. See [`VenueClassifier`].
pub fn is_top_venue<S: AsRef<str>>(venue: &str, list: &[S]) -> VenueMatch {
    VenueClassifier::new(list).classify(venue)
}
