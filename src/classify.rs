//! Query classification
//!
//! Maps free-text chat questions onto the intent taxonomy. Classification is
//! a pure, total function: any input normalizes to a query string and lands on
//! exactly one intent, with `General` as the fallback for everything the
//! pattern table does not recognize.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// The closed intent taxonomy for inbound questions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Startups,
    Founders,
    Events,
    People,
    Schedule,
    General,
}

impl Intent {
    /// Every enum value, used by the startup registry totality check
    pub const ALL: [Intent; 6] = [
        Intent::Startups,
        Intent::Founders,
        Intent::Events,
        Intent::People,
        Intent::Schedule,
        Intent::General,
    ];

    /// Stable identifier used in logs and routing tables
    pub fn name(&self) -> &'static str {
        match self {
            Intent::Startups => "startups",
            Intent::Founders => "founders",
            Intent::Events => "events",
            Intent::People => "people",
            Intent::Schedule => "schedule",
            Intent::General => "general",
        }
    }
}

/// Result of classifying one inbound message
#[derive(Debug, Clone)]
pub struct Classification {
    pub raw_text: String,
    pub normalized_query: String,
    pub intent: Intent,
    pub timestamp: DateTime<Utc>,
}

/// Leading courtesy phrases stripped during normalization
static COURTESY_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(can you|could you|would you|will you|please|tell me|show me|do you know|i want to know|i'd like to know|hey|hi|hello)\b[\s,:]*",
    )
    .expect("courtesy prefix pattern is valid")
});

/// Ordered intent pattern table. First intent with any matching pattern wins.
static INTENT_PATTERNS: Lazy<Vec<(Intent, Vec<Regex>)>> = Lazy::new(|| {
    let patterns = |sources: &[&str]| -> Vec<Regex> {
        sources
            .iter()
            .map(|s| Regex::new(&format!("(?i){s}")).expect("intent pattern is valid"))
            .collect()
    };

    vec![
        (
            Intent::Startups,
            patterns(&[
                r"\bstartups?\b",
                r"\bfunding\b",
                r"\braised?\b",
                r"\bventure\b",
                r"\binvestors?\b",
                r"\bcompan(?:y|ies)\b",
            ]),
        ),
        (
            Intent::Founders,
            patterns(&[r"\bco-?founders?\b", r"\bfounders?\b", r"\bceos?\b"]),
        ),
        (
            Intent::Events,
            patterns(&[
                r"\bevents?\b",
                r"\bworkshops?\b",
                r"\bsessions?\b",
                r"\bmeetups?\b",
                r"\btalks?\b",
            ]),
        ),
        (
            Intent::People,
            patterns(&[
                r"\bwho is\b",
                r"\bpeople\b",
                r"\battendees?\b",
                r"\bspeakers?\b",
                r"\bmembers?\b",
            ]),
        ),
        (
            Intent::Schedule,
            patterns(&[
                r"\bschedule\b",
                r"\bagenda\b",
                r"\bwhat time\b",
                r"\btoday\b",
                r"\btomorrow\b",
            ]),
        ),
    ]
});

/// Normalize raw chat text into a query string.
///
/// Trims, collapses internal whitespace, strips leading courtesy phrases
/// (repeatedly, so "can you please tell me" fully disappears), and appends a
/// `?` unless the text already ends in `?` or `.`.
pub fn normalize_query(raw_text: &str) -> String {
    let mut query = raw_text.split_whitespace().collect::<Vec<_>>().join(" ");

    while let Some(found) = COURTESY_PREFIX.find(&query) {
        query = query[found.end()..].to_string();
    }

    if !query.ends_with('?') && !query.ends_with('.') {
        query.push('?');
    }

    query
}

/// Classify an inbound message. Never fails; unmatched input is `General`.
pub fn classify(raw_text: &str) -> Classification {
    let normalized_query = normalize_query(raw_text);

    let intent = INTENT_PATTERNS
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| p.is_match(&normalized_query)))
        .map(|(intent, _)| *intent)
        .unwrap_or(Intent::General);

    Classification {
        raw_text: raw_text.to_string(),
        normalized_query,
        intent,
        timestamp: Utc::now(),
    }
}
