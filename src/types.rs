//! Engram types and recall result records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for engrams
pub type EngramId = String;

/// Default importance for a freshly created engram
pub const DEFAULT_STRENGTH: f32 = 0.8;

/// Strength assumed when ranking a record that carries none
pub const FALLBACK_STRENGTH: f32 = 0.5;

/// One stored experience: raw content plus the concept path it lays down
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Engram {
    /// Unique identifier (`<millis>_<random>`)
    pub id: EngramId,
    /// The raw experience text
    pub content: String,
    /// Ordered concept words; consecutive pairs become graph edges
    pub schema: Vec<String>,
    /// Importance (0.0 - 1.0)
    #[serde(default = "default_strength")]
    pub strength: f32,
    /// Kind of engram
    #[serde(rename = "type", default)]
    pub engram_type: EngramType,
    /// When the experience happened
    pub timestamp: DateTime<Utc>,
}

fn default_strength() -> f32 {
    DEFAULT_STRENGTH
}

impl Engram {
    /// Create a new engram with a fresh id and the current time
    pub fn new<S: Into<String>>(
        content: impl Into<String>,
        schema: impl IntoIterator<Item = S>,
        engram_type: EngramType,
    ) -> Self {
        let timestamp = Utc::now();
        Self {
            id: generate_id(timestamp),
            content: content.into(),
            schema: schema.into_iter().map(Into::into).collect(),
            strength: DEFAULT_STRENGTH,
            engram_type,
            timestamp,
        }
    }

    /// Set custom strength
    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength.clamp(0.0, 1.0);
        self
    }

    /// Set the timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set an explicit id
    pub fn with_id(mut self, id: impl Into<EngramId>) -> Self {
        self.id = id.into();
        self
    }

    /// Schema words with blanks removed and surrounding whitespace trimmed
    pub fn concepts(&self) -> impl Iterator<Item = &str> {
        self.schema
            .iter()
            .map(|w| w.trim())
            .filter(|w| !w.is_empty())
    }

    /// Whether the schema contains `word` exactly
    pub fn mentions(&self, word: &str) -> bool {
        self.concepts().any(|w| w == word)
    }

    /// Day bucket (`YYYY-MM-DD`) used by the day index
    pub fn day_bucket(&self) -> String {
        self.timestamp.date_naive().format("%Y-%m-%d").to_string()
    }
}

/// Time + randomness, e.g. `1718000000000_9f86d081`
pub fn generate_id(at: DateTime<Utc>) -> EngramId {
    let random = Uuid::new_v4().simple().to_string();
    format!("{}_{}", at.timestamp_millis(), &random[..8])
}

/// Kinds of engrams
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum EngramType {
    /// A single concrete fact or event
    #[default]
    Atomic,
    /// A relation between concepts
    Link,
    /// An abstracted, reusable pattern
    Pattern,
}

impl EngramType {
    /// Parse a stored type name; anything unrecognised is treated as ATOMIC
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "LINK" => EngramType::Link,
            "PATTERN" => EngramType::Pattern,
            _ => EngramType::Atomic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EngramType::Atomic => "ATOMIC",
            EngramType::Link => "LINK",
            EngramType::Pattern => "PATTERN",
        }
    }
}

impl std::fmt::Display for EngramType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-axis breakdown of a fine-ranking score
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoreBreakdown {
    #[serde(rename = "type")]
    pub type_score: f64,
    pub relevance: f64,
    pub strength: f64,
    pub temporal: f64,
}

/// Engram surfaced by a recall, annotated with how it got there
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedEngram {
    #[serde(flatten)]
    pub engram: Engram,
    /// Concept whose activation surfaced this engram
    #[serde(rename = "activatedBy")]
    pub activated_by: String,
    /// Composite fine-ranking score
    #[serde(rename = "_weight")]
    pub weight: f64,
    /// Components of the composite score
    #[serde(rename = "_scores")]
    pub scores: ScoreBreakdown,
}

impl RankedEngram {
    /// Candidate fresh out of phase one, not yet scored
    pub fn candidate(engram: Engram, activated_by: impl Into<String>) -> Self {
        Self {
            engram,
            activated_by: activated_by.into(),
            weight: 0.0,
            scores: ScoreBreakdown::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_engram_defaults() {
        let engram = Engram::new("went hiking", ["hiking", "mountain"], EngramType::Atomic);
        assert_eq!(engram.strength, DEFAULT_STRENGTH);
        assert_eq!(engram.schema, vec!["hiking", "mountain"]);

        let (millis, random) = engram.id.split_once('_').unwrap();
        assert_eq!(millis.parse::<i64>().unwrap(), engram.timestamp.timestamp_millis());
        assert_eq!(random.len(), 8);
    }

    #[test]
    fn test_strength_is_clamped() {
        let engram = Engram::new("x", ["a"], EngramType::Link).with_strength(3.0);
        assert_eq!(engram.strength, 1.0);
    }

    #[test]
    fn test_type_parse_defaults_to_atomic() {
        assert_eq!(EngramType::parse("PATTERN"), EngramType::Pattern);
        assert_eq!(EngramType::parse("link"), EngramType::Link);
        assert_eq!(EngramType::parse(""), EngramType::Atomic);
        assert_eq!(EngramType::parse("bogus"), EngramType::Atomic);
    }

    #[test]
    fn test_missing_type_deserializes_as_atomic() {
        let json = r#"{"id":"1_a","content":"c","schema":["a"],"timestamp":"2024-05-01T10:00:00Z"}"#;
        let engram: Engram = serde_json::from_str(json).unwrap();
        assert_eq!(engram.engram_type, EngramType::Atomic);
        assert_eq!(engram.strength, DEFAULT_STRENGTH);
        assert_eq!(engram.day_bucket(), "2024-05-01");
    }

    #[test]
    fn test_concepts_skip_blank_words() {
        let engram = Engram::new("c", [" a ", "", "b"], EngramType::Atomic);
        assert_eq!(engram.concepts().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(engram.mentions("a"));
        assert!(!engram.mentions("c"));
    }
}
