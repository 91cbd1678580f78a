//! Two-phase recall
//!
//! Phase one spreads activation across the cue graph and gathers every
//! engram indexed under an activated concept. Phase two scores those
//! candidates on type, relevance, strength and age, then trims them with
//! per-type quotas and an overall cap.

use crate::activation::{ActivationPreset, HippocampalActivation, RecallMode};
use crate::mind::Mind;
use crate::network::Network;
use crate::recall::Recall;
use crate::storage_backend::EngramStorage;
use crate::types::{Engram, EngramType, RankedEngram, ScoreBreakdown};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Concurrent concept loads during phase one
const LOAD_CONCURRENCY: usize = 8;

/// What to recall from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecallQuery {
    /// No query: start from the strongest hubs (default mode network)
    Prime,
    /// Free text; the best-connected token becomes the single center
    Text(String),
    /// Explicit centers, used as given
    Words(Vec<String>),
}

impl RecallQuery {
    /// Tokens used for the textual relevance fallback
    pub fn tokens(&self) -> Vec<String> {
        match self {
            RecallQuery::Prime => Vec::new(),
            RecallQuery::Text(text) => text.split_whitespace().map(str::to_string).collect(),
            RecallQuery::Words(words) => words.clone(),
        }
    }
}

impl From<&str> for RecallQuery {
    fn from(text: &str) -> Self {
        RecallQuery::Text(text.to_string())
    }
}

impl From<String> for RecallQuery {
    fn from(text: String) -> Self {
        RecallQuery::Text(text)
    }
}

impl From<Vec<String>> for RecallQuery {
    fn from(words: Vec<String>) -> Self {
        RecallQuery::Words(words)
    }
}

impl From<&[&str]> for RecallQuery {
    fn from(words: &[&str]) -> Self {
        RecallQuery::Words(words.iter().map(|w| w.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for RecallQuery {
    fn from(words: [&str; N]) -> Self {
        RecallQuery::Words(words.iter().map(|w| w.to_string()).collect())
    }
}

impl From<Option<&str>> for RecallQuery {
    fn from(text: Option<&str>) -> Self {
        text.map(RecallQuery::from).unwrap_or(RecallQuery::Prime)
    }
}

/// One value per engram type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TypeTable<T> {
    pub pattern: T,
    pub link: T,
    pub atomic: T,
}

impl<T: Copy> TypeTable<T> {
    pub fn get(&self, engram_type: EngramType) -> T {
        match engram_type {
            EngramType::Pattern => self.pattern,
            EngramType::Link => self.link,
            EngramType::Atomic => self.atomic,
        }
    }
}

/// Mix of the four scoring axes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightFactors {
    #[serde(rename = "type")]
    pub type_weight: f64,
    pub relevance: f64,
    pub strength: f64,
    pub temporal: f64,
}

impl Default for WeightFactors {
    fn default() -> Self {
        Self {
            type_weight: 0.3,
            relevance: 0.4,
            strength: 0.2,
            temporal: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecallOptions {
    pub mode: RecallMode,
    /// Overrides the preset's activation cap
    pub max_activations: Option<usize>,
    /// Overrides the preset's phase-one candidate cap
    pub max_candidates: Option<usize>,
    /// Overrides the preset's result cap
    pub total_limit: Option<usize>,
    pub type_weights: TypeTable<f64>,
    pub type_quotas: TypeTable<usize>,
    pub weight_factors: WeightFactors,
    /// Age (days) over which the temporal score falls by 1/e
    pub temporal_decay: f64,
    /// Hub count used as centers in prime mode
    pub dmn_centers: usize,
    /// Load engrams for activated concepts
    pub load_engrams: bool,
    /// Fill slots left unused by the quotas from the overflow, up to the
    /// total limit. While this is on the per-type quotas are soft: a type
    /// can end up above its quota when other types leave room. Turn it off
    /// for hard quotas.
    pub backfill: bool,
}

impl Default for RecallOptions {
    fn default() -> Self {
        Self {
            mode: RecallMode::Balanced,
            max_activations: None,
            max_candidates: None,
            total_limit: None,
            type_weights: TypeTable {
                pattern: 2.0,
                link: 1.5,
                atomic: 1.0,
            },
            type_quotas: TypeTable {
                pattern: 10,
                link: 15,
                atomic: 25,
            },
            weight_factors: WeightFactors::default(),
            temporal_decay: 30.0,
            dmn_centers: 5,
            load_engrams: true,
            backfill: true,
        }
    }
}

impl RecallOptions {
    pub fn with_mode(mut self, mode: RecallMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_total_limit(mut self, limit: usize) -> Self {
        self.total_limit = Some(limit);
        self
    }

    pub fn with_type_quotas(mut self, quotas: TypeTable<usize>) -> Self {
        self.type_quotas = quotas;
        self
    }

    pub fn with_backfill(mut self, backfill: bool) -> Self {
        self.backfill = backfill;
        self
    }

    pub fn preset(&self) -> ActivationPreset {
        self.mode.preset()
    }

    pub fn effective_total_limit(&self) -> usize {
        self.total_limit.unwrap_or(self.preset().total_limit)
    }

    pub fn effective_max_activations(&self) -> usize {
        self.max_activations
            .unwrap_or(self.preset().max_activations)
    }

    pub fn effective_max_candidates(&self) -> usize {
        self.max_candidates.unwrap_or(self.preset().max_candidates)
    }
}

pub struct TwoPhaseRecall<'o> {
    options: &'o RecallOptions,
}

impl<'o> TwoPhaseRecall<'o> {
    pub fn new(options: &'o RecallOptions) -> Self {
        Self { options }
    }

    /// Turn a query into center words; empty means nothing to recall from
    pub fn resolve_centers(&self, network: &Network, query: &RecallQuery) -> Vec<String> {
        match query {
            RecallQuery::Prime => dmn_centers(network, self.options.dmn_centers),
            RecallQuery::Words(words) => words.clone(),
            RecallQuery::Text(text) => {
                let mut best: Option<(&str, usize)> = None;
                for token in text.split_whitespace() {
                    let Some(cue) = network.cue(token) else {
                        continue;
                    };
                    if best.map_or(true, |(_, d)| cue.out_degree() > d) {
                        best = Some((token, cue.out_degree()));
                    }
                }
                best.map(|(t, _)| vec![t.to_string()]).unwrap_or_default()
            }
        }
    }

    /// Phase one, graph half: spread from the centers
    pub fn spread(&self, network: &Network, centers: &[String]) -> Option<Mind> {
        let strategy = HippocampalActivation::new(self.options.preset().params);
        Recall::new(&strategy)
            .with_max_activations(self.options.effective_max_activations())
            .execute(network, centers)
    }

    /// Phase one, storage half: engrams for every activated concept,
    /// shallowest concepts first, de-duplicated by id. A concept whose load
    /// fails is skipped.
    pub async fn load_candidates(
        &self,
        storage: &dyn EngramStorage,
        mind: &Mind,
    ) -> Vec<RankedEngram> {
        if !self.options.load_engrams {
            return Vec::new();
        }

        let words: Vec<String> = mind
            .activated_by_depth()
            .into_iter()
            .map(|(w, _)| w.to_string())
            .collect();

        let loads: Vec<(String, Vec<Engram>)> = stream::iter(words)
            .map(|word| async move {
                match storage.get_by_word(&word).await {
                    Ok(engrams) => (word, engrams),
                    Err(e) => {
                        tracing::warn!("Failed to load engrams for '{}': {}", word, e);
                        (word, Vec::new())
                    }
                }
            })
            .buffered(LOAD_CONCURRENCY)
            .collect()
            .await;

        let cap = self.options.effective_max_candidates();
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        'outer: for (word, engrams) in loads {
            for engram in engrams {
                if candidates.len() >= cap {
                    break 'outer;
                }
                if seen.insert(engram.id.clone()) {
                    candidates.push(RankedEngram::candidate(engram, word.clone()));
                }
            }
        }
        candidates
    }

    /// Phase two: score, sort, apply quotas
    pub fn rank(
        &self,
        mut candidates: Vec<RankedEngram>,
        mind: &Mind,
        query_tokens: &[String],
        now: DateTime<Utc>,
    ) -> Vec<RankedEngram> {
        for candidate in &mut candidates {
            let scores = self.score(candidate, mind, query_tokens, now);
            let f = &self.options.weight_factors;
            candidate.weight = f.type_weight * scores.type_score
                + f.relevance * scores.relevance
                + f.strength * scores.strength
                + f.temporal * scores.temporal;
            candidate.scores = scores;
        }
        sort_by_weight(&mut candidates);
        self.apply_quotas(candidates)
    }

    fn score(
        &self,
        candidate: &RankedEngram,
        mind: &Mind,
        query_tokens: &[String],
        now: DateTime<Utc>,
    ) -> ScoreBreakdown {
        let engram = &candidate.engram;

        let relevance = match mind.depth(&candidate.activated_by) {
            Some(depth) => 1.0 / (1.0 + depth as f64 * 0.2),
            None => token_overlap(&engram.schema, query_tokens),
        };

        let age_days = ((now - engram.timestamp).num_seconds().max(0) as f64) / 86_400.0;
        let temporal = (-age_days / self.options.temporal_decay.max(f64::EPSILON)).exp();

        ScoreBreakdown {
            type_score: self.options.type_weights.get(engram.engram_type),
            relevance,
            strength: engram.strength as f64,
            temporal,
        }
    }

    /// Quota pass over score-ordered input, then optional backfill
    fn apply_quotas(&self, sorted: Vec<RankedEngram>) -> Vec<RankedEngram> {
        let total = self.options.effective_total_limit();
        let quotas = &self.options.type_quotas;
        let mut counts = TypeTable {
            pattern: 0usize,
            link: 0,
            atomic: 0,
        };

        let mut selected = Vec::new();
        let mut overflow = Vec::new();
        for candidate in sorted {
            let t = candidate.engram.engram_type;
            if selected.len() < total && counts.get(t) < quotas.get(t) {
                match t {
                    EngramType::Pattern => counts.pattern += 1,
                    EngramType::Link => counts.link += 1,
                    EngramType::Atomic => counts.atomic += 1,
                }
                selected.push(candidate);
            } else {
                overflow.push(candidate);
            }
        }

        if self.options.backfill {
            let room = total.saturating_sub(selected.len());
            selected.extend(overflow.into_iter().take(room));
            sort_by_weight(&mut selected);
        }
        selected
    }
}

/// Top `n` concepts by out-degree, ties in encounter order
fn dmn_centers(network: &Network, n: usize) -> Vec<String> {
    let mut hubs: Vec<(&str, usize)> = network
        .cues()
        .filter(|(_, cue)| cue.out_degree() > 0)
        .map(|(_, cue)| (cue.word(), cue.out_degree()))
        .collect();
    hubs.sort_by(|a, b| b.1.cmp(&a.1));
    hubs.into_iter().take(n).map(|(w, _)| w.to_string()).collect()
}

/// Fraction of schema words containing any query token, capped at 1
fn token_overlap(schema: &[String], tokens: &[String]) -> f64 {
    if schema.is_empty() || tokens.is_empty() {
        return 0.0;
    }
    let tokens: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();
    let hits = schema
        .iter()
        .filter(|word| {
            let word = word.to_lowercase();
            tokens.iter().any(|t| !t.is_empty() && word.contains(t.as_str()))
        })
        .count();
    (hits as f64 / schema.len() as f64).min(1.0)
}

fn sort_by_weight(items: &mut [RankedEngram]) {
    items.sort_by(|a, b| {
        b.weight
            .partial_cmp(&a.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
