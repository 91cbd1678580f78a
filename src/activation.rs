//! Activation spreading strategies and their parameter presets
//!
//! The hippocampal strategy samples the strongest few out-edges of a node,
//! grants hubs a larger energy budget so they are not starved by fan-out,
//! rewards frequently recalled targets, and damps everything as more nodes
//! light up (lateral inhibition).

use crate::context::ActivationContext;
use crate::network::CueId;
use serde::{Deserialize, Deserializer, Serialize};

/// Numeric knobs of the hippocampal algorithm
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivationParams {
    /// Minimum energy for a node to fire and for an edge to transmit
    pub firing_threshold: f64,
    /// Fraction of a node's budget that crosses its synapses
    pub synaptic_decay: f64,
    pub inhibition_factor: f64,
    pub max_cycles: u32,
    /// Per-cycle multiplier on pooled energy
    pub cycle_decay: f64,
    pub frequency_boost: f64,
}

impl Default for ActivationParams {
    fn default() -> Self {
        ActivationPreset::BALANCED.params
    }
}

/// Activation parameters plus the candidate/result caps that go with them
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivationPreset {
    pub params: ActivationParams,
    pub max_activations: usize,
    pub max_candidates: usize,
    pub total_limit: usize,
}

impl ActivationPreset {
    /// Broad, associative exploration
    pub const CREATIVE: ActivationPreset = ActivationPreset {
        params: ActivationParams {
            firing_threshold: 0.05,
            synaptic_decay: 0.95,
            inhibition_factor: 0.05,
            max_cycles: 15,
            cycle_decay: 0.95,
            frequency_boost: 0.05,
        },
        max_activations: 200,
        max_candidates: 300,
        total_limit: 80,
    };

    pub const BALANCED: ActivationPreset = ActivationPreset {
        params: ActivationParams {
            firing_threshold: 0.1,
            synaptic_decay: 0.9,
            inhibition_factor: 0.1,
            max_cycles: 10,
            cycle_decay: 0.9,
            frequency_boost: 0.1,
        },
        max_activations: 100,
        max_candidates: 200,
        total_limit: 50,
    };

    /// Tight, precise retrieval close to the query
    pub const FOCUSED: ActivationPreset = ActivationPreset {
        params: ActivationParams {
            firing_threshold: 0.2,
            synaptic_decay: 0.8,
            inhibition_factor: 0.2,
            max_cycles: 6,
            cycle_decay: 0.8,
            frequency_boost: 0.2,
        },
        max_activations: 50,
        max_candidates: 100,
        total_limit: 30,
    };
}

/// Named preset selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecallMode {
    Creative,
    #[default]
    Balanced,
    Focused,
}

impl RecallMode {
    /// Parse a mode name. Unknown names fall back to Balanced.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "creative" => RecallMode::Creative,
            "balanced" => RecallMode::Balanced,
            "focused" => RecallMode::Focused,
            other => {
                tracing::warn!("Unknown recall mode '{}', falling back to balanced", other);
                RecallMode::Balanced
            }
        }
    }

    pub fn preset(&self) -> ActivationPreset {
        match self {
            RecallMode::Creative => ActivationPreset::CREATIVE,
            RecallMode::Balanced => ActivationPreset::BALANCED,
            RecallMode::Focused => ActivationPreset::FOCUSED,
        }
    }
}

impl<'de> Deserialize<'de> for RecallMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(RecallMode::from_name(&name))
    }
}

impl std::fmt::Display for RecallMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecallMode::Creative => write!(f, "creative"),
            RecallMode::Balanced => write!(f, "balanced"),
            RecallMode::Focused => write!(f, "focused"),
        }
    }
}

/// An edge that fired, carrying the energy it delivers
#[derive(Debug, Clone, PartialEq)]
pub struct FiredEdge {
    pub target: String,
    pub weight: f64,
    pub energy: f64,
}

pub trait ActivationStrategy: Send + Sync + std::fmt::Debug {
    /// Edges out of `ctx.source_cue` that fire given `ctx.current_energy`
    fn activate(&self, ctx: &ActivationContext<'_>) -> Vec<FiredEdge>;

    fn should_continue(&self, ctx: &ActivationContext<'_>) -> bool;

    /// Age the energy pool by one cycle
    fn apply_decay(&self, ctx: &mut ActivationContext<'_>);

    fn firing_threshold(&self) -> f64;
}

/// Pooled energy below this is forgotten
const ENERGY_FLOOR: f64 = 0.01;
const MIN_SAMPLED_EDGES: usize = 3;
const MAX_SAMPLED_EDGES: usize = 8;
const HUB_COMPENSATION: f64 = 0.3;
const INHIBITION_SCALE: f64 = 200.0;
const MIN_INHIBITION: f64 = 0.5;

#[derive(Debug, Clone, Default)]
pub struct HippocampalActivation {
    pub params: ActivationParams,
}

impl HippocampalActivation {
    pub fn new(params: ActivationParams) -> Self {
        Self { params }
    }

    /// How many of `degree` edges get sampled
    pub fn sample_size(degree: usize) -> usize {
        let log = ((degree + 1) as f64).log2().ceil() as usize;
        log.max(MIN_SAMPLED_EDGES).min(MAX_SAMPLED_EDGES)
    }

    pub fn hub_compensation(degree: usize) -> f64 {
        1.0 + (1.0 + degree as f64).ln() * HUB_COMPENSATION
    }

    pub fn inhibition(&self, activated: usize) -> f64 {
        (1.0 - self.params.inhibition_factor * activated as f64 / INHIBITION_SCALE)
            .max(MIN_INHIBITION)
    }
}

impl ActivationStrategy for HippocampalActivation {
    fn activate(&self, ctx: &ActivationContext<'_>) -> Vec<FiredEdge> {
        let threshold = self.params.firing_threshold;
        if ctx.current_energy < threshold {
            return Vec::new();
        }
        let Some(source) = ctx.source_cue else {
            return Vec::new();
        };

        let network = ctx.network();
        let mut edges: Vec<(CueId, f64)> = network.cue_by_id(source).connections().collect();
        let degree = edges.len();
        if degree == 0 {
            return Vec::new();
        }

        // Stable sort: equal weights keep arena order
        edges.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        edges.truncate(Self::sample_size(degree));

        let available = ctx.current_energy * Self::hub_compensation(degree);
        let per_edge = available * self.params.synaptic_decay / edges.len().max(1) as f64;
        let inhibition = self.inhibition(ctx.activated_count());

        edges
            .into_iter()
            .filter_map(|(target, weight)| {
                let cue = network.cue_by_id(target);
                let freq_bonus =
                    1.0 + (1.0 + cue.recall_frequency() as f64).ln() * self.params.frequency_boost;
                let energy = per_edge * freq_bonus * inhibition;
                (energy >= threshold && !ctx.is_activated(cue.word())).then(|| FiredEdge {
                    target: cue.word().to_string(),
                    weight,
                    energy,
                })
            })
            .collect()
    }

    fn should_continue(&self, ctx: &ActivationContext<'_>) -> bool {
        if ctx.cycle >= self.params.max_cycles {
            return false;
        }
        ctx.energy_pool
            .values()
            .any(|e| *e >= self.params.firing_threshold)
    }

    fn apply_decay(&self, ctx: &mut ActivationContext<'_>) {
        let decay = self.params.cycle_decay;
        ctx.energy_pool.retain(|_, energy| {
            *energy *= decay;
            *energy >= ENERGY_FLOOR
        });
    }

    fn firing_threshold(&self) -> f64 {
        self.params.firing_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;

    fn two_edge_network() -> Network {
        let mut network = Network::new();
        network.add_edge("A", "B", 5.0);
        network.add_edge("A", "C", 1.0);
        network
    }

    #[test]
    fn test_sample_size_bounds() {
        assert_eq!(HippocampalActivation::sample_size(1), 3);
        assert_eq!(HippocampalActivation::sample_size(2), 3);
        assert_eq!(HippocampalActivation::sample_size(15), 4);
        assert_eq!(HippocampalActivation::sample_size(100), 7);
        assert_eq!(HippocampalActivation::sample_size(10_000), 8);
    }

    #[test]
    fn test_both_edges_fire_from_full_energy() {
        let network = two_edge_network();
        let strategy = HippocampalActivation::default();
        let mut ctx = ActivationContext::new(&network);
        ctx.activate("A");
        ctx.focus("A", 1.0);

        let fired = strategy.activate(&ctx);
        let targets: Vec<&str> = fired.iter().map(|f| f.target.as_str()).collect();
        assert_eq!(targets, vec!["B", "C"]);

        // 1.0 * (1 + ln 3 * 0.3) * 0.9 / 2, inhibited by one active node
        let expected = (1.0 + 3f64.ln() * 0.3) * 0.9 / 2.0 * (1.0 - 0.1 / 200.0);
        assert!((fired[0].energy - expected).abs() < 1e-9);
    }

    #[test]
    fn test_below_threshold_does_not_fire() {
        let network = two_edge_network();
        let strategy = HippocampalActivation::default();
        let mut ctx = ActivationContext::new(&network);
        ctx.focus("A", 0.05);
        assert!(strategy.activate(&ctx).is_empty());
    }

    #[test]
    fn test_activated_targets_are_skipped() {
        let network = two_edge_network();
        let strategy = HippocampalActivation::default();
        let mut ctx = ActivationContext::new(&network);
        ctx.activate("B");
        ctx.focus("A", 1.0);

        let fired = strategy.activate(&ctx);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].target, "C");
    }

    #[test]
    fn test_only_top_k_edges_sampled() {
        let mut network = Network::new();
        for i in 0..20 {
            network.add_edge("hub", &format!("t{i:02}"), i as f64);
        }
        let strategy = HippocampalActivation::new(ActivationParams {
            firing_threshold: 0.0,
            ..Default::default()
        });
        let mut ctx = ActivationContext::new(&network);
        ctx.focus("hub", 1.0);

        let fired = strategy.activate(&ctx);
        // ceil(log2(21)) = 5
        assert_eq!(fired.len(), 5);
        assert_eq!(fired[0].target, "t19");
        assert_eq!(fired[4].target, "t15");
    }

    #[test]
    fn test_frequency_bonus_boosts_energy() {
        let mut network = two_edge_network();
        network.update_recall_frequency(["C"]);
        let strategy = HippocampalActivation::default();
        let mut ctx = ActivationContext::new(&network);
        ctx.focus("A", 1.0);

        let fired = strategy.activate(&ctx);
        let b = fired.iter().find(|f| f.target == "B").unwrap();
        let c = fired.iter().find(|f| f.target == "C").unwrap();
        assert!(c.energy > b.energy);
    }

    #[test]
    fn test_inhibition_floor() {
        let strategy = HippocampalActivation::default();
        assert_eq!(strategy.inhibition(0), 1.0);
        assert_eq!(strategy.inhibition(1_000_000), 0.5);
    }

    #[test]
    fn test_decay_shrinks_and_prunes() {
        let network = Network::new();
        let strategy = HippocampalActivation::default();
        let mut ctx = ActivationContext::new(&network);
        ctx.set_energy("a", 0.5);
        ctx.set_energy("b", 0.011);

        strategy.apply_decay(&mut ctx);
        assert!((ctx.energy("a") - 0.45).abs() < 1e-12);
        assert!(!ctx.energy_pool.contains_key("b"));
        assert!(ctx.energy_pool.values().all(|e| *e >= 0.01));
    }

    #[test]
    fn test_should_continue() {
        let network = Network::new();
        let strategy = HippocampalActivation::default();
        let mut ctx = ActivationContext::new(&network);
        assert!(!strategy.should_continue(&ctx));

        ctx.set_energy("a", 0.5);
        assert!(strategy.should_continue(&ctx));

        ctx.cycle = strategy.params.max_cycles;
        assert!(!strategy.should_continue(&ctx));

        ctx.cycle = 0;
        ctx.set_energy("a", 0.05);
        assert!(!strategy.should_continue(&ctx));
    }

    #[test]
    fn test_unknown_mode_falls_back_to_balanced() {
        assert_eq!(RecallMode::from_name("Focused"), RecallMode::Focused);
        assert_eq!(RecallMode::from_name("wild"), RecallMode::Balanced);

        let mode: RecallMode = serde_json::from_str("\"creative\"").unwrap();
        assert_eq!(mode, RecallMode::Creative);
        let mode: RecallMode = serde_json::from_str("\"nonsense\"").unwrap();
        assert_eq!(mode, RecallMode::Balanced);
    }
}
