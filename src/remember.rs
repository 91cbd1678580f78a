//! Laying an engram's schema down into the cue graph

use crate::network::Network;
use crate::types::{Engram, EngramId};
use crate::weight::{WeightContext, WeightStrategy};
use serde::Serialize;

/// One edge written by `remember`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CueUpdate {
    pub from: String,
    pub to: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RememberOutcome {
    pub engram_id: EngramId,
    /// False when the id was already in the store
    pub stored: bool,
    pub cue_updates: Vec<CueUpdate>,
}

/// Upsert a Cue for every schema word, link consecutive words, and index
/// the engram under each word.
pub fn apply_schema(
    network: &mut Network,
    engram: &Engram,
    strategy: &dyn WeightStrategy,
) -> Vec<CueUpdate> {
    let words: Vec<&str> = engram.concepts().collect();

    for word in &words {
        network.add_memory(word, &engram.id);
    }

    let mut updates = Vec::with_capacity(words.len().saturating_sub(1));
    for (i, pair) in words.windows(2).enumerate() {
        let (from, to) = (pair[0], pair[1]);
        if from == to {
            continue;
        }
        let weight = strategy.calculate(&WeightContext {
            source: from,
            target: to,
            position: i + 1,
            timestamp: engram.timestamp,
            strength: Some(engram.strength),
        });
        network.add_edge(from, to, weight);
        updates.push(CueUpdate {
            from: from.to_string(),
            to: to.to_string(),
            weight,
        });
    }
    updates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EngramType;
    use crate::weight::{SimpleWeightStrategy, TimeBasedWeightStrategy};

    #[test]
    fn test_repeated_schemas_reuse_the_same_cue() {
        let mut network = Network::new();
        let strategy = SimpleWeightStrategy::default();

        apply_schema(&mut network, &Engram::new("1", ["x", "y"], EngramType::Atomic), &strategy);
        let first = network.cue_id("x").unwrap();

        apply_schema(&mut network, &Engram::new("2", ["x", "y"], EngramType::Atomic), &strategy);
        apply_schema(&mut network, &Engram::new("3", ["x", "z"], EngramType::Atomic), &strategy);

        assert_eq!(network.cue_id("x"), Some(first));
        assert_eq!(network.len(), 3);

        let x = network.cue("x").unwrap();
        assert_eq!(x.out_degree(), 2);
        assert_eq!(x.memories().len(), 3);
    }

    #[test]
    fn test_positions_follow_target_index() {
        let mut network = Network::new();
        let strategy = SimpleWeightStrategy::default();
        let updates = apply_schema(
            &mut network,
            &Engram::new("c", ["a", "b", "c"], EngramType::Atomic),
            &strategy,
        );

        assert_eq!(updates.len(), 2);
        assert!((updates[0].weight - 0.9).abs() < 1e-12);
        assert!((updates[1].weight - 0.81).abs() < 1e-12);
    }

    #[test]
    fn test_later_remember_overwrites_weight() {
        let mut network = Network::new();
        let strategy = TimeBasedWeightStrategy::default();
        let early = Engram::new("1", ["a", "b"], EngramType::Atomic);
        let late = Engram::new("2", ["a", "b"], EngramType::Atomic)
            .with_timestamp(early.timestamp + chrono::Duration::hours(1));

        apply_schema(&mut network, &early, &strategy);
        let updates = apply_schema(&mut network, &late, &strategy);

        let b = network.cue_id("b").unwrap();
        assert_eq!(network.cue("a").unwrap().weight_to(b), Some(updates[0].weight));
    }

    #[test]
    fn test_self_pairs_and_blank_words_add_no_edges() {
        let mut network = Network::new();
        let strategy = SimpleWeightStrategy::default();
        let updates = apply_schema(
            &mut network,
            &Engram::new("c", ["a", "a", " ", "b"], EngramType::Atomic),
            &strategy,
        );

        assert_eq!(updates.len(), 1);
        assert_eq!(network.len(), 2);
        assert_eq!(network.cue("a").unwrap().out_degree(), 1);
    }
}
