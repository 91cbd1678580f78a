//! Recall driver: runs activation spreading to convergence

use crate::activation::ActivationStrategy;
use crate::context::{ActivationContext, Connection};
use crate::mind::{Mind, SEED_DEPTH, VIRTUAL_CENTER};
use crate::network::Network;
use std::collections::{BTreeMap, HashSet};

pub struct Recall<'s> {
    strategy: &'s dyn ActivationStrategy,
    max_activations: Option<usize>,
}

impl<'s> Recall<'s> {
    pub fn new(strategy: &'s dyn ActivationStrategy) -> Self {
        Self {
            strategy,
            max_activations: None,
        }
    }

    /// Stop activating new nodes once this many are active
    pub fn with_max_activations(mut self, max: usize) -> Self {
        self.max_activations = Some(max);
        self
    }

    /// Spread from `seeds`. Seeds unknown to the network are ignored; if
    /// none remain there is nothing to recall.
    pub fn execute(&self, network: &Network, seeds: &[String]) -> Option<Mind> {
        let mut seen = HashSet::new();
        let centers: Vec<String> = seeds
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty() && seen.insert(*s))
            .filter(|s| {
                let known = network.contains(s);
                if !known {
                    tracing::debug!("Recall center '{}' is not in the network", s);
                }
                known
            })
            .map(str::to_string)
            .collect();
        if centers.is_empty() {
            return None;
        }

        let threshold = self.strategy.firing_threshold();
        let seed_energy = 1.0 / centers.len() as f64;
        let mut ctx = ActivationContext::new(network);
        let mut mind = Mind::new(centers.clone());

        for center in &centers {
            ctx.set_energy(center, seed_energy);
            ctx.activate(center);
            mind.add_activated_cue(center, SEED_DEPTH);
            mind.add_connection(Connection {
                from: VIRTUAL_CENTER.to_string(),
                to: center.clone(),
                weight: seed_energy,
            });
        }

        while self.strategy.should_continue(&ctx) {
            let current: Vec<(String, f64)> = ctx
                .energy_pool
                .iter()
                .map(|(w, e)| (w.clone(), *e))
                .collect();

            let mut next: BTreeMap<String, f64> = BTreeMap::new();
            for (word, energy) in current {
                ctx.focus(&word, energy);
                for edge in self.strategy.activate(&ctx) {
                    *next.entry(edge.target.clone()).or_insert(0.0) += edge.energy;
                    let connection = Connection {
                        from: word.clone(),
                        to: edge.target,
                        weight: edge.weight,
                    };
                    mind.add_connection(connection.clone());
                    ctx.record(connection);
                }
            }

            let exhausted = next.is_empty();
            let depth = SEED_DEPTH + ctx.cycle + 1;
            let mut capped = Vec::new();
            for (target, energy) in &next {
                if *energy < threshold || ctx.is_activated(target) {
                    continue;
                }
                if self
                    .max_activations
                    .is_some_and(|max| ctx.activated_count() >= max)
                {
                    capped.push(target.clone());
                    continue;
                }
                ctx.activate(target);
                mind.add_activated_cue(target, depth);
            }
            for target in capped {
                next.remove(&target);
            }

            ctx.energy_pool = next;
            self.strategy.apply_decay(&mut ctx);
            ctx.cycle += 1;

            if exhausted {
                break;
            }
        }

        mind.cycles = ctx.cycle;
        tracing::debug!(
            "Spread from {:?}: {} cycles, {} activated, {} connections",
            mind.centers,
            mind.cycles,
            mind.activation_count(),
            ctx.connections.len()
        );
        Some(mind)
    }

    /// Credit every activated word with one recall
    pub fn reinforce(network: &mut Network, mind: &Mind) {
        network.update_recall_frequency(mind.activated_words());
    }
}
