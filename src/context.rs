//! Per-recall mutable spreading state

use crate::network::{CueId, Network};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// A fired edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub from: String,
    pub to: String,
    pub weight: f64,
}

/// State shared by the recall driver and its activation strategy for the
/// duration of one `recall`/`prime` call.
#[derive(Debug)]
pub struct ActivationContext<'n> {
    network: &'n Network,
    /// Word -> energy; nothing at or below zero is kept
    pub energy_pool: BTreeMap<String, f64>,
    pub activated_nodes: HashSet<String>,
    pub cycle: u32,
    pub connections: Vec<Connection>,
    pub current_energy: f64,
    pub source_cue: Option<CueId>,
}

impl<'n> ActivationContext<'n> {
    pub fn new(network: &'n Network) -> Self {
        Self {
            network,
            energy_pool: BTreeMap::new(),
            activated_nodes: HashSet::new(),
            cycle: 0,
            connections: Vec::new(),
            current_energy: 0.0,
            source_cue: None,
        }
    }

    pub fn network(&self) -> &'n Network {
        self.network
    }

    /// Put `energy` on `word`, replacing what was there
    pub fn set_energy(&mut self, word: &str, energy: f64) {
        if energy > 0.0 {
            self.energy_pool.insert(word.to_string(), energy);
        } else {
            self.energy_pool.remove(word);
        }
    }

    pub fn energy(&self, word: &str) -> f64 {
        self.energy_pool.get(word).copied().unwrap_or(0.0)
    }

    pub fn is_activated(&self, word: &str) -> bool {
        self.activated_nodes.contains(word)
    }

    /// Mark `word` reached; false if it already was
    pub fn activate(&mut self, word: &str) -> bool {
        self.activated_nodes.insert(word.to_string())
    }

    pub fn activated_count(&self) -> usize {
        self.activated_nodes.len()
    }

    /// Point the working pointers at `word`
    pub fn focus(&mut self, word: &str, energy: f64) {
        self.source_cue = self.network.cue_id(word);
        self.current_energy = energy;
    }

    pub fn record(&mut self, connection: Connection) {
        self.connections.push(connection);
    }
}
