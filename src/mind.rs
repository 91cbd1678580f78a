//! The activated subgraph produced by one recall

use crate::context::Connection;
use crate::types::RankedEngram;
use serde::Serialize;
use std::collections::BTreeMap;

/// Name of the virtual, never-persisted node every seed hangs off
pub const VIRTUAL_CENTER: &str = "__mind__";

/// Depth at which seeds are recorded (the virtual center sits at 0)
pub const SEED_DEPTH: u32 = 1;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mind {
    pub center: String,
    /// The seed words spreading started from
    pub centers: Vec<String>,
    /// Word -> depth at which it was first reached
    pub activated_cues: BTreeMap<String, u32>,
    pub connections: Vec<Connection>,
    pub engrams: Vec<RankedEngram>,
    /// Spreading cycles actually run
    pub cycles: u32,
}

impl Mind {
    pub fn new(centers: Vec<String>) -> Self {
        Self {
            center: VIRTUAL_CENTER.to_string(),
            centers,
            activated_cues: BTreeMap::new(),
            connections: Vec::new(),
            engrams: Vec::new(),
            cycles: 0,
        }
    }

    /// Record `word` at `depth` unless it was already reached
    pub fn add_activated_cue(&mut self, word: &str, depth: u32) {
        self.activated_cues.entry(word.to_string()).or_insert(depth);
    }

    pub fn add_connection(&mut self, connection: Connection) {
        self.connections.push(connection);
    }

    pub fn depth(&self, word: &str) -> Option<u32> {
        self.activated_cues.get(word).copied()
    }

    pub fn is_activated(&self, word: &str) -> bool {
        self.activated_cues.contains_key(word)
    }

    /// Activated words, shallowest first (ties alphabetical)
    pub fn activated_by_depth(&self) -> Vec<(&str, u32)> {
        let mut words: Vec<(&str, u32)> = self
            .activated_cues
            .iter()
            .map(|(w, d)| (w.as_str(), *d))
            .collect();
        words.sort_by_key(|(_, d)| *d);
        words
    }

    pub fn activated_words(&self) -> impl Iterator<Item = &str> {
        self.activated_cues.keys().map(String::as_str)
    }

    pub fn activation_count(&self) -> usize {
        self.activated_cues.len()
    }
}
