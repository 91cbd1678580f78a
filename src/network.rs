//! Cue graph: the directed, weighted concept network
//!
//! Cues live in an arena and are addressed by [`CueId`]. The word -> id map is
//! the only source of identity, so a word can never be backed by two Cues.
//! The graph persists as a flat adjacency document:
//!
//! ```json
//! { "rust": { "connections": [{ "target": "borrow", "weight": 0.9 }],
//!             "recallFrequency": 3, "memories": ["1718000000000_9f86d081"] } }
//! ```

use crate::error::{CognitionError, Result};
use crate::types::EngramId;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io::Write;
use std::path::Path;

/// Arena index of a Cue; stable for the lifetime of a [`Network`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CueId(usize);

/// A concept node
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    word: String,
    /// Out-edges keyed by target; ordered by the target's arena position
    connections: BTreeMap<CueId, f64>,
    recall_frequency: u64,
    memories: BTreeSet<EngramId>,
}

impl Cue {
    fn new(word: String) -> Self {
        Self {
            word,
            connections: BTreeMap::new(),
            recall_frequency: 0,
            memories: BTreeSet::new(),
        }
    }

    pub fn word(&self) -> &str {
        &self.word
    }

    pub fn recall_frequency(&self) -> u64 {
        self.recall_frequency
    }

    pub fn memories(&self) -> &BTreeSet<EngramId> {
        &self.memories
    }

    pub fn out_degree(&self) -> usize {
        self.connections.len()
    }

    /// Weight of the edge to `target`, if any
    pub fn weight_to(&self, target: CueId) -> Option<f64> {
        self.connections.get(&target).copied()
    }

    pub fn connections(&self) -> impl Iterator<Item = (CueId, f64)> + '_ {
        self.connections.iter().map(|(id, w)| (*id, *w))
    }
}

/// Outgoing edge with the data read-time ranking needs
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSample {
    pub target: String,
    pub weight: f64,
    /// The target's recall frequency
    pub frequency: u64,
}

/// Summary statistics about the graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NetworkStats {
    pub cues: usize,
    pub edges: usize,
    pub max_out_degree: usize,
}

/// Owner of every Cue
#[derive(Debug, Clone, Default)]
pub struct Network {
    cues: Vec<Cue>,
    index: HashMap<String, CueId>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the Cue for `word`
    pub fn upsert_cue(&mut self, word: &str) -> CueId {
        if let Some(id) = self.index.get(word) {
            return *id;
        }
        let id = CueId(self.cues.len());
        self.cues.push(Cue::new(word.to_string()));
        self.index.insert(word.to_string(), id);
        id
    }

    /// Set the weight of `from -> to`, creating either Cue as needed.
    /// An existing edge is overwritten: last write wins.
    pub fn add_edge(&mut self, from: &str, to: &str, weight: f64) -> (CueId, CueId) {
        let from_id = self.upsert_cue(from);
        let to_id = self.upsert_cue(to);
        self.cues[from_id.0].connections.insert(to_id, weight);
        (from_id, to_id)
    }

    /// Record that engram `id` mentions `word`
    pub fn add_memory(&mut self, word: &str, id: &str) {
        let cue_id = self.upsert_cue(word);
        self.cues[cue_id.0].memories.insert(id.to_string());
    }

    pub fn cue(&self, word: &str) -> Option<&Cue> {
        self.index.get(word).map(|id| &self.cues[id.0])
    }

    pub fn cue_id(&self, word: &str) -> Option<CueId> {
        self.index.get(word).copied()
    }

    /// Look up a Cue by id. Ids are only handed out by this network, so
    /// this indexes the arena directly.
    pub fn cue_by_id(&self, id: CueId) -> &Cue {
        &self.cues[id.0]
    }

    pub fn contains(&self, word: &str) -> bool {
        self.index.contains_key(word)
    }

    pub fn out_degree(&self, word: &str) -> usize {
        self.cue(word).map(Cue::out_degree).unwrap_or(0)
    }

    /// Out-edges of `word` with target words and frequencies resolved
    pub fn edge_samples(&self, word: &str) -> Vec<EdgeSample> {
        let Some(cue) = self.cue(word) else {
            return Vec::new();
        };
        cue.connections()
            .map(|(target, weight)| {
                let target = self.cue_by_id(target);
                EdgeSample {
                    target: target.word.clone(),
                    weight,
                    frequency: target.recall_frequency,
                }
            })
            .collect()
    }

    /// Increment the recall counter once for each distinct word
    pub fn update_recall_frequency<'a>(&mut self, words: impl IntoIterator<Item = &'a str>) {
        let mut seen = HashSet::new();
        for word in words {
            if !seen.insert(word) {
                continue;
            }
            if let Some(id) = self.index.get(word) {
                self.cues[id.0].recall_frequency += 1;
            }
        }
    }

    /// Words in encounter order
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.cues.iter().map(|c| c.word.as_str())
    }

    pub fn cues(&self) -> impl Iterator<Item = (CueId, &Cue)> {
        self.cues.iter().enumerate().map(|(i, c)| (CueId(i), c))
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Drop every Cue
    pub fn clear(&mut self) {
        self.cues.clear();
        self.index.clear();
    }

    pub fn stats(&self) -> NetworkStats {
        NetworkStats {
            cues: self.cues.len(),
            edges: self.cues.iter().map(Cue::out_degree).sum(),
            max_out_degree: self.cues.iter().map(Cue::out_degree).max().unwrap_or(0),
        }
    }

    // ─── Persistence ─────────────────────────────────────────────────────

    /// Flatten into the persisted adjacency form
    pub fn to_document(&self) -> NetworkDocument {
        let entries = self
            .cues
            .iter()
            .map(|cue| {
                let record = CueRecord {
                    connections: cue
                        .connections()
                        .map(|(target, weight)| ConnectionRecord {
                            target: self.cue_by_id(target).word.clone(),
                            weight,
                        })
                        .collect(),
                    recall_frequency: cue.recall_frequency,
                    memories: cue.memories.iter().cloned().collect(),
                };
                (cue.word.clone(), record)
            })
            .collect();
        NetworkDocument { entries }
    }

    /// Rebuild a network from its adjacency form.
    ///
    /// Every word, whether it shows up as a key or only as a connection
    /// target, resolves through [`Network::upsert_cue`]. Repeated keys are
    /// merged into the one Cue.
    pub fn from_document(doc: NetworkDocument) -> Self {
        let mut network = Network::new();
        let mut merged = 0usize;

        for (word, _) in &doc.entries {
            let before = network.len();
            network.upsert_cue(word);
            if network.len() == before {
                merged += 1;
            }
        }

        for (word, record) in doc.entries {
            let id = network.upsert_cue(&word);
            {
                let cue = &mut network.cues[id.0];
                cue.recall_frequency = cue.recall_frequency.max(record.recall_frequency);
                cue.memories.extend(record.memories);
            }
            for conn in record.connections {
                network.add_edge(&word, &conn.target, conn.weight);
            }
        }

        if merged > 0 {
            tracing::warn!("Merged {} duplicate cue entries while loading network", merged);
        }
        network
    }

    /// Write the network to `path` atomically (temp file + rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        self.to_document().save(path)
    }

    /// Read a network from `path`. A missing file yields an empty network.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No network file at {}, starting empty", path.display());
                return Ok(Network::new());
            }
            Err(e) => return Err(e.into()),
        };
        let doc: NetworkDocument = serde_json::from_slice(&bytes)?;
        Ok(Network::from_document(doc))
    }
}

// ─── Persisted form ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub target: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CueRecord {
    #[serde(default)]
    pub connections: Vec<ConnectionRecord>,
    #[serde(default)]
    pub recall_frequency: u64,
    #[serde(default)]
    pub memories: Vec<EngramId>,
}

/// Word -> record adjacency document.
///
/// Entries keep file order, and repeated keys are kept rather than silently
/// collapsed so [`Network::from_document`] can merge them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkDocument {
    pub entries: Vec<(String, CueRecord)>,
}

impl NetworkDocument {
    /// Write the document to `path` through a temp file in the same
    /// directory, then rename over the target
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let json = serde_json::to_vec_pretty(self)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path)
            .map_err(|e| CognitionError::Storage(format!("Failed to persist network: {e}")))?;

        tracing::debug!("Persisted network ({} cues) to {}", self.entries.len(), path.display());
        Ok(())
    }
}

impl Serialize for NetworkDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (word, record) in &self.entries {
            map.serialize_entry(word, record)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for NetworkDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct DocumentVisitor;

        impl<'de> Visitor<'de> for DocumentVisitor {
            type Value = NetworkDocument;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a map of word to cue record")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((word, record)) = access.next_entry::<String, CueRecord>()? {
                    entries.push((word, record));
                }
                Ok(NetworkDocument { entries })
            }
        }

        deserializer.deserialize_map(DocumentVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_never_duplicates() {
        let mut network = Network::new();
        let a = network.upsert_cue("alpha");
        let b = network.upsert_cue("alpha");
        assert_eq!(a, b);
        assert_eq!(network.len(), 1);
    }

    #[test]
    fn test_add_edge_last_write_wins() {
        let mut network = Network::new();
        network.add_edge("a", "b", 5.0);
        network.add_edge("a", "b", 2.0);

        let a = network.cue("a").unwrap();
        let b = network.cue_id("b").unwrap();
        assert_eq!(a.out_degree(), 1);
        assert_eq!(a.weight_to(b), Some(2.0));
    }

    #[test]
    fn test_recall_frequency_counts_each_word_once() {
        let mut network = Network::new();
        network.add_edge("a", "b", 1.0);
        network.update_recall_frequency(["a", "a", "b", "missing"]);

        assert_eq!(network.cue("a").unwrap().recall_frequency(), 1);
        assert_eq!(network.cue("b").unwrap().recall_frequency(), 1);
        assert!(!network.contains("missing"));
    }

    #[test]
    fn test_document_round_trip() {
        let mut network = Network::new();
        network.add_edge("a", "b", 5.0);
        network.add_edge("a", "c", 1.0);
        network.add_edge("b", "c", 0.5);
        network.add_memory("a", "1_x");
        network.update_recall_frequency(["c"]);

        let json = serde_json::to_string(&network.to_document()).unwrap();
        let doc: NetworkDocument = serde_json::from_str(&json).unwrap();
        let loaded = Network::from_document(doc);

        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.stats(), network.stats());
        for word in ["a", "b", "c"] {
            assert_eq!(loaded.edge_samples(word), network.edge_samples(word));
            assert_eq!(
                loaded.cue(word).unwrap().memories(),
                network.cue(word).unwrap().memories()
            );
        }
        assert_eq!(loaded.cue("c").unwrap().recall_frequency(), 1);
    }

    #[test]
    fn test_load_dedups_shared_targets_and_repeated_keys() {
        // "c" is a target in two lists, and "a" appears twice as a key
        let json = r#"{
            "a": { "connections": [{ "target": "c", "weight": 1.0 }], "recallFrequency": 2, "memories": ["m1"] },
            "b": { "connections": [{ "target": "c", "weight": 3.0 }] },
            "a": { "connections": [{ "target": "b", "weight": 4.0 }], "recallFrequency": 1, "memories": ["m2"] }
        }"#;
        let doc: NetworkDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.entries.len(), 3);

        let network = Network::from_document(doc);
        assert_eq!(network.len(), 3);
        assert_eq!(network.words().collect::<Vec<_>>(), vec!["a", "b", "c"]);

        let a = network.cue("a").unwrap();
        assert_eq!(a.out_degree(), 2);
        assert_eq!(a.recall_frequency(), 2);
        assert_eq!(a.memories().len(), 2);

        let c = network.cue_id("c").unwrap();
        assert_eq!(network.cue("b").unwrap().weight_to(c), Some(3.0));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("network.json");

        let mut network = Network::new();
        network.add_edge("x", "y", 0.7);
        network.save(&path).unwrap();

        let loaded = Network::load(&path).unwrap();
        assert_eq!(loaded.edge_samples("x"), network.edge_samples("x"));
    }

    #[test]
    fn test_document_save_replaces_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("network.json");

        let mut network = Network::new();
        network.add_edge("x", "y", 0.7);
        network.to_document().save(&path).unwrap();
        network.add_edge("y", "z", 0.2);
        network.to_document().save(&path).unwrap();

        let loaded = Network::load(&path).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.stats(), network.stats());
        // only the target file remains; no stray temp files
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let network = Network::load(&dir.path().join("nope.json")).unwrap();
        assert!(network.is_empty());
    }

    #[test]
    fn test_load_truncated_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("network.json");
        std::fs::write(&path, r#"{ "a": { "connections": [{ "target": "b", "#).unwrap();

        let err = Network::load(&path).unwrap_err();
        assert!(matches!(err, CognitionError::Serialization(_)));
    }

    #[test]
    fn test_clear_destroys_cues() {
        let mut network = Network::new();
        network.add_edge("a", "b", 1.0);
        network.clear();
        assert!(network.is_empty());
        assert!(network.cue("a").is_none());
    }
}
