//! # Engram - Associative Memory for AI Agents
//!
//! Experiences ("engrams") are stored as weighted paths through a concept
//! graph. Recall spreads activation energy outward from query concepts and
//! returns the engrams the activated concepts point at, ranked.

pub mod activation;
pub mod config;
pub mod context;
pub mod error;
pub mod mind;
pub mod network;
pub mod recall;
pub mod remember;
pub mod storage_backend;
pub mod store;
pub mod two_phase;
pub mod types;
pub mod weight;

pub use activation::{
    ActivationParams, ActivationPreset, ActivationStrategy, FiredEdge, HippocampalActivation,
    RecallMode,
};
pub use config::{EngineConfig, EngineConfigBuilder};
pub use context::{ActivationContext, Connection};
pub use error::{CognitionError, Result};
pub use mind::{Mind, VIRTUAL_CENTER};
pub use network::{Cue, CueId, EdgeSample, Network, NetworkDocument, NetworkStats};
pub use recall::Recall;
pub use remember::{CueUpdate, RememberOutcome};
pub use storage_backend::{EngramStorage, TypedEngrams};
pub use store::{EngramStore, StoreStats};
pub use two_phase::{RecallOptions, RecallQuery, TwoPhaseRecall, TypeTable, WeightFactors};
pub use types::{Engram, EngramId, EngramType, RankedEngram, ScoreBreakdown};
pub use weight::{
    ContrastMode, RankedEdge, SimpleWeightStrategy, TemperatureWeightStrategy,
    TimeBasedWeightStrategy, WeightConfig, WeightKind, WeightStrategy,
};

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Combined graph and store statistics
#[derive(Debug, Clone, Serialize)]
pub struct SystemStats {
    pub network: NetworkStats,
    pub store: StoreStats,
}

/// The cognition engine: one cue graph plus one engram store
#[derive(Clone)]
pub struct CognitionSystem {
    network: Arc<RwLock<Network>>,
    storage: Arc<dyn EngramStorage>,
    weight: Arc<dyn WeightStrategy>,
    config: EngineConfig,
    network_path: Option<PathBuf>,
}

impl std::fmt::Debug for CognitionSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CognitionSystem")
            .field("data_dir", &self.config.data_dir)
            .field("storage", &self.storage.backend_name())
            .field("weight", &self.weight.name())
            .finish()
    }
}

impl CognitionSystem {
    /// Open (or create) an engine rooted at `data_dir` with default settings
    pub async fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(EngineConfig::new(data_dir)).await
    }

    /// Open the SQLite store and load the network file named by `config`
    pub async fn with_config(config: EngineConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let store = EngramStore::open(config.database_path()).await?;
        let network_path = config.network_path();
        let network = Network::load(&network_path)?;
        tracing::info!(
            "Cognition engine ready: {} cues from {}",
            network.len(),
            network_path.display()
        );

        Ok(Self {
            network: Arc::new(RwLock::new(network)),
            storage: store,
            weight: config.weight.build(),
            config,
            network_path: Some(network_path),
        })
    }

    /// Assemble an engine from an existing storage handle and network.
    /// Nothing is written to disk unless a network path is attached.
    pub fn with_storage(
        storage: Arc<dyn EngramStorage>,
        network: Network,
        config: EngineConfig,
    ) -> Self {
        Self {
            network: Arc::new(RwLock::new(network)),
            storage,
            weight: config.weight.build(),
            config,
            network_path: None,
        }
    }

    pub fn with_network_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.network_path = Some(path.into());
        self
    }

    /// Store an engram and lay its schema into the graph.
    ///
    /// The store write happens first; if it fails the graph is untouched.
    /// Remembering an id that is already stored changes nothing: the
    /// graph keeps the effects of the first remember.
    pub async fn remember(&self, engram: Engram) -> Result<RememberOutcome> {
        let stored = self.storage.store(&engram).await?;
        if !stored {
            tracing::debug!("Engram {} already remembered, graph unchanged", engram.id);
            return Ok(RememberOutcome {
                engram_id: engram.id,
                stored,
                cue_updates: Vec::new(),
            });
        }

        let cue_updates = {
            let mut network = self.network.write().await;
            remember::apply_schema(&mut network, &engram, self.weight.as_ref())
        };
        tracing::debug!("Remembered {} ({} edges)", engram.id, cue_updates.len());

        if self.config.autosave {
            self.save_network().await?;
        }

        Ok(RememberOutcome {
            engram_id: engram.id,
            stored,
            cue_updates,
        })
    }

    /// Recall with the configured default options. `None` when no center
    /// resolves.
    pub async fn recall(&self, query: impl Into<RecallQuery>) -> Result<Option<Mind>> {
        let options = self.config.recall.clone();
        self.recall_with(query, &options).await
    }

    pub async fn recall_with(
        &self,
        query: impl Into<RecallQuery>,
        options: &RecallOptions,
    ) -> Result<Option<Mind>> {
        let query = query.into();
        let phase = TwoPhaseRecall::new(options);

        let mind = {
            let network = self.network.read().await;
            let centers = phase.resolve_centers(&network, &query);
            if centers.is_empty() {
                tracing::debug!("No recall center for {:?}", query);
                return Ok(None);
            }
            phase.spread(&network, &centers)
        };
        let Some(mut mind) = mind else {
            return Ok(None);
        };

        {
            let mut network = self.network.write().await;
            Recall::reinforce(&mut network, &mind);
        }

        let candidates = phase.load_candidates(self.storage.as_ref(), &mind).await;
        let candidate_count = candidates.len();
        mind.engrams = phase.rank(candidates, &mind, &query.tokens(), chrono::Utc::now());
        tracing::debug!(
            "Recall {:?} ({}): {} activated, {} candidates, {} kept",
            mind.centers,
            options.mode,
            mind.activation_count(),
            candidate_count,
            mind.engrams.len()
        );

        if self.config.autosave {
            self.save_network().await?;
        }
        Ok(Some(mind))
    }

    /// Query-less recall from the graph's hubs
    pub async fn prime(&self) -> Result<Option<Mind>> {
        self.recall(RecallQuery::Prime).await
    }

    /// Softmax-ranked view of `word`'s out-edges under the configured
    /// weight strategy
    pub async fn rank_edges(&self, word: &str) -> Vec<RankedEdge> {
        let samples = self.network.read().await.edge_samples(word);
        self.weight.normalize_for_activation(&samples)
    }

    pub async fn get_engram(&self, id: &str) -> Result<Option<Engram>> {
        self.storage.get(id).await
    }

    pub async fn stats(&self) -> Result<SystemStats> {
        let network = self.network.read().await.stats();
        let store = self.storage.statistics().await?;
        Ok(SystemStats { network, store })
    }

    /// Write the network file, if this engine has one. The graph is
    /// snapshotted under the read lock; the file write runs on the
    /// blocking pool after the lock is released.
    pub async fn save_network(&self) -> Result<()> {
        let Some(path) = self.network_path.clone() else {
            return Ok(());
        };
        let document = self.network.read().await.to_document();
        tokio::task::spawn_blocking(move || document.save(&path))
            .await
            .map_err(|e| CognitionError::Storage(format!("Network save task failed: {e}")))?
    }

    /// Replace the in-memory network with the file's contents. On a parse
    /// failure the current network is kept.
    pub async fn load_network(&self) -> Result<()> {
        let Some(path) = &self.network_path else {
            return Ok(());
        };
        let loaded = Network::load(path)?;
        *self.network.write().await = loaded;
        Ok(())
    }

    /// Flush the network and close the store
    pub async fn close(&self) -> Result<()> {
        if self.config.autosave {
            self.save_network().await?;
        }
        self.storage.close().await
    }

    /// Shared handle to the cue graph
    pub fn network(&self) -> &Arc<RwLock<Network>> {
        &self.network
    }

    pub fn storage(&self) -> &Arc<dyn EngramStorage> {
        &self.storage
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
