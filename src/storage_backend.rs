//! Storage seam the engine talks to

use crate::error::Result;
use crate::store::{EngramStore, StoreStats};
use crate::types::{Engram, EngramType};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;

pub const PATTERN_SLICE: usize = 5;
pub const LINK_SLICE: usize = 10;
pub const ATOMIC_SLICE: usize = 15;

/// One concept's engrams split by type: PATTERN and LINK by strength,
/// ATOMIC by recency, each capped.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TypedEngrams {
    pub patterns: Vec<Engram>,
    pub links: Vec<Engram>,
    pub atomics: Vec<Engram>,
}

impl TypedEngrams {
    pub fn from_engrams(engrams: Vec<Engram>) -> Self {
        let mut typed = TypedEngrams::default();
        for engram in engrams {
            match engram.engram_type {
                EngramType::Pattern => typed.patterns.push(engram),
                EngramType::Link => typed.links.push(engram),
                EngramType::Atomic => typed.atomics.push(engram),
            }
        }

        let by_strength = |a: &Engram, b: &Engram| {
            b.strength
                .partial_cmp(&a.strength)
                .unwrap_or(std::cmp::Ordering::Equal)
        };
        typed.patterns.sort_by(by_strength);
        typed.patterns.truncate(PATTERN_SLICE);
        typed.links.sort_by(by_strength);
        typed.links.truncate(LINK_SLICE);
        typed.atomics.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        typed.atomics.truncate(ATOMIC_SLICE);
        typed
    }

    pub fn len(&self) -> usize {
        self.patterns.len() + self.links.len() + self.atomics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
pub trait EngramStorage: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Atomically write the engram and its index entries. Returns false
    /// when the id already exists.
    async fn store(&self, engram: &Engram) -> Result<bool>;
    async fn get(&self, id: &str) -> Result<Option<Engram>>;
    async fn get_by_word(&self, word: &str) -> Result<Vec<Engram>>;
    async fn get_by_type(&self, engram_type: EngramType, word: Option<&str>)
        -> Result<Vec<Engram>>;
    async fn get_by_day(&self, day: NaiveDate) -> Result<Vec<Engram>>;
    async fn statistics(&self) -> Result<StoreStats>;
    async fn close(&self) -> Result<()>;

    async fn get_by_word_with_type(&self, word: &str) -> Result<TypedEngrams> {
        Ok(TypedEngrams::from_engrams(self.get_by_word(word).await?))
    }
}

#[async_trait]
impl EngramStorage for EngramStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn store(&self, engram: &Engram) -> Result<bool> {
        self.store(engram).await
    }

    async fn get(&self, id: &str) -> Result<Option<Engram>> {
        self.get(id).await
    }

    async fn get_by_word(&self, word: &str) -> Result<Vec<Engram>> {
        self.get_by_word(word).await
    }

    async fn get_by_type(
        &self,
        engram_type: EngramType,
        word: Option<&str>,
    ) -> Result<Vec<Engram>> {
        self.get_by_type(engram_type, word).await
    }

    async fn get_by_day(&self, day: NaiveDate) -> Result<Vec<Engram>> {
        self.get_by_day(day).await
    }

    async fn statistics(&self) -> Result<StoreStats> {
        self.statistics().await
    }

    async fn close(&self) -> Result<()> {
        self.close().await
    }
}
