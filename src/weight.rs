//! Edge weighting
//!
//! A [`WeightStrategy`] decides the weight stored on an edge when `remember`
//! lays down a schema, and can rank a Cue's out-edges into a probability
//! distribution for read-time inspection. The ranking is never consulted by
//! the spreading loop.

use crate::network::EdgeSample;
use crate::types::DEFAULT_STRENGTH;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Inputs for computing one edge's storage weight
#[derive(Debug, Clone)]
pub struct WeightContext<'a> {
    pub source: &'a str,
    pub target: &'a str,
    /// 0-based index of the target word within the schema
    pub position: usize,
    pub timestamp: DateTime<Utc>,
    pub strength: Option<f32>,
}

/// An edge with its read-time probability
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEdge {
    pub target: String,
    pub weight: f64,
    pub probability: f64,
}

pub trait WeightStrategy: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Storage weight for a new or updated edge
    fn calculate(&self, ctx: &WeightContext<'_>) -> f64;

    /// Rank edges by probability, dropping those below the activation threshold
    fn normalize_for_activation(&self, edges: &[EdgeSample]) -> Vec<RankedEdge>;
}

/// Which strategy to build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightKind {
    Simple,
    TimeBased,
    #[default]
    Temperature,
}

/// Read-time contrast for the temperature strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContrastMode {
    /// Pick a temperature from the edge set's fan-out
    #[default]
    Auto,
    Low,
    Medium,
    High,
    /// Contrast percentage, 0 (smooth) to 100 (sharp)
    Custom(f64),
}

impl ContrastMode {
    /// Temperature for a fixed mode; `None` for auto
    pub fn fixed_temperature(&self) -> Option<f64> {
        match self {
            ContrastMode::Auto => None,
            ContrastMode::Low => Some(2.0),
            ContrastMode::Medium => Some(1.0),
            ContrastMode::High => Some(0.3),
            ContrastMode::Custom(pct) => Some(2.0 - (pct.clamp(0.0, 100.0) / 100.0) * 1.8),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightConfig {
    pub kind: WeightKind,
    pub base_weight: f64,
    pub decay: f64,
    pub frequency_factor: f64,
    pub activation_threshold: f64,
    pub contrast: ContrastMode,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            kind: WeightKind::default(),
            base_weight: 1.0,
            decay: 0.9,
            frequency_factor: 0.1,
            activation_threshold: 0.05,
            contrast: ContrastMode::Auto,
        }
    }
}

impl WeightConfig {
    pub fn build(&self) -> Arc<dyn WeightStrategy> {
        match self.kind {
            WeightKind::Simple => Arc::new(SimpleWeightStrategy {
                base_weight: self.base_weight,
                decay: self.decay,
                activation_threshold: self.activation_threshold,
            }),
            WeightKind::TimeBased => Arc::new(self.time_based()),
            WeightKind::Temperature => Arc::new(TemperatureWeightStrategy {
                base: self.time_based(),
                contrast: self.contrast,
            }),
        }
    }

    fn time_based(&self) -> TimeBasedWeightStrategy {
        TimeBasedWeightStrategy {
            decay: self.decay,
            frequency_factor: self.frequency_factor,
            activation_threshold: self.activation_threshold,
        }
    }
}

// ─── Simple ──────────────────────────────────────────────────────────────

/// `base_weight * decay^position`
#[derive(Debug, Clone)]
pub struct SimpleWeightStrategy {
    pub base_weight: f64,
    pub decay: f64,
    pub activation_threshold: f64,
}

impl Default for SimpleWeightStrategy {
    fn default() -> Self {
        Self {
            base_weight: 1.0,
            decay: 0.9,
            activation_threshold: 0.05,
        }
    }
}

impl WeightStrategy for SimpleWeightStrategy {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn calculate(&self, ctx: &WeightContext<'_>) -> f64 {
        self.base_weight * self.decay.powi(ctx.position as i32)
    }

    fn normalize_for_activation(&self, edges: &[EdgeSample]) -> Vec<RankedEdge> {
        let total: f64 = edges
            .iter()
            .filter(|e| e.weight.is_finite() && e.weight > 0.0)
            .map(|e| e.weight)
            .sum();
        if total <= 0.0 {
            return Vec::new();
        }
        let ranked = edges
            .iter()
            .filter(|e| e.weight.is_finite() && e.weight > 0.0)
            .map(|e| RankedEdge {
                target: e.target.clone(),
                weight: e.weight,
                probability: e.weight / total,
            })
            .collect();
        keep_and_sort(ranked, self.activation_threshold)
    }
}

// ─── Time based ──────────────────────────────────────────────────────────

/// `timestamp_ms * decay^position * strength`. Later writes outweigh
/// earlier ones, and earlier schema positions outweigh later ones.
#[derive(Debug, Clone)]
pub struct TimeBasedWeightStrategy {
    pub decay: f64,
    pub frequency_factor: f64,
    pub activation_threshold: f64,
}

impl Default for TimeBasedWeightStrategy {
    fn default() -> Self {
        Self {
            decay: 0.9,
            frequency_factor: 0.1,
            activation_threshold: 0.05,
        }
    }
}

impl TimeBasedWeightStrategy {
    fn softmax(&self, edges: &[EdgeSample], temperature: f64) -> Vec<RankedEdge> {
        let logs: Vec<(&EdgeSample, f64)> = edges
            .iter()
            .filter(|e| e.weight.is_finite() && e.weight > 0.0)
            .map(|e| {
                let boost = (1.0 + e.frequency as f64 * self.frequency_factor).ln();
                (e, e.weight.ln() + boost)
            })
            .collect();
        if logs.is_empty() {
            return Vec::new();
        }

        let max = logs.iter().map(|(_, l)| *l).fold(f64::NEG_INFINITY, f64::max);
        let temperature = temperature.max(f64::EPSILON);
        let exps: Vec<f64> = logs
            .iter()
            .map(|(_, l)| ((l - max) / temperature).exp())
            .collect();
        let total: f64 = exps.iter().sum();

        let ranked = logs
            .iter()
            .zip(exps)
            .map(|((e, _), x)| RankedEdge {
                target: e.target.clone(),
                weight: e.weight,
                probability: x / total,
            })
            .collect();
        keep_and_sort(ranked, self.activation_threshold)
    }
}

impl WeightStrategy for TimeBasedWeightStrategy {
    fn name(&self) -> &'static str {
        "time_based"
    }

    fn calculate(&self, ctx: &WeightContext<'_>) -> f64 {
        let strength = f64::from(ctx.strength.unwrap_or(DEFAULT_STRENGTH));
        ctx.timestamp.timestamp_millis() as f64 * self.decay.powi(ctx.position as i32) * strength
    }

    fn normalize_for_activation(&self, edges: &[EdgeSample]) -> Vec<RankedEdge> {
        self.softmax(edges, 1.0)
    }
}

// ─── Temperature controlled ──────────────────────────────────────────────

/// Time-based weights with a temperature-scaled softmax. Low temperature
/// sharpens toward the strongest edges; high temperature flattens.
#[derive(Debug, Clone, Default)]
pub struct TemperatureWeightStrategy {
    pub base: TimeBasedWeightStrategy,
    pub contrast: ContrastMode,
}

impl TemperatureWeightStrategy {
    pub fn effective_temperature(&self, fan_out: usize) -> f64 {
        if let Some(t) = self.contrast.fixed_temperature() {
            return t;
        }
        if fan_out > 10 {
            0.3
        } else if fan_out > 5 {
            0.5
        } else {
            1.0
        }
    }
}

impl WeightStrategy for TemperatureWeightStrategy {
    fn name(&self) -> &'static str {
        "temperature"
    }

    fn calculate(&self, ctx: &WeightContext<'_>) -> f64 {
        self.base.calculate(ctx)
    }

    fn normalize_for_activation(&self, edges: &[EdgeSample]) -> Vec<RankedEdge> {
        let temperature = self.effective_temperature(edges.len());
        self.base.softmax(edges, temperature)
    }
}

fn keep_and_sort(mut ranked: Vec<RankedEdge>, threshold: f64) -> Vec<RankedEdge> {
    ranked.retain(|e| e.probability >= threshold);
    ranked.sort_by(|a, b| {
        b.probability
            .partial_cmp(&a.probability)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}
