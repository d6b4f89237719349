//! Engine configuration.
//!
//! Capacities are fixed for the lifetime of an engine. Exceeding one is a
//! recoverable [`crate::EngineError::CapacityExceeded`], never a reallocation.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::names;

/// Sizing and feature switches for an [`crate::Engine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of heap cells.
    pub heap_capacity: usize,
    /// Maximum number of trail entries.
    pub trail_capacity: usize,
    /// Maximum number of pending goals.
    pub goal_stack_capacity: usize,
    /// Clause specialization; `None` disables lifting.
    pub specialization: Option<SpecializationConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            heap_capacity: 64_000,
            trail_capacity: 1_024,
            goal_stack_capacity: 64_000,
            specialization: None,
        }
    }
}

/// When and how generic clauses are lifted into specialized ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecializationConfig {
    /// Stalled lookups of the same node and functor before lifting is tried.
    pub threshold: u32,
    /// Partial-evaluation predicate, called as `P(Clause, Specialized, Auxiliaries)`.
    pub predicate: String,
}

impl Default for SpecializationConfig {
    fn default() -> Self {
        Self {
            threshold: 1,
            predicate: names::LIFT.to_string(),
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON configuration.
    ///
    /// Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.specialization {
            Some(spec) if spec.threshold == 0 => Err(ConfigError::ZeroThreshold),
            _ => Ok(()),
        }
    }

    /// Enables specialization with the given threshold and the default predicate.
    pub fn with_specialization(mut self, threshold: u32) -> Self {
        self.specialization = Some(SpecializationConfig {
            threshold,
            ..SpecializationConfig::default()
        });
        self
    }
}
