use std::collections::BTreeMap;
use std::fs::read_to_string;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

/// Fixed inputs to a run: starting cash and the position limit of every product. Products tracked
/// by a run are exactly the products that have a limit.
///
/// ```json
/// { "initial_cash": 0.0, "position_limits": { "AMETHYSTS": 20, "STARFRUIT": 20 } }
/// ```
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct RunConfig {
    #[serde(default)]
    pub initial_cash: f64,
    pub position_limits: BTreeMap<String, u64>,
}

impl RunConfig {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            initial_cash,
            position_limits: BTreeMap::new(),
        }
    }

    pub fn with_limit(mut self, product: impl Into<String>, limit: u64) -> Self {
        self.position_limits.insert(product.into(), limit);
        self
    }

    pub fn products(&self) -> Vec<String> {
        self.position_limits.keys().cloned().collect()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.initial_cash.is_finite() {
            return Err(anyhow!("Initial cash must be finite, got {}", self.initial_cash));
        }
        if self.position_limits.is_empty() {
            return Err(anyhow!("No products configured, need at least one position limit"));
        }
        if let Some(product) = self.position_limits.keys().find(|p| p.is_empty()) {
            return Err(anyhow!("Empty product name {:?} in position limits", product));
        }
        Ok(())
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: RunConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw =
            read_to_string(path).with_context(|| format!("Could not read config {:?}", path))?;
        Self::from_json(&raw).with_context(|| format!("Invalid config {:?}", path))
    }
}
