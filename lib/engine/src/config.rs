use crate::aggregate::AggregationPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tastevec_core::{Error, ModelConfig, Result, StoreConfig};

/// Everything tunable about the engine, loadable from a JSON file.
/// Missing fields fall back to their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Used for the next fit; a fitted model keeps the config it was built with
    pub model: ModelConfig,
    pub store: StoreConfig,
    pub aggregation: AggregationPolicy,
}

impl EngineConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config: EngineConfig = serde_json::from_str(&data)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.as_ref().display(), e)))?;
        config.model.validate()?;
        Ok(config)
    }
}
