//! Snapshot serialization: a generation bundle to/from JSON.
//!
//! A snapshot pairs the result with the exact config that produced it,
//! so a presentation layer can cache it for a display session and a
//! reader can regenerate it bit-for-bit.

use crate::{
    config::GenerationConfig,
    engine::{ConcentrationEngine, GenerationResult},
    error::EngineResult,
};
use serde::{Deserialize, Serialize};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSnapshot {
    pub engine_version: String,
    pub config: GenerationConfig,
    pub result: GenerationResult,
}

impl GenerationSnapshot {
    pub fn capture(config: GenerationConfig) -> EngineResult<Self> {
        let result = ConcentrationEngine::generate(&config)?;
        Ok(Self {
            engine_version: ENGINE_VERSION.to_string(),
            config,
            result,
        })
    }

    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> EngineResult<Self> {
        let snapshot: Self = serde_json::from_str(json)?;
        snapshot.config.validate()?;
        Ok(snapshot)
    }

    /// True when regenerating from the stored config reproduces the stored result.
    pub fn verify(&self) -> EngineResult<bool> {
        Ok(ConcentrationEngine::generate(&self.config)? == self.result)
    }
}
