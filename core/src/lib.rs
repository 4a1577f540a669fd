//! Concentration curve calibration engine.
//!
//! Synthesizes a skewed population, derives its concentration curve,
//! calibrates the curve through an anchor point, and derives a monthly
//! accumulation series and a magnitude histogram. Every output is a
//! pure function of a `GenerationConfig`.

pub mod calibration;
pub mod config;
pub mod curve;
pub mod engine;
pub mod error;
pub mod pulse;
pub mod rng;
pub mod sampler;
pub mod series;
pub mod snapshot;
pub mod types;

pub use config::GenerationConfig;
pub use engine::{generate, ConcentrationEngine, GenerationResult};
pub use error::{EngineError, EngineResult};
