//! Shared primitive types used across the engine.

/// A percentage on the 0–100 scale.
pub type Pct = f64;

/// A 1-based period number in the monthly series.
pub type PeriodIndex = u32;
