use crate::{
    curve::nearest_index,
    error::{EngineError, EngineResult},
    rng::SequenceKind,
    types::Pct,
};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Largest population a single generation will sample.
pub const MAX_COUNT: usize = 1_000_000;
/// Largest number of monthly periods.
pub const MAX_MONTHS: u32 = 1_200;
/// Largest number of histogram bins.
pub const MAX_HISTOGRAM_BINS: u32 = 256;

// ── Calibration strategy ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CalibrationStrategy {
    /// Rescale an empirical sample around the anchor index.
    #[default]
    PiecewiseRescale,
    /// Fit `(e^{βp} - 1)/(e^β - 1)` by bisection on β.
    Parametric,
}

impl CalibrationStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PiecewiseRescale => "piecewise_rescale",
            Self::Parametric => "parametric",
        }
    }
}

// ── Tuning records ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SkewConfig {
    /// Shift applied to the normal deviate before exponentiation.
    pub log_mean: f64,
    /// Scale applied to the normal deviate before exponentiation.
    pub log_spread: f64,
    /// Probability that an entity receives an extra jump multiplier.
    pub jump_probability: f64,
    /// Jump multiplier is `exp(jump_scale * u)` for a fresh uniform `u`.
    pub jump_scale: f64,
    /// Smallest magnitude any entity may have.
    pub floor: f64,
    /// Floor on the Box–Muller uniforms.
    pub uniform_floor: f64,
}

impl Default for SkewConfig {
    fn default() -> Self {
        Self {
            log_mean: 0.3,
            log_spread: 1.05,
            jump_probability: 0.08,
            jump_scale: 1.4,
            floor: 0.08,
            uniform_floor: 1e-9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParametricConfig {
    pub beta_min: f64,
    pub beta_max: f64,
    pub max_iterations: u32,
    /// Acceptable |f(anchor) - target| in fraction units (not percent).
    pub tolerance: f64,
}

impl Default for ParametricConfig {
    fn default() -> Self {
        Self {
            beta_min: 0.01,
            beta_max: 6.0,
            max_iterations: 40,
            tolerance: 1e-9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MonthlyConfig {
    pub start_value: f64,
    pub initial_rate: f64,
    /// Multiplier applied to the growth rate after every period.
    pub rate_decay: f64,
}

impl Default for MonthlyConfig {
    fn default() -> Self {
        Self {
            start_value: 100.0,
            initial_rate: 0.15,
            rate_decay: 0.92,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HistogramConfig {
    pub start_count: u32,
    pub start_bucket: f64,
    pub count_decay: f64,
    pub bucket_growth: f64,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            start_count: 140,
            start_bucket: 0.25,
            count_decay: 0.72,
            bucket_growth: 1.55,
        }
    }
}

// ── Generation config ──────────────────────────────────────────────

/// Everything one generation call depends on.
/// Unspecified JSON keys fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Must fit in 32 bits.
    pub seed: u64,
    pub count: usize,
    pub anchor_population_share_pct: Pct,
    pub target_magnitude_share_pct: Pct,
    pub months: u32,
    pub histogram_bins: u32,
    pub sequence: SequenceKind,
    pub strategy: CalibrationStrategy,
    pub skew: SkewConfig,
    pub parametric: ParametricConfig,
    pub monthly: MonthlyConfig,
    pub histogram: HistogramConfig,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            seed: 9,
            count: 520,
            anchor_population_share_pct: 60.0,
            target_magnitude_share_pct: 40.0,
            months: 12,
            histogram_bins: 12,
            sequence: SequenceKind::default(),
            strategy: CalibrationStrategy::default(),
            skew: SkewConfig::default(),
            parametric: ParametricConfig::default(),
            monthly: MonthlyConfig::default(),
            histogram: HistogramConfig::default(),
        }
    }
}

impl GenerationConfig {
    /// Load and validate a config from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read {}", path.display()))?;
        let config = Self::from_json_str(&content)
            .with_context(|| format!("Invalid config in {}", path.display()))?;
        Ok(config)
    }

    /// Parse and validate a config from JSON text.
    pub fn from_json_str(json: &str) -> EngineResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// The seed narrowed to the sequence source's width.
    pub fn seed_u32(&self) -> EngineResult<u32> {
        u32::try_from(self.seed).map_err(|_| {
            EngineError::config("seed", format!("{} does not fit in 32 bits", self.seed))
        })
    }

    /// Index (1-based prefix length) of the curve point nearest the anchor.
    pub fn anchor_index(&self) -> usize {
        nearest_index(self.count, self.anchor_population_share_pct)
    }

    /// Reject anything generation cannot honour. Never clamps.
    pub fn validate(&self) -> EngineResult<()> {
        self.seed_u32()?;

        check_size("count", self.count as u64, MAX_COUNT as u64)?;
        check_size("months", self.months as u64, MAX_MONTHS as u64)?;
        check_size("histogramBins", self.histogram_bins as u64, MAX_HISTOGRAM_BINS as u64)?;
        check_open_pct("anchorPopulationSharePct", self.anchor_population_share_pct)?;
        check_open_pct("targetMagnitudeSharePct", self.target_magnitude_share_pct)?;

        let idx = self.anchor_index();
        if idx == 0 || idx >= self.count {
            return Err(EngineError::config(
                "anchorPopulationSharePct",
                format!(
                    "{}% of {} entities does not land on an interior curve point",
                    self.anchor_population_share_pct, self.count
                ),
            ));
        }

        self.validate_skew()?;
        self.validate_parametric()?;
        self.validate_monthly()?;
        self.validate_histogram()
    }

    fn validate_skew(&self) -> EngineResult<()> {
        let s = &self.skew;
        check_finite("skew.logMean", s.log_mean)?;
        check_finite("skew.logSpread", s.log_spread)?;
        check_finite("skew.jumpScale", s.jump_scale)?;
        if !(0.0..=1.0).contains(&s.jump_probability) {
            return Err(EngineError::config(
                "skew.jumpProbability",
                format!("{} is outside [0, 1]", s.jump_probability),
            ));
        }
        check_positive("skew.floor", s.floor)?;
        check_positive("skew.uniformFloor", s.uniform_floor)?;
        if s.uniform_floor >= 1.0 {
            return Err(EngineError::config("skew.uniformFloor", "must be below 1"));
        }
        Ok(())
    }

    fn validate_parametric(&self) -> EngineResult<()> {
        let p = &self.parametric;
        check_positive("parametric.betaMin", p.beta_min)?;
        check_finite("parametric.betaMax", p.beta_max)?;
        if p.beta_min >= p.beta_max {
            return Err(EngineError::config(
                "parametric.betaMax",
                format!("must exceed betaMin ({})", p.beta_min),
            ));
        }
        if p.max_iterations == 0 {
            return Err(EngineError::config("parametric.maxIterations", "must be positive"));
        }
        check_positive("parametric.tolerance", p.tolerance)
    }

    fn validate_monthly(&self) -> EngineResult<()> {
        let m = &self.monthly;
        check_positive("monthly.startValue", m.start_value)?;
        // A shrinking period value stalls the cumulative share.
        if !(m.initial_rate.is_finite() && m.initial_rate >= 0.0) {
            return Err(EngineError::config(
                "monthly.initialRate",
                format!("{} must be a finite non-negative growth rate", m.initial_rate),
            ));
        }
        check_positive("monthly.rateDecay", m.rate_decay)
    }

    fn validate_histogram(&self) -> EngineResult<()> {
        let h = &self.histogram;
        if h.start_count < self.histogram_bins {
            return Err(EngineError::config(
                "histogram.startCount",
                format!(
                    "{} cannot decrease strictly across histogramBins = {}; \
                     raise startCount or lower histogramBins",
                    h.start_count, self.histogram_bins
                ),
            ));
        }
        check_positive("histogram.startBucket", h.start_bucket)?;
        if !(h.count_decay > 0.0 && h.count_decay < 1.0) {
            return Err(EngineError::config(
                "histogram.countDecay",
                format!("{} is outside (0, 1)", h.count_decay),
            ));
        }
        if !(h.bucket_growth.is_finite() && h.bucket_growth > 1.0) {
            return Err(EngineError::config(
                "histogram.bucketGrowth",
                format!("{} must be a finite value above 1", h.bucket_growth),
            ));
        }
        Ok(())
    }
}

fn check_size(field: &'static str, value: u64, max: u64) -> EngineResult<()> {
    if value == 0 {
        Err(EngineError::config(field, "must be positive"))
    } else if value > max {
        Err(EngineError::config(field, format!("{value} exceeds the limit of {max}")))
    } else {
        Ok(())
    }
}

fn check_open_pct(field: &'static str, value: f64) -> EngineResult<()> {
    if value.is_finite() && value > 0.0 && value < 100.0 {
        Ok(())
    } else {
        Err(EngineError::config(field, format!("{value} is outside (0, 100)")))
    }
}

fn check_finite(field: &'static str, value: f64) -> EngineResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EngineError::config(field, format!("{value} is not finite")))
    }
}

fn check_positive(field: &'static str, value: f64) -> EngineResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EngineError::config(field, format!("{value} must be a finite positive value")))
    }
}
