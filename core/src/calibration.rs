//! Anchor calibration.
//!
//! A calibrator reshapes a concentration curve so that one designated
//! population share maps exactly to a target magnitude share, while
//! the curve stays non-decreasing and ends at (100, 100).
//!
//! Two interchangeable strategies:
//!   - PiecewiseRescale: scale the empirical curve below the anchor,
//!     affinely remap it above the anchor.
//!   - ParametricFit: bisect on β in `(e^{βp} - 1)/(e^β - 1)` and
//!     evaluate the fitted curve at evenly spaced points.

use crate::{
    config::{CalibrationStrategy, GenerationConfig, ParametricConfig},
    curve::{nearest_index, CurvePoint},
    error::{EngineError, EngineResult},
    types::Pct,
};
use serde::{Deserialize, Serialize};

/// Smallest raw share accepted as a rescale denominator.
pub const MIN_ANCHOR_SHARE: Pct = 1e-4;

/// The single (population %, magnitude %) pair the curve must pass through.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorConstraint {
    pub population_share_pct: Pct,
    pub target_magnitude_share_pct: Pct,
}

impl AnchorConstraint {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            population_share_pct: config.anchor_population_share_pct,
            target_magnitude_share_pct: config.target_magnitude_share_pct,
        }
    }

    /// Prefix length of the point nearest the anchor on an `n`-point curve.
    /// Errors when that point is not strictly inside the curve.
    pub fn index_in(&self, n: usize) -> EngineResult<usize> {
        let idx = nearest_index(n, self.population_share_pct);
        if idx == 0 || idx >= n {
            return Err(EngineError::config(
                "anchorPopulationSharePct",
                format!(
                    "{}% of a {n}-point curve has no interior point",
                    self.population_share_pct
                ),
            ));
        }
        Ok(idx)
    }
}

/// What a calibrator did, for display and diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationReport {
    pub strategy: CalibrationStrategy,
    /// Uncalibrated share at the anchor point.
    pub raw_share_at_anchor: Pct,
    pub below_factor: Option<f64>,
    pub above_factor: Option<f64>,
    pub beta: Option<f64>,
    pub iterations: u32,
    /// |calibrated share at the anchor - target|, in percentage points.
    pub residual_pct: f64,
    /// False when the fit ran out of iterations before reaching tolerance.
    pub converged: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    pub curve: Vec<CurvePoint>,
    pub report: CalibrationReport,
}

/// The contract every calibration strategy fulfils.
pub trait Calibrator {
    fn strategy(&self) -> CalibrationStrategy;

    /// Produce a calibrated curve from the raw empirical curve.
    fn calibrate(
        &self,
        raw: &[CurvePoint],
        anchor: &AnchorConstraint,
    ) -> EngineResult<Calibration>;
}

/// Build the calibrator a config asks for.
pub fn calibrator_for(config: &GenerationConfig) -> Box<dyn Calibrator> {
    match config.strategy {
        CalibrationStrategy::PiecewiseRescale => Box::new(PiecewiseRescale),
        CalibrationStrategy::Parametric => Box::new(ParametricFit::new(config.parametric.clone())),
    }
}

// ── Piecewise rescale ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct PiecewiseRescale;

impl Calibrator for PiecewiseRescale {
    fn strategy(&self) -> CalibrationStrategy {
        CalibrationStrategy::PiecewiseRescale
    }

    fn calibrate(
        &self,
        raw: &[CurvePoint],
        anchor: &AnchorConstraint,
    ) -> EngineResult<Calibration> {
        let idx = anchor.index_in(raw.len())?;
        let target = anchor.target_magnitude_share_pct;
        let current = raw[idx - 1].cumulative_magnitude_share_pct;
        if !current.is_finite() {
            return Err(EngineError::DegenerateDistribution { total: current });
        }

        let below_denominator = current.max(MIN_ANCHOR_SHARE);
        let above_denominator = (100.0 - current).max(MIN_ANCHOR_SHARE);
        if below_denominator != current || above_denominator != 100.0 - current {
            log::warn!(
                "calibration: raw anchor share {current:.6}% is at a curve extreme; \
                 rescale denominator floored at {MIN_ANCHOR_SHARE}"
            );
        }
        let below_factor = target / below_denominator;
        let above_factor = (100.0 - target) / above_denominator;

        let mut curve: Vec<CurvePoint> = raw
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let share = if i < idx {
                    (p.cumulative_magnitude_share_pct * below_factor).clamp(0.0, target)
                } else {
                    let above = p.cumulative_magnitude_share_pct - current;
                    (target + above * above_factor).clamp(target, 100.0)
                };
                CurvePoint::new(p.population_share_pct, share)
            })
            .collect();

        curve[idx - 1].cumulative_magnitude_share_pct = target;
        if let Some(last) = curve.last_mut() {
            *last = CurvePoint::new(100.0, 100.0);
        }

        log::debug!(
            "calibration: piecewise anchor_idx={idx} raw={current:.3}% \
             below_factor={below_factor:.4} above_factor={above_factor:.4}"
        );

        Ok(Calibration {
            curve,
            report: CalibrationReport {
                strategy: self.strategy(),
                raw_share_at_anchor: current,
                below_factor: Some(below_factor),
                above_factor: Some(above_factor),
                beta: None,
                iterations: 0,
                residual_pct: 0.0,
                converged: true,
            },
        })
    }
}

// ── Parametric fit ─────────────────────────────────────────────────

/// `(e^{βp} - 1)/(e^β - 1)` for `p` in [0, 1]. Strictly decreasing in β > 0.
pub fn exponential_share(p: f64, beta: f64) -> f64 {
    (beta * p).exp_m1() / beta.exp_m1()
}

#[derive(Debug, Clone)]
pub struct ParametricFit {
    params: ParametricConfig,
}

/// Outcome of the β search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetaFit {
    pub beta: f64,
    pub iterations: u32,
    /// f(anchor) - target, in fraction units.
    pub error: f64,
    pub converged: bool,
}

impl ParametricFit {
    pub fn new(params: ParametricConfig) -> Self {
        Self { params }
    }

    /// Bisect β so that `exponential_share(anchor, β) == target`
    /// (both in fraction units). Keeps the closest β seen if the
    /// iteration budget runs out.
    pub fn fit_beta(&self, anchor: f64, target: f64) -> BetaFit {
        let mut lo = self.params.beta_min;
        let mut hi = self.params.beta_max;
        let mut best = BetaFit {
            beta: lo,
            iterations: 0,
            error: exponential_share(anchor, lo) - target,
            converged: false,
        };

        for iteration in 1..=self.params.max_iterations {
            let mid = 0.5 * (lo + hi);
            let value = exponential_share(anchor, mid);
            let error = value - target;
            if error.abs() < best.error.abs() {
                best.beta = mid;
                best.error = error;
            }
            best.iterations = iteration;
            if error.abs() <= self.params.tolerance {
                best.converged = true;
                break;
            }
            // Undershoot means β is too large.
            if value < target {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        best
    }
}

impl Calibrator for ParametricFit {
    fn strategy(&self) -> CalibrationStrategy {
        CalibrationStrategy::Parametric
    }

    fn calibrate(
        &self,
        raw: &[CurvePoint],
        anchor: &AnchorConstraint,
    ) -> EngineResult<Calibration> {
        let idx = anchor.index_in(raw.len())?;
        let target = anchor.target_magnitude_share_pct;
        let n = raw.len() as f64;
        // The fitted curve must hit the target at the sampled point idx/n.
        let fit = self.fit_beta(idx as f64 / n, target / 100.0);

        if !fit.converged {
            log::warn!(
                "calibration: beta search stopped after {} iterations at beta={:.6} \
                 with error {:.3e}; using closest fit",
                fit.iterations,
                fit.beta,
                fit.error
            );
        }

        let mut curve: Vec<CurvePoint> = (1..=raw.len())
            .map(|i| {
                let p = i as f64 / n;
                CurvePoint::new(p * 100.0, exponential_share(p, fit.beta) * 100.0)
            })
            .collect();
        if let Some(last) = curve.last_mut() {
            *last = CurvePoint::new(100.0, 100.0);
        }

        log::debug!(
            "calibration: parametric beta={:.6} iterations={} converged={}",
            fit.beta,
            fit.iterations,
            fit.converged
        );

        Ok(Calibration {
            curve,
            report: CalibrationReport {
                strategy: self.strategy(),
                raw_share_at_anchor: raw[idx - 1].cumulative_magnitude_share_pct,
                below_factor: None,
                above_factor: None,
                beta: Some(fit.beta),
                iterations: fit.iterations,
                residual_pct: fit.error.abs() * 100.0,
                converged: fit.converged,
            },
        })
    }
}
