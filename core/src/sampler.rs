//! Skewed magnitude sampler: many small entities, a few large ones.

use crate::{config::SkewConfig, rng::SequenceRng};

/// One anonymous economic unit. Only its magnitude survives sampling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entity {
    pub magnitude: f64,
}

pub struct SkewedSampler<'a> {
    skew: &'a SkewConfig,
}

impl<'a> SkewedSampler<'a> {
    pub fn new(skew: &'a SkewConfig) -> Self {
        Self { skew }
    }

    /// Draw one magnitude. Consumes three or four uniforms, in order:
    /// two for the normal deviate, one for the jump trial, one for the
    /// jump size when the trial succeeds.
    pub fn sample_one(&self, rng: &mut SequenceRng) -> Entity {
        let s = self.skew;
        let z = rng.standard_normal(s.uniform_floor);
        let base = (s.log_mean + s.log_spread * z).exp();
        let jump = if rng.chance(s.jump_probability) {
            (s.jump_scale * rng.next_f64()).exp()
        } else {
            1.0
        };
        Entity {
            magnitude: (base * jump).max(s.floor),
        }
    }

    /// Draw `count` magnitudes in insertion order.
    pub fn sample(&self, rng: &mut SequenceRng, count: usize) -> Vec<Entity> {
        let population: Vec<Entity> = (0..count).map(|_| self.sample_one(rng)).collect();
        log::debug!(
            "sampler: drew {} entities from {} uniforms",
            population.len(),
            rng.draws()
        );
        population
    }
}
