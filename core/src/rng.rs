//! Deterministic sequence source.
//!
//! RULE: Nothing in the engine may call any platform RNG.
//! Every uniform draw flows through a SequenceRng built from the
//! 32-bit seed on the GenerationConfig. This means:
//!   - The same config always yields the same sequence.
//!   - Each generation call owns its sequence; nothing is shared
//!     between calls.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

pub const LCG_MULTIPLIER: u32 = 1_664_525;
pub const LCG_INCREMENT: u32 = 1_013_904_223;

const TWO_POW_32: f64 = 4_294_967_296.0;

/// One step of the 32-bit linear congruential recurrence.
///
/// Returns the uniform value in [0, 1) and the successor state.
/// Total over every `u32` state.
pub fn lcg_next(state: u32) -> (f64, u32) {
    let next = state
        .wrapping_mul(LCG_MULTIPLIER)
        .wrapping_add(LCG_INCREMENT);
    (next as f64 / TWO_POW_32, next)
}

/// `lcg_next` wrapped as a `rand` generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lcg32 {
    state: u32,
}

impl Lcg32 {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    pub fn state(&self) -> u32 {
        self.state
    }
}

impl RngCore for Lcg32 {
    fn next_u32(&mut self) -> u32 {
        let (_, next) = lcg_next(self.state);
        self.state = next;
        next
    }

    fn next_u64(&mut self) -> u64 {
        let hi = self.next_u32() as u64;
        let lo = self.next_u32() as u64;
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for Lcg32 {
    type Seed = [u8; 4];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u32::from_le_bytes(seed))
    }
}

/// Which recurrence backs a SequenceRng.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceKind {
    /// 32-bit LCG (1664525, 1013904223).
    #[default]
    Lcg,
    /// PCG-XSH-RR 64/32 seeded from the same 32-bit seed.
    Pcg,
}

impl SequenceKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Lcg => "lcg",
            Self::Pcg => "pcg",
        }
    }
}

#[derive(Debug, Clone)]
enum Inner {
    Lcg(Lcg32),
    Pcg(Pcg32),
}

/// The single uniform stream threaded through one generation call.
#[derive(Debug, Clone)]
pub struct SequenceRng {
    pub kind: SequenceKind,
    inner: Inner,
    draws: u64,
}

impl SequenceRng {
    pub fn new(kind: SequenceKind, seed: u32) -> Self {
        let inner = match kind {
            SequenceKind::Lcg => Inner::Lcg(Lcg32::new(seed)),
            SequenceKind::Pcg => Inner::Pcg(Pcg32::seed_from_u64(seed as u64)),
        };
        Self {
            kind,
            inner,
            draws: 0,
        }
    }

    /// Roll a float in [0.0, 1.0) with 32 bits of resolution.
    pub fn next_f64(&mut self) -> f64 {
        self.next_u32() as f64 / TWO_POW_32
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Standard normal deviate via Box–Muller.
    /// Both uniforms are floored at `uniform_floor` to keep `ln` finite.
    pub fn standard_normal(&mut self, uniform_floor: f64) -> f64 {
        let u = self.next_f64().max(uniform_floor);
        let v = self.next_f64().max(uniform_floor);
        (-2.0 * u.ln()).sqrt() * (2.0 * std::f64::consts::PI * v).cos()
    }

    /// Number of values drawn so far.
    pub fn draws(&self) -> u64 {
        self.draws
    }
}

impl RngCore for SequenceRng {
    fn next_u32(&mut self) -> u32 {
        self.draws += 1;
        match &mut self.inner {
            Inner::Lcg(rng) => rng.next_u32(),
            Inner::Pcg(rng) => rng.next_u32(),
        }
    }

    fn next_u64(&mut self) -> u64 {
        let hi = self.next_u32() as u64;
        let lo = self.next_u32() as u64;
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lcg_step_matches_recurrence() {
        let (value, next) = lcg_next(0);
        assert_eq!(next, 1_013_904_223);
        assert_eq!(value, 1_013_904_223.0 / TWO_POW_32);

        let (_, next) = lcg_next(1);
        assert_eq!(next, 1_664_525 + 1_013_904_223);
    }

    #[test]
    fn lcg_is_total_over_u32() {
        for state in [0, 1, u32::MAX / 2, u32::MAX - 1, u32::MAX] {
            let (value, _) = lcg_next(state);
            assert!((0.0..1.0).contains(&value), "state {state} gave {value}");
        }
    }

    #[test]
    fn lcg32_threads_state_like_the_pure_step() {
        let mut rng = Lcg32::new(9);
        let mut state = 9u32;
        for _ in 0..64 {
            let (_, next) = lcg_next(state);
            state = next;
            assert_eq!(rng.next_u32(), state);
        }
        assert_eq!(rng.state(), state);
    }

    #[test]
    fn lcg32_from_seed_uses_little_endian() {
        let a = Lcg32::from_seed(9u32.to_le_bytes());
        assert_eq!(a, Lcg32::new(9));
    }

    #[test]
    fn sequence_is_reproducible_for_both_kinds() {
        for kind in [SequenceKind::Lcg, SequenceKind::Pcg] {
            let mut a = SequenceRng::new(kind, 42);
            let mut b = SequenceRng::new(kind, 42);
            for _ in 0..100 {
                assert_eq!(a.next_f64().to_bits(), b.next_f64().to_bits());
            }
            assert_eq!(a.draws(), 100);
        }
    }

    #[test]
    fn different_seeds_diverge_immediately() {
        for kind in [SequenceKind::Lcg, SequenceKind::Pcg] {
            let mut a = SequenceRng::new(kind, 9);
            let mut b = SequenceRng::new(kind, 10);
            assert_ne!(a.next_f64(), b.next_f64(), "{} did not diverge", kind.name());
        }
    }

    #[test]
    fn uniforms_stay_in_unit_interval() {
        let mut rng = SequenceRng::new(SequenceKind::Lcg, 123);
        for _ in 0..10_000 {
            let x = rng.next_f64();
            assert!((0.0..1.0).contains(&x));
        }
    }

    #[test]
    fn standard_normal_is_finite_and_centred() {
        let mut rng = SequenceRng::new(SequenceKind::Lcg, 7);
        let n = 20_000;
        let mut sum = 0.0;
        for _ in 0..n {
            let z = rng.standard_normal(1e-9);
            assert!(z.is_finite());
            sum += z;
        }
        let mean = sum / n as f64;
        assert!(mean.abs() < 0.05, "mean {mean:.4} too far from 0");
    }
}
