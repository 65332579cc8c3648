//! Random sources injected into the panel update functions.
//!
//! Every random decision a tick makes goes through [`Entropy::unit`], so a
//! test can pin the outcome of each branch by scripting the sequence of unit
//! draws instead of relying on a real generator.

use rand::{rngs::StdRng, Rng, SeedableRng};

pub trait Entropy {
    /// Uniform draw in `[0, 1)`.
    fn unit(&mut self) -> f64;

    /// True with probability `p`.
    fn chance(&mut self, p: f64) -> bool {
        self.unit() < p
    }

    /// Index in `0..len`. `len` must be non-zero.
    fn index(&mut self, len: usize) -> usize {
        let i = (self.unit() * len as f64).floor() as usize;
        i.min(len.saturating_sub(1))
    }

    /// Integer in `lo..=hi`.
    fn int_between(&mut self, lo: i64, hi: i64) -> i64 {
        let span = (hi - lo + 1).max(1) as f64;
        lo + ((self.unit() * span).floor() as i64).min(hi - lo)
    }

    /// Float in `[lo, hi)`.
    fn float_between(&mut self, lo: f64, hi: f64) -> f64 {
        lo + self.unit() * (hi - lo)
    }
}

/// Pick from a slice through a trait object.
pub fn pick<'a, T>(draws: &mut dyn Entropy, items: &'a [T]) -> &'a T {
    &items[draws.index(items.len())]
}

/// Seeded pseudo-random source for live sessions.
#[derive(Debug, Clone)]
pub struct SeededDraws {
    rng: StdRng,
}

impl SeededDraws {
    pub fn new(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    pub fn from_entropy() -> Self {
        Self { rng: StdRng::from_entropy() }
    }

    /// Derive an independent stream for one panel from an optional base seed.
    pub fn for_panel(base: Option<u64>, salt: u64) -> Self {
        match base {
            Some(seed) => Self::new(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(salt)),
            None => Self::from_entropy(),
        }
    }
}

impl Entropy for SeededDraws {
    fn unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Replays a fixed sequence of unit draws, cycling when exhausted.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDraws {
    script: Vec<f64>,
    pos: usize,
    consumed: usize,
}

impl ScriptedDraws {
    pub fn new(script: impl IntoIterator<Item = f64>) -> Self {
        Self {
            script: script.into_iter().map(|v| v.clamp(0.0, 0.999_999)).collect(),
            pos: 0,
            consumed: 0,
        }
    }

    /// Every draw returns `value`.
    pub fn constant(value: f64) -> Self {
        Self::new([value])
    }

    pub fn consumed(&self) -> usize {
        self.consumed
    }
}

impl Entropy for ScriptedDraws {
    fn unit(&mut self) -> f64 {
        self.consumed += 1;
        if self.script.is_empty() {
            return 0.0;
        }
        let v = self.script[self.pos];
        self.pos = (self.pos + 1) % self.script.len();
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_draws_cycle() {
        let mut d = ScriptedDraws::new([0.1, 0.9]);
        assert_eq!(d.unit(), 0.1);
        assert_eq!(d.unit(), 0.9);
        assert_eq!(d.unit(), 0.1);
        assert_eq!(d.consumed(), 3);
    }

    #[test]
    fn index_never_overflows() {
        let mut d = ScriptedDraws::constant(1.0);
        assert_eq!(d.index(4), 3);
        let mut d = ScriptedDraws::constant(0.0);
        assert_eq!(d.index(4), 0);
    }

    #[test]
    fn int_between_is_inclusive() {
        let mut lo = ScriptedDraws::constant(0.0);
        let mut hi = ScriptedDraws::constant(0.999_999);
        assert_eq!(lo.int_between(-3, 2), -3);
        assert_eq!(hi.int_between(-3, 2), 2);
    }

    #[test]
    fn seeded_draws_are_reproducible() {
        let mut a = SeededDraws::new(7);
        let mut b = SeededDraws::new(7);
        for _ in 0..32 {
            let x = a.unit();
            assert_eq!(x, b.unit());
            assert!((0.0..1.0).contains(&x));
        }
    }
}
