//! Ticket identifier (PNR) generation.

use std::collections::HashSet;

use rand::Rng;

/// Smallest numeric suffix; keeps every PNR at six digits.
const SUFFIX_MIN: u32 = 100_000;
/// Largest numeric suffix.
const SUFFIX_MAX: u32 = 999_999;

/// Issues `prefix + 6 digits` identifiers that are unique within a known set.
pub struct PnrGenerator<R: Rng> {
    prefix: String,
    rng: R,
    taken: HashSet<String>,
}

impl PnrGenerator<rand::rngs::ThreadRng> {
    /// Generator backed by the thread-local RNG.
    pub fn new(prefix: impl Into<String>, taken: HashSet<String>) -> Self {
        Self::with_rng(prefix, taken, rand::thread_rng())
    }
}

impl<R: Rng> PnrGenerator<R> {
    /// Generator with an explicit RNG, used for deterministic tests.
    pub fn with_rng(prefix: impl Into<String>, taken: HashSet<String>, rng: R) -> Self {
        Self {
            prefix: prefix.into(),
            rng,
            taken,
        }
    }

    /// Draw identifiers until one is unused, then remember it.
    ///
    /// Does not return once all 900 000 suffixes are taken.
    pub fn next_pnr(&mut self) -> String {
        loop {
            let suffix = self.rng.gen_range(SUFFIX_MIN..=SUFFIX_MAX);
            let candidate = format!("{}{}", self.prefix, suffix);
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn identifiers_have_prefix_and_six_digits() {
        let mut generator = PnrGenerator::new("PNR", HashSet::new());
        for _ in 0..50 {
            let pnr = generator.next_pnr();
            let digits = pnr.strip_prefix("PNR").expect("prefix present");
            assert_eq!(digits.len(), 6);
            assert!(digits.chars().all(|ch| ch.is_ascii_digit()));
        }
    }

    #[test]
    fn collisions_are_redrawn() {
        let first = PnrGenerator::with_rng("PNR", HashSet::new(), StdRng::seed_from_u64(7))
            .next_pnr();

        let taken = HashSet::from([first.clone()]);
        let mut generator = PnrGenerator::with_rng("PNR", taken, StdRng::seed_from_u64(7));
        let second = generator.next_pnr();
        assert_ne!(first, second);
    }

    #[test]
    fn batch_identifiers_are_distinct() {
        let mut generator = PnrGenerator::new("PNR", HashSet::new());
        let batch: HashSet<String> = (0..6).map(|_| generator.next_pnr()).collect();
        assert_eq!(batch.len(), 6);
    }
}
