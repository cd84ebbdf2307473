//! Virus particles.
//!
//! A virus is cleared or reproduces once per step with fixed probabilities.
//! [`SimpleVirus`] ignores drugs entirely, while [`ResistantVirus`] only
//! reproduces when it is resistant to every active drug and passes a mutated
//! copy of its resistance profile to its offspring.

use crate::utils::{check_drug, check_prob};
use anyhow::{Context, Result};
use rand::Rng;
use std::collections::BTreeMap;

/// Resistance profile: drug name to resistance flag.
pub type Resistances = BTreeMap<String, bool>;

/// Behaviour shared by every virus variant.
pub trait Virus: Sized {
    /// Decide whether this virus is cleared during the current step.
    fn should_clear<R: Rng>(&self, rng: &mut R) -> bool;

    /// Try to produce one offspring.
    ///
    /// Returns `None` when the virus does not reproduce this step.
    fn try_reproduce<R: Rng>(
        &self,
        pop_density: f64,
        active_drugs: &[String],
        rng: &mut R,
    ) -> Option<Self>;

    /// Whether this virus is resistant to `drug`.
    fn is_resistant(&self, _drug: &str) -> bool {
        false
    }

    /// Whether this virus is resistant to all of `drugs` at once.
    fn is_resistant_to_all(&self, drugs: &[String]) -> bool {
        drugs.iter().all(|drug| self.is_resistant(drug))
    }
}

/// Probability of a birth at the given population density.
///
/// Clamped to zero once the population reaches its capacity.
fn birth_prob(max_birth_prob: f64, pop_density: f64) -> f64 {
    (max_birth_prob * (1.0 - pop_density)).clamp(0.0, 1.0)
}

fn draw_birth<R: Rng>(max_birth_prob: f64, pop_density: f64, rng: &mut R) -> bool {
    let prob = birth_prob(max_birth_prob, pop_density);
    rng.random::<f64>() < prob
}

/// Virus without any drug resistance.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleVirus {
    max_birth_prob: f64,
    clear_prob: f64,
}

impl SimpleVirus {
    /// Create a new virus.
    ///
    /// `clear_prob` must lie in `(0, 1]` and `max_birth_prob` in `[0, 1]`.
    pub fn new(max_birth_prob: f64, clear_prob: f64) -> Result<Self> {
        check_prob(max_birth_prob, true).context("invalid maximum birth probability")?;
        check_prob(clear_prob, false).context("invalid clearance probability")?;
        Ok(Self {
            max_birth_prob,
            clear_prob,
        })
    }

    pub fn max_birth_prob(&self) -> f64 {
        self.max_birth_prob
    }

    pub fn clear_prob(&self) -> f64 {
        self.clear_prob
    }
}

impl Virus for SimpleVirus {
    fn should_clear<R: Rng>(&self, rng: &mut R) -> bool {
        rng.random::<f64>() < self.clear_prob
    }

    fn try_reproduce<R: Rng>(
        &self,
        pop_density: f64,
        _active_drugs: &[String],
        rng: &mut R,
    ) -> Option<Self> {
        if !draw_birth(self.max_birth_prob, pop_density, rng) {
            return None;
        }
        Some(self.clone())
    }
}

/// Virus carrying a resistance profile that may mutate between generations.
#[derive(Debug, Clone, PartialEq)]
pub struct ResistantVirus {
    base: SimpleVirus,
    resistances: Resistances,
    prob_mut: f64,
}

impl ResistantVirus {
    /// Create a new resistant virus.
    ///
    /// The virus owns its `resistances`; `prob_mut` is the per-drug
    /// probability of flipping a resistance flag in an offspring and must lie
    /// in `[0, 1]`.
    pub fn new(
        max_birth_prob: f64,
        clear_prob: f64,
        resistances: Resistances,
        prob_mut: f64,
    ) -> Result<Self> {
        let base = SimpleVirus::new(max_birth_prob, clear_prob)?;
        for drug in resistances.keys() {
            check_drug(drug).context("invalid resistance profile")?;
        }
        check_prob(prob_mut, true).context("invalid mutation probability")?;
        Ok(Self {
            base,
            resistances,
            prob_mut,
        })
    }

    pub fn max_birth_prob(&self) -> f64 {
        self.base.max_birth_prob
    }

    pub fn clear_prob(&self) -> f64 {
        self.base.clear_prob
    }

    pub fn prob_mut(&self) -> f64 {
        self.prob_mut
    }

    pub fn resistances(&self) -> &Resistances {
        &self.resistances
    }

    /// Stored resistance flag for `drug`, `false` for unknown drugs.
    pub fn resistance(&self, drug: &str) -> bool {
        self.resistances.get(drug).copied().unwrap_or(false)
    }

    fn mutate_resistances<R: Rng>(&self, rng: &mut R) -> Resistances {
        // Keys are sorted, so a seeded rng always flips the same traits.
        self.resistances
            .iter()
            .map(|(drug, &resistant)| {
                let flip = rng.random::<f64>() < self.prob_mut;
                (drug.clone(), resistant ^ flip)
            })
            .collect()
    }
}

impl Virus for ResistantVirus {
    fn should_clear<R: Rng>(&self, rng: &mut R) -> bool {
        self.base.should_clear(rng)
    }

    fn try_reproduce<R: Rng>(
        &self,
        pop_density: f64,
        active_drugs: &[String],
        rng: &mut R,
    ) -> Option<Self> {
        // Susceptibility to any active drug suppresses reproduction.
        if !self.is_resistant_to_all(active_drugs) {
            return None;
        }
        if !draw_birth(self.base.max_birth_prob, pop_density, rng) {
            return None;
        }
        Some(Self {
            base: self.base.clone(),
            resistances: self.mutate_resistances(rng),
            prob_mut: self.prob_mut,
        })
    }

    fn is_resistant(&self, drug: &str) -> bool {
        self.resistance(drug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    fn drugs(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn profile(entries: &[(&str, bool)]) -> Resistances {
        entries
            .iter()
            .map(|&(drug, resistant)| (drug.to_string(), resistant))
            .collect()
    }

    #[test]
    fn rejects_invalid_probabilities() {
        assert!(SimpleVirus::new(0.1, 0.0).is_err());
        assert!(SimpleVirus::new(1.5, 0.05).is_err());
        assert!(SimpleVirus::new(-0.1, 0.05).is_err());
        assert!(SimpleVirus::new(0.1, f64::NAN).is_err());
        assert!(SimpleVirus::new(0.0, 1.0).is_ok());

        assert!(ResistantVirus::new(0.1, 0.05, Resistances::new(), 1.1).is_err());
        assert!(ResistantVirus::new(0.1, 0.05, profile(&[("", true)]), 0.1).is_err());
        assert!(ResistantVirus::new(0.1, 0.05, profile(&[("X", true)]), 0.0).is_ok());
    }

    #[test]
    fn clearance_frequency_matches_probability() {
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        let virus = SimpleVirus::new(0.1, 0.3).unwrap();
        let n_trials = 100_000;
        let n_cleared = (0..n_trials)
            .filter(|_| virus.should_clear(&mut rng))
            .count();
        let freq = n_cleared as f64 / n_trials as f64;
        assert!((freq - 0.3).abs() < 0.01, "frequency {freq}");
    }

    #[test]
    fn certain_clearance() {
        let mut rng = ChaCha12Rng::seed_from_u64(2);
        let virus = SimpleVirus::new(0.1, 1.0).unwrap();
        assert!((0..1000).all(|_| virus.should_clear(&mut rng)));
    }

    #[test]
    fn offspring_copies_parameters() {
        let mut rng = ChaCha12Rng::seed_from_u64(3);
        let virus = SimpleVirus::new(1.0, 0.05).unwrap();
        let child = virus.try_reproduce(0.0, &[], &mut rng).unwrap();
        assert_eq!(child, virus);
    }

    #[test]
    fn no_offspring_at_capacity() {
        let mut rng = ChaCha12Rng::seed_from_u64(4);
        let virus = SimpleVirus::new(1.0, 0.05).unwrap();
        for pop_density in [1.0, 1.2, 5.0] {
            for _ in 0..1000 {
                assert!(virus.try_reproduce(pop_density, &[], &mut rng).is_none());
            }
        }
    }

    #[test]
    fn no_offspring_without_birth_probability() {
        let mut rng = ChaCha12Rng::seed_from_u64(5);
        let virus = SimpleVirus::new(0.0, 0.05).unwrap();
        assert!((0..1000).all(|_| virus.try_reproduce(0.0, &[], &mut rng).is_none()));
    }

    #[test]
    fn unknown_drug_is_not_resisted() {
        let virus = ResistantVirus::new(0.1, 0.05, profile(&[("X", true)]), 0.0).unwrap();
        assert!(virus.resistance("X"));
        assert!(!virus.resistance("Y"));
        assert!(!virus.is_resistant_to_all(&drugs(&["X", "Y"])));
        assert!(virus.is_resistant_to_all(&[]));
    }

    #[test]
    fn partial_resistance_blocks_reproduction() {
        let mut rng = ChaCha12Rng::seed_from_u64(6);
        let virus =
            ResistantVirus::new(1.0, 0.05, profile(&[("A", true), ("B", false)]), 0.0).unwrap();
        let active = drugs(&["A", "B"]);
        for _ in 0..1000 {
            assert!(virus.try_reproduce(0.0, &active, &mut rng).is_none());
        }
        assert!(virus.try_reproduce(0.0, &drugs(&["A"]), &mut rng).is_some());
    }

    #[test]
    fn failed_gate_consumes_no_randomness() {
        let mut rng = ChaCha12Rng::seed_from_u64(7);
        let mut ref_rng = rng.clone();
        let virus = ResistantVirus::new(1.0, 0.05, profile(&[("A", false)]), 0.5).unwrap();
        assert!(virus.try_reproduce(0.0, &drugs(&["A"]), &mut rng).is_none());
        assert_eq!(rng.random::<u64>(), ref_rng.random::<u64>());
    }

    #[test]
    fn offspring_keeps_profile_without_mutation() {
        let mut rng = ChaCha12Rng::seed_from_u64(8);
        let parent =
            ResistantVirus::new(1.0, 0.05, profile(&[("A", true), ("B", false)]), 0.0).unwrap();
        for _ in 0..100 {
            let child = parent.try_reproduce(0.0, &[], &mut rng).unwrap();
            assert_eq!(child, parent);
        }
    }

    #[test]
    fn certain_mutation_flips_every_trait() {
        let mut rng = ChaCha12Rng::seed_from_u64(9);
        let parent =
            ResistantVirus::new(1.0, 0.05, profile(&[("A", true), ("B", false)]), 1.0).unwrap();
        let child = parent.try_reproduce(0.0, &[], &mut rng).unwrap();
        assert_eq!(child.resistances(), &profile(&[("A", false), ("B", true)]));
        assert_eq!(child.prob_mut(), parent.prob_mut());
        assert_eq!(child.max_birth_prob(), parent.max_birth_prob());
        assert_eq!(child.clear_prob(), parent.clear_prob());
        assert_eq!(parent.resistances(), &profile(&[("A", true), ("B", false)]));
    }

    #[test]
    fn mutation_frequency_matches_probability() {
        let mut rng = ChaCha12Rng::seed_from_u64(10);
        let parent = ResistantVirus::new(1.0, 0.05, profile(&[("A", false)]), 0.2).unwrap();
        let n_trials = 50_000;
        let n_mutants = (0..n_trials)
            .filter_map(|_| parent.try_reproduce(0.0, &[], &mut rng))
            .filter(|child| child.resistance("A"))
            .count();
        let freq = n_mutants as f64 / n_trials as f64;
        assert!((freq - 0.2).abs() < 0.01, "frequency {freq}");
    }
}
