//! The sample set and the sample-average objective built from it.

use crate::saa_codegen::env::LatentId;
use crate::saa_codegen::generator::Generator;
use crate::saa_codegen::linear::LinearExpr;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

/// Standard-normal draws, one sequence of length N per latent, drawn once per
/// build in latent declaration order.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SampleSet {
    n: usize,
    draws: Vec<Vec<f64>>,
    means: Vec<f64>,
}

impl SampleSet {
    pub(crate) fn draw(latents: usize, n: usize, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let draws: Vec<Vec<f64>> = (0..latents)
            .map(|_| (0..n).map(|_| rng.sample(StandardNormal)).collect())
            .collect();
        let means = draws
            .iter()
            .map(|d: &Vec<f64>| d.iter().sum::<f64>() / n as f64)
            .collect();
        Self { n, draws, means }
    }

    pub(crate) fn size(&self) -> usize {
        self.n
    }

    /// d̄ for `l`
    pub(crate) fn mean(&self, l: LatentId) -> f64 {
        self.means[l.0]
    }

    pub(crate) fn draws(&self, l: LatentId) -> &[f64] {
        &self.draws[l.0]
    }
}

impl Generator {
    /// Maximize the sum over rewarded latents of their sample averages.
    pub(crate) fn emit_objective(&mut self) {
        let mut obj = LinearExpr::zero();
        for i in 0..self.env.latents.len() {
            if self.env.latents[i].rewarded {
                obj.add_inplace(&self.sample_average(LatentId(i)));
            }
        }
        self.ilp.objective = obj;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_draws() {
        let a = SampleSet::draw(3, 50, 42);
        let b = SampleSet::draw(3, 50, 42);
        assert_eq!(a, b);
        assert_ne!(a, SampleSet::draw(3, 50, 43));
        assert_eq!(a.size(), 50);
        assert_eq!(SampleSet::draw(0, 50, 42).size(), 50);
    }

    #[test]
    fn test_means_match_draws() {
        let s = SampleSet::draw(2, 10, 7);
        for l in [LatentId(0), LatentId(1)] {
            let m = s.draws(l).iter().sum::<f64>() / 10.0;
            assert!((s.mean(l) - m).abs() < 1e-12);
        }
    }

    #[test]
    fn test_sample_mean_concentrates() {
        let s = SampleSet::draw(1, 20_000, 1);
        assert!(s.mean(LatentId(0)).abs() < 0.05);
    }
}
