//! Held-out Monte-Carlo estimate of the reward a solved decision earns.
//!
//! The sampler draws fresh outcomes from its own RNG and never reads the
//! program's objective value.

use crate::error::{Error, SampleError};
use crate::program::SolvedProgram;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq)]
pub struct PosteriorOptions {
    pub seed: u64,
    /// Redraw limit for non-negative latents before clamping to zero.
    pub max_attempts: usize,
}

impl Default for PosteriorOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            max_attempts: 1000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RewardEstimate {
    /// Average over trials of the summed rewarded draws.
    pub mean: f64,
    pub std_dev: f64,
    pub trials: usize,
    /// Draws that exhausted `max_attempts` and were clamped to zero.
    pub clamped_draws: usize,
    /// Average accepted draw per latent, in declaration order.
    pub latent_means: Vec<(String, f64)>,
    /// Smallest accepted draw per latent, in declaration order.
    pub latent_mins: Vec<(String, f64)>,
}

pub fn estimate_reward(
    solved: &SolvedProgram,
    trials: usize,
    opts: &PosteriorOptions,
) -> Result<RewardEstimate, Error> {
    if trials == 0 {
        return Err(SampleError::NoTrials.into());
    }
    let p = solved.program();
    let env = &p.env;
    let decisions = solved.decision_values();
    let branch = solved.type_selected().unwrap_or(true);
    let mut rng = ChaCha8Rng::seed_from_u64(opts.seed);

    let mut rewards = Vec::with_capacity(trials);
    let mut sums = vec![0.0; env.latents.len()];
    let mut mins = vec![f64::INFINITY; env.latents.len()];
    let mut clamped_draws = 0;
    let mut draws = vec![0.0; env.latents.len()];

    for _ in 0..trials {
        let mut reward = 0.0;
        for &l in &env.order {
            let lat = &env.latents[l.0];
            let (mean, stdev) = if lat.deps().is_empty() {
                solved.latent_stats_by_id(l)
            } else {
                (
                    lat.mean.branch(branch).eval(&decisions, &draws),
                    lat.stdev.branch(branch).eval(&decisions, &draws),
                )
            };
            let invalid = || SampleError::InvalidDistribution {
                latent: lat.name.clone(),
                mean,
                stdev,
            };
            if !(mean.is_finite() && stdev.is_finite() && stdev >= 0.0) {
                return Err(invalid().into());
            }
            let normal = Normal::new(mean, stdev).map_err(|_| invalid())?;

            let mut x = normal.sample(&mut rng);
            if lat.non_negative {
                let mut attempts = 1;
                while x < 0.0 && attempts < opts.max_attempts {
                    x = normal.sample(&mut rng);
                    attempts += 1;
                }
                if x < 0.0 {
                    x = 0.0;
                    clamped_draws += 1;
                }
            }
            draws[l.0] = x;
            sums[l.0] += x;
            mins[l.0] = mins[l.0].min(x);
            if lat.rewarded {
                reward += x;
            }
        }
        rewards.push(reward);
    }

    if clamped_draws > 0 {
        log::warn!(
            "`{}`: {} draws clamped to zero after {} attempts",
            env.name,
            clamped_draws,
            opts.max_attempts
        );
    }

    let n = trials as f64;
    let mean = rewards.iter().sum::<f64>() / n;
    let std_dev = if trials > 1 {
        (rewards.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
    } else {
        0.0
    };
    let latent_means = env
        .latents
        .iter()
        .zip(&sums)
        .map(|(l, s)| (l.name.clone(), s / n))
        .collect();
    let latent_mins = env
        .latents
        .iter()
        .zip(mins)
        .map(|(l, m)| (l.name.clone(), m))
        .collect();

    Ok(RewardEstimate {
        mean,
        std_dev,
        trials,
        clamped_draws,
        latent_means,
        latent_mins,
    })
}
