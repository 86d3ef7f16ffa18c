//! Batch experiments: many seeded trials per sample size, aggregated once
//! every trial of that size is done.

use crate::error::Error;
use crate::oracle::SolverOracle;
use crate::posterior::{estimate_reward, PosteriorOptions};
use crate::saa_codegen::{compile, BigM, CompileOptions};
use crate::{Domain, ModelSpec};
use rayon::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq)]
pub struct SweepConfig {
    pub sample_sizes: Vec<usize>,
    /// Trials per sample size; trial `i` compiles with seed `base_seed + i`.
    pub trials: usize,
    pub base_seed: u64,
    /// Posterior draws per trial.
    pub reward_trials: usize,
    pub big_m: BigM,
    pub parallel: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            sample_sizes: vec![10, 50, 100, 500],
            trials: 20,
            base_seed: 0,
            reward_trials: 100,
            big_m: BigM::default(),
            parallel: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrialRecord {
    pub sample_size: usize,
    pub trial: usize,
    pub seed: u64,
    pub decisions: Vec<(String, f64)>,
    pub objective: f64,
    pub reward: f64,
    pub wall_time_secs: f64,
    pub solver_time_secs: f64,
    pub iterations: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub mean: f64,
    pub std_dev: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub min: f64,
    pub max: f64,
    pub n: usize,
}

impl Stats {
    pub fn from_samples(samples: &[f64]) -> Self {
        let n = samples.len();
        if n == 0 {
            return Self {
                mean: 0.0,
                std_dev: 0.0,
                ci_lower: 0.0,
                ci_upper: 0.0,
                min: 0.0,
                max: 0.0,
                n: 0,
            };
        }
        let mean = samples.iter().sum::<f64>() / n as f64;
        let variance = if n > 1 {
            samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };
        let std_dev = variance.sqrt();
        let stderr = std_dev / (n as f64).sqrt();
        let z = 1.96; // 95% CI
        Self {
            mean,
            std_dev,
            ci_lower: mean - z * stderr,
            ci_upper: mean + z * stderr,
            min: samples.iter().cloned().fold(f64::INFINITY, f64::min),
            max: samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            n,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionSummary {
    pub name: String,
    /// Share of trials with the decision set, for binary decisions.
    pub fraction_set: Option<f64>,
    pub stats: Stats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleSizeSummary {
    pub sample_size: usize,
    pub decisions: Vec<DecisionSummary>,
    pub objective: Stats,
    pub reward: Stats,
    pub wall_time_secs: Stats,
    pub solver_time_secs: Stats,
    /// `None` when the backend never reported iterations.
    pub iterations: Option<Stats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepReport {
    pub model: String,
    pub records: Vec<TrialRecord>,
    pub summaries: Vec<SampleSizeSummary>,
}

impl SweepReport {
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn summary(&self, sample_size: usize) -> Option<&SampleSizeSummary> {
        self.summaries.iter().find(|s| s.sample_size == sample_size)
    }
}

/// Compile, solve and score one seeded instance.
pub fn run_trial(
    spec: &ModelSpec,
    oracle: &dyn SolverOracle,
    cfg: &SweepConfig,
    sample_size: usize,
    trial: usize,
) -> Result<TrialRecord, Error> {
    let seed = cfg.base_seed.wrapping_add(trial as u64);
    let opts = CompileOptions {
        sample_size,
        seed,
        big_m: cfg.big_m,
    };
    let solved = compile(spec, &opts)?.solve(oracle)?;
    let reward = estimate_reward(
        &solved,
        cfg.reward_trials,
        &PosteriorOptions {
            seed: !seed,
            ..PosteriorOptions::default()
        },
    )?;
    let stats = solved.stats();
    Ok(TrialRecord {
        sample_size,
        trial,
        seed,
        decisions: solved.decisions(),
        objective: solved.objective(),
        reward: reward.mean,
        wall_time_secs: stats.wall_time.as_secs_f64(),
        solver_time_secs: stats.solver_time.as_secs_f64(),
        iterations: stats.iterations,
    })
}

fn summarize(spec: &ModelSpec, sample_size: usize, records: &[TrialRecord]) -> SampleSizeSummary {
    let column = |f: &dyn Fn(&TrialRecord) -> f64| -> Vec<f64> { records.iter().map(f).collect() };

    let decisions = spec
        .decisions
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let values = column(&|r| r.decisions[i].1);
            let fraction_set = match d.domain {
                Domain::Binary if !values.is_empty() => {
                    Some(values.iter().filter(|v| **v > 0.5).count() as f64 / values.len() as f64)
                }
                _ => None,
            };
            DecisionSummary {
                name: d.name.clone(),
                fraction_set,
                stats: Stats::from_samples(&values),
            }
        })
        .collect();

    let iterations: Vec<f64> = records
        .iter()
        .filter_map(|r| r.iterations.map(|i| i as f64))
        .collect();

    SampleSizeSummary {
        sample_size,
        decisions,
        objective: Stats::from_samples(&column(&|r| r.objective)),
        reward: Stats::from_samples(&column(&|r| r.reward)),
        wall_time_secs: Stats::from_samples(&column(&|r| r.wall_time_secs)),
        solver_time_secs: Stats::from_samples(&column(&|r| r.solver_time_secs)),
        iterations: (!iterations.is_empty()).then(|| Stats::from_samples(&iterations)),
    }
}

pub fn run_sweep(
    spec: &ModelSpec,
    oracle: &dyn SolverOracle,
    cfg: &SweepConfig,
) -> Result<SweepReport, Error> {
    log::info!(
        "sweep `{}`: sample sizes {:?}, {} trials each",
        spec.name,
        cfg.sample_sizes,
        cfg.trials
    );
    let mut records = Vec::with_capacity(cfg.sample_sizes.len() * cfg.trials);
    let mut summaries = Vec::with_capacity(cfg.sample_sizes.len());

    for &n in &cfg.sample_sizes {
        let run = |i: usize| run_trial(spec, oracle, cfg, n, i);
        let batch: Vec<TrialRecord> = if cfg.parallel {
            (0..cfg.trials).into_par_iter().map(run).collect::<Result<_, _>>()?
        } else {
            (0..cfg.trials).map(run).collect::<Result<_, _>>()?
        };
        let summary = summarize(spec, n, &batch);
        log::info!(
            "`{}` N = {}: objective {:.3} ± {:.3}, reward {:.3} ± {:.3}",
            spec.name,
            n,
            summary.objective.mean,
            summary.objective.std_dev,
            summary.reward.mean,
            summary.reward.std_dev
        );
        summaries.push(summary);
        records.extend(batch);
    }

    Ok(SweepReport {
        model: spec.name.clone(),
        records,
        summaries,
    })
}
