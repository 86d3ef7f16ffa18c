//! Closed-form re-check of a solved program.
//!
//! Every statistic is recomputed from the winning profile and the solved
//! decisions, chaining through recomputed ancestor realizations, and compared
//! with what the solver reported.

use crate::program::SolvedProgram;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Discrepancy {
    /// e.g. `leaf_mean`, `objective`
    pub quantity: String,
    pub expected: f64,
    pub solved: f64,
}

impl Discrepancy {
    pub fn abs(&self) -> f64 {
        (self.expected - self.solved).abs()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DiagnosticsReport {
    pub type_selected: Option<bool>,
    pub entries: Vec<Discrepancy>,
    /// `(spent, ceiling)` at the solved decisions
    pub budget: Option<(f64, f64)>,
    /// Largest amount by which any emitted constraint is violated.
    pub max_violation: f64,
}

impl DiagnosticsReport {
    pub fn max_discrepancy(&self) -> f64 {
        self.entries.iter().map(Discrepancy::abs).fold(0.0, f64::max)
    }

    pub fn is_consistent(&self, tol: f64) -> bool {
        let within_budget = self
            .budget
            .map_or(true, |(spent, ceiling)| spent <= ceiling + tol);
        self.max_discrepancy() <= tol && self.max_violation <= tol && within_budget
    }
}

impl SolvedProgram {
    pub fn verify(&self) -> DiagnosticsReport {
        let p = &self.program;
        let decisions = self.decision_values();
        let type_selected = self.type_selected();
        let branch = type_selected.unwrap_or(true);

        let mut realized = vec![0.0; p.env.latents.len()];
        let mut entries = vec![];
        let mut objective = 0.0;
        for &l in &p.env.order {
            let lat = &p.env.latents[l.0];
            let mean = lat.mean.branch(branch).eval(&decisions, &realized);
            let stdev = lat.stdev.branch(branch).eval(&decisions, &realized);
            let (solved_mean, solved_stdev) = self.latent_stats_by_id(l);
            entries.push(Discrepancy {
                quantity: format!("{}_mean", lat.name),
                expected: mean,
                solved: solved_mean,
            });
            entries.push(Discrepancy {
                quantity: format!("{}_stdev", lat.name),
                expected: stdev,
                solved: solved_stdev,
            });
            realized[l.0] = mean + stdev * p.samples.mean(l);
            if lat.rewarded {
                objective += realized[l.0];
            }
        }
        entries.push(Discrepancy {
            quantity: "objective".to_string(),
            expected: objective,
            solved: self.objective(),
        });

        let budget = p
            .env
            .budget
            .as_ref()
            .map(|(cost, ceiling)| (cost.eval(&decisions, &[]), *ceiling));

        let max_violation = p
            .ilp
            .constraints()
            .iter()
            .map(|c| c.violation(&self.values))
            .fold(0.0, f64::max);

        let report = DiagnosticsReport {
            type_selected,
            entries,
            budget,
            max_violation,
        };
        if report.max_discrepancy() > 1e-6 {
            log::warn!(
                "`{}`: solved statistics deviate from their profiles by {:.3e}",
                p.env.name,
                report.max_discrepancy()
            );
        }
        report
    }
}
