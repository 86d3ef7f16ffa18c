use crate::error::{Error, ResultError, SolveError};
use crate::oracle::{SolverOptions, SolverOracle};
use crate::saa_codegen::env::{Env, LatentId};
use crate::saa_codegen::generator::{Generator, LatentCols};
use crate::saa_codegen::linear::{emit_lp, Ilp, VarId};
use crate::saa_codegen::sources::SampleSet;
use crate::saa_codegen::DecisionId;
use std::time::{Duration, Instant};

/// A compiled sample-average program, ready to hand to a solver oracle once.
#[derive(Clone, Debug)]
pub struct CompiledProgram {
    pub(crate) env: Env,
    pub(crate) ilp: Ilp,
    pub(crate) samples: SampleSet,
    pub(crate) decision_cols: Vec<VarId>,
    pub(crate) latent_cols: Vec<LatentCols>,
    pub(crate) chosen_m: Vec<(String, f64)>,
}

impl CompiledProgram {
    pub(crate) fn from_generator(gen: Generator) -> Self {
        Self {
            env: gen.env,
            ilp: gen.ilp,
            samples: gen.samples,
            decision_cols: gen.decision_cols,
            latent_cols: gen.latent_cols,
            chosen_m: gen.chosen_m,
        }
    }

    pub fn name(&self) -> &str {
        &self.env.name
    }

    pub fn ilp(&self) -> &Ilp {
        &self.ilp
    }

    pub fn sample_size(&self) -> usize {
        self.samples.size()
    }

    pub fn decision_id(&self, name: &str) -> Result<DecisionId, ResultError> {
        self.env
            .decision_index
            .get(name)
            .copied()
            .ok_or_else(|| ResultError::UnknownVariable(name.to_string()))
    }

    pub fn latent_id(&self, name: &str) -> Result<LatentId, ResultError> {
        self.env
            .latent_index
            .get(name)
            .copied()
            .ok_or_else(|| ResultError::UnknownVariable(name.to_string()))
    }

    /// d̄ of the draws behind latent `name`.
    pub fn sample_mean(&self, name: &str) -> Result<f64, ResultError> {
        Ok(self.samples.mean(self.latent_id(name)?))
    }

    /// The N standard-normal draws behind latent `name`.
    pub fn sample_draws(&self, name: &str) -> Result<&[f64], ResultError> {
        Ok(self.samples.draws(self.latent_id(name)?))
    }

    /// The big-M used for each type-conditioned quantity.
    pub fn big_m_values(&self) -> &[(String, f64)] {
        &self.chosen_m
    }

    /// CPLEX-LP text of the program.
    pub fn to_lp_string(&self) -> String {
        emit_lp(&self.ilp)
    }

    pub fn solve(self, oracle: &dyn SolverOracle) -> Result<SolvedProgram, Error> {
        self.solve_with(oracle, &SolverOptions::default())
    }

    pub fn solve_with(
        self,
        oracle: &dyn SolverOracle,
        opts: &SolverOptions,
    ) -> Result<SolvedProgram, Error> {
        log::info!(
            "solving `{}` with {} (N = {})",
            self.env.name,
            oracle.name(),
            self.samples.size()
        );
        let start = Instant::now();
        let out = oracle.solve(&self.ilp, opts)?;
        let wall_time = start.elapsed();
        let columns = self.ilp.columns().len();
        if out.values.len() != columns {
            return Err(SolveError::Internal(format!(
                "{} returned {} values for {} columns",
                oracle.name(),
                out.values.len(),
                columns
            ))
            .into());
        }
        log::debug!(
            "`{}` solved: objective {:.4}, solver time {:?}",
            self.env.name,
            out.objective,
            out.solver_time
        );
        Ok(SolvedProgram {
            program: self,
            values: out.values,
            objective: out.objective,
            stats: SolveStats {
                wall_time,
                solver_time: out.solver_time,
                iterations: out.iterations,
            },
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolveStats {
    /// Time around the oracle call, including building the backend problem.
    pub wall_time: Duration,
    pub solver_time: Duration,
    pub iterations: Option<u64>,
}

/// A program together with the oracle's optimal assignment.
#[derive(Clone, Debug)]
pub struct SolvedProgram {
    pub(crate) program: CompiledProgram,
    pub(crate) values: Vec<f64>,
    objective: f64,
    stats: SolveStats,
}

impl SolvedProgram {
    pub fn program(&self) -> &CompiledProgram {
        &self.program
    }

    /// Value of any column by name, including derived ones such as `leaf_mean`.
    pub fn value(&self, column: &str) -> Result<f64, ResultError> {
        self.program
            .ilp
            .column_by_name(column)
            .map(|v| self.values[v.idx()])
            .ok_or_else(|| ResultError::UnknownVariable(column.to_string()))
    }

    pub fn decision(&self, name: &str) -> Result<f64, ResultError> {
        let id = self.program.decision_id(name)?;
        self.decision_by_id(id)
    }

    pub fn decision_by_id(&self, id: DecisionId) -> Result<f64, ResultError> {
        self.program
            .decision_cols
            .get(id.0)
            .map(|v| self.values[v.idx()])
            .ok_or_else(|| ResultError::UnknownVariable(format!("decision #{}", id.0)))
    }

    /// Decision values in declaration order.
    pub fn decisions(&self) -> Vec<(String, f64)> {
        self.program
            .env
            .decisions
            .iter()
            .zip(&self.program.decision_cols)
            .map(|(d, v)| (d.name.clone(), self.values[v.idx()]))
            .collect()
    }

    /// Solved `(mean, stdev)` of latent `name`.
    pub fn latent_stats(&self, name: &str) -> Result<(f64, f64), ResultError> {
        let id = self.program.latent_id(name)?;
        Ok(self.latent_stats_by_id(id))
    }

    pub(crate) fn latent_stats_by_id(&self, id: LatentId) -> (f64, f64) {
        let cols = self.program.latent_cols[id.0];
        (self.values[cols.mean.idx()], self.values[cols.stdev.idx()])
    }

    /// The selector's value read as a boolean; `None` for models without one.
    pub fn type_selected(&self) -> Option<bool> {
        self.program
            .env
            .selector
            .and_then(|d| self.decision_by_id(d).ok())
            .map(|v| v > 0.5)
    }

    pub fn objective(&self) -> f64 {
        self.objective
    }

    pub fn stats(&self) -> SolveStats {
        self.stats
    }

    /// Left-hand side of the budget at the solved decisions.
    pub fn budget_spent(&self) -> Option<f64> {
        let (cost, _) = self.program.env.budget.as_ref()?;
        Some(cost.eval(&self.decision_values(), &[]))
    }

    pub(crate) fn decision_values(&self) -> Vec<f64> {
        self.program
            .decision_cols
            .iter()
            .map(|v| self.values[v.idx()])
            .collect()
    }
}
