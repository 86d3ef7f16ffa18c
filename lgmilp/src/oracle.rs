//! Solver oracle boundary and the `microlp` backend.

use crate::error::SolveError;
use crate::saa_codegen::Ilp;
use crate::{Domain, Sense};
use microlp::{ComparisonOp, OptimizationDirection, Problem};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SolverOptions {
    pub verbose: bool,
    /// Backend-specific named options; unknown names are logged and ignored.
    pub params: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OracleOutput {
    /// One value per program column, in column order.
    pub values: Vec<f64>,
    pub objective: f64,
    pub solver_time: Duration,
    /// `None` when the backend does not report iterations.
    pub iterations: Option<u64>,
}

/// Anything that can maximize an `Ilp`.
pub trait SolverOracle: Sync {
    fn name(&self) -> &str;
    fn solve(&self, ilp: &Ilp, opts: &SolverOptions) -> Result<OracleOutput, SolveError>;
}

/// Pure-Rust branch-and-bound simplex from the `microlp` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct MicroLp;

impl SolverOracle for MicroLp {
    fn name(&self) -> &str {
        "microlp"
    }

    fn solve(&self, ilp: &Ilp, opts: &SolverOptions) -> Result<OracleOutput, SolveError> {
        for key in opts.params.keys() {
            log::warn!("microlp: ignoring unknown option `{}`", key);
        }

        let mut problem = Problem::new(OptimizationDirection::Maximize);
        let mut obj = vec![0.0; ilp.columns().len()];
        for (v, c) in ilp.objective().terms() {
            obj[v.idx()] = c;
        }

        let mut vars = Vec::with_capacity(ilp.columns().len());
        for (col, c) in ilp.columns().iter().zip(obj) {
            let var = match col.domain() {
                Domain::Binary => problem.add_binary_var(c),
                Domain::Integer { lb, ub } => problem.add_integer_var(c, (lb, ub)),
                Domain::Continuous { lb, ub } => problem.add_var(c, (lb, ub)),
            };
            vars.push(var);
        }

        for cst in ilp.constraints() {
            let mut lhs = microlp::LinearExpr::empty();
            for (v, c) in cst.expr().terms() {
                lhs.add(vars[v.idx()], c);
            }
            let op = match cst.sense() {
                Sense::Le => ComparisonOp::Le,
                Sense::Ge => ComparisonOp::Ge,
                Sense::Eq => ComparisonOp::Eq,
            };
            problem.add_constraint(lhs, op, cst.rhs());
        }

        if opts.verbose {
            log::info!(
                "microlp: solving {} columns, {} constraints",
                vars.len(),
                ilp.constraints().len()
            );
        }

        let start = Instant::now();
        let solution = problem.solve().map_err(|e| match e {
            microlp::Error::Infeasible => SolveError::Infeasible,
            microlp::Error::Unbounded => SolveError::Unbounded,
            other => SolveError::Internal(other.to_string()),
        })?;
        let solver_time = start.elapsed();

        Ok(OracleOutput {
            values: vars.iter().map(|v| solution[*v]).collect(),
            objective: solution.objective(),
            solver_time,
            iterations: None,
        })
    }
}
