use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declarative linear-Gaussian model: decisions, latent outcomes whose
/// (mean, stdev) are affine in the decisions, and the budget that bounds them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    pub decisions: Vec<DecisionDecl>,
    /// Binary decision selecting profile A (when 1) or profile B (when 0).
    pub type_selector: Option<String>,
    pub latents: Vec<LatentDecl>,
    /// Coefficient table for the type = 1 branch of `StatDecl::Profiled`.
    pub profile_a: BTreeMap<String, f64>,
    /// Coefficient table for the type = 0 branch of `StatDecl::Profiled`.
    pub profile_b: BTreeMap<String, f64>,
    /// Shared named constants (unit costs, fixed ratios).
    pub params: BTreeMap<String, f64>,
    pub budget: Option<BudgetDecl>,
    pub side_constraints: Vec<SideConstraint>,
}

impl ModelSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            decisions: vec![],
            type_selector: None,
            latents: vec![],
            profile_a: BTreeMap::new(),
            profile_b: BTreeMap::new(),
            params: BTreeMap::new(),
            budget: None,
            side_constraints: vec![],
        }
    }

    pub fn with_decision(mut self, d: DecisionDecl) -> Self {
        self.decisions.push(d);
        self
    }

    pub fn with_type_selector(mut self, name: impl Into<String>) -> Self {
        self.type_selector = Some(name.into());
        self
    }

    pub fn with_latent(mut self, l: LatentDecl) -> Self {
        self.latents.push(l);
        self
    }

    pub fn with_profiles<K, A, B>(mut self, a: A, b: B) -> Self
    where
        K: Into<String>,
        A: IntoIterator<Item = (K, f64)>,
        B: IntoIterator<Item = (K, f64)>,
    {
        self.profile_a
            .extend(a.into_iter().map(|(k, v)| (k.into(), v)));
        self.profile_b
            .extend(b.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: f64) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    pub fn with_budget(mut self, b: BudgetDecl) -> Self {
        self.budget = Some(b);
        self
    }

    pub fn with_side_constraint(mut self, c: SideConstraint) -> Self {
        self.side_constraints.push(c);
        self
    }

    pub fn debug_print(&self) {
        println!("== Model: {} ==", self.name);
        println!("Decisions: {}", self.decisions.len());
        println!("Latents: {}", self.latents.len());
        if let Some(sel) = &self.type_selector {
            println!("Type selector: {}", sel);
        }
        if let Some(b) = &self.budget {
            println!("Budget ceiling: {}", b.ceiling);
        }
    }

    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionDecl {
    pub name: String,
    pub domain: Domain,
}

impl DecisionDecl {
    pub fn binary(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: Domain::Binary,
        }
    }
    pub fn continuous(name: impl Into<String>, lb: f64, ub: f64) -> Self {
        Self {
            name: name.into(),
            domain: Domain::Continuous { lb, ub },
        }
    }
    pub fn integer(name: impl Into<String>, lb: i32, ub: i32) -> Self {
        Self {
            name: name.into(),
            domain: Domain::Integer { lb, ub },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Domain {
    Binary,
    Continuous { lb: f64, ub: f64 },
    Integer { lb: i32, ub: i32 },
}

impl Domain {
    pub fn bounds(&self) -> (f64, f64) {
        match *self {
            Domain::Binary => (0.0, 1.0),
            Domain::Continuous { lb, ub } => (lb, ub),
            Domain::Integer { lb, ub } => (lb as f64, ub as f64),
        }
    }
}

/// A normally distributed outcome whose parameters are decided by the program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatentDecl {
    pub name: String,
    pub mean: StatDecl,
    pub stdev: StatDecl,
    /// Posterior draws below zero are rejected and redrawn.
    pub non_negative: bool,
    /// Whether the realization is a term of the objective.
    pub rewarded: bool,
}

impl LatentDecl {
    pub fn new(name: impl Into<String>, mean: StatDecl, stdev: StatDecl) -> Self {
        Self {
            name: name.into(),
            mean,
            stdev,
            non_negative: false,
            rewarded: true,
        }
    }

    pub fn non_negative(mut self) -> Self {
        self.non_negative = true;
        self
    }

    pub fn unrewarded(mut self) -> Self {
        self.rewarded = false;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StatDecl {
    /// Same expression under both types.
    Fixed(AffineDecl),
    /// Explicit expressions: `a` when the type selector is 1, `b` when 0.
    ByType { a: AffineDecl, b: AffineDecl },
    /// Named coefficients looked up in `profile_a` / `profile_b`.
    Profiled(AffineDecl),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffineDecl {
    pub base: Coef,
    pub terms: Vec<TermDecl>,
}

impl AffineDecl {
    pub fn constant(base: impl Into<Coef>) -> Self {
        Self {
            base: base.into(),
            terms: vec![],
        }
    }

    pub fn plus(mut self, operand: Operand, coef: impl Into<Coef>) -> Self {
        self.terms.push(TermDecl {
            operand,
            coef: coef.into(),
        });
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermDecl {
    pub operand: Operand,
    pub coef: Coef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Coef {
    Lit(f64),
    Named(String),
}

impl From<f64> for Coef {
    fn from(v: f64) -> Self {
        Coef::Lit(v)
    }
}

impl From<&str> for Coef {
    fn from(v: &str) -> Self {
        Coef::Named(v.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    Decision(String),
    /// `1 - x` for a decision `x`.
    Complement(String),
    /// Realized (sample-averaged) value of another latent.
    Latent(String),
}

impl Operand {
    pub fn decision(name: &str) -> Self {
        Operand::Decision(name.to_string())
    }
    pub fn complement(name: &str) -> Self {
        Operand::Complement(name.to_string())
    }
    pub fn latent(name: &str) -> Self {
        Operand::Latent(name.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetDecl {
    pub base: Coef,
    pub costs: Vec<TermDecl>,
    pub ceiling: f64,
}

impl BudgetDecl {
    pub fn new(ceiling: f64) -> Self {
        Self {
            base: Coef::Lit(0.0),
            costs: vec![],
            ceiling,
        }
    }

    pub fn cost(mut self, operand: Operand, coef: impl Into<Coef>) -> Self {
        self.costs.push(TermDecl {
            operand,
            coef: coef.into(),
        });
        self
    }
}

/// Extra linear restriction over decisions (e.g. `water >= 200 * pellets`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SideConstraint {
    pub name: String,
    pub lhs: AffineDecl,
    pub sense: Sense,
    pub rhs: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sense {
    Le,
    Ge,
    Eq,
}

pub mod diagnostics;
pub mod error;
pub mod oracle;
pub mod posterior;
pub mod program;
pub mod saa_codegen;
pub mod sweep;
pub mod tulips;

pub use error::{CompileError, Error, ResultError, SampleError, SchemaError, SolveError};
pub use oracle::{MicroLp, OracleOutput, SolverOracle, SolverOptions};
pub use posterior::{estimate_reward, PosteriorOptions, RewardEstimate};
pub use diagnostics::{DiagnosticsReport, Discrepancy};
pub use program::{CompiledProgram, SolveStats, SolvedProgram};
pub use saa_codegen::{compile, BigM, CompileOptions, DecisionId, LatentId};
