//! Error types for schema resolution, compilation, solving and sampling.

use thiserror::Error;

/// Malformed model declaration, detected before anything is drawn or solved.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemaError {
    /// Two decisions or two latents share a name
    #[error("duplicate name `{0}`")]
    DuplicateName(String),
    /// Operand refers to a decision that was never declared
    #[error("unknown decision `{0}`")]
    UnknownDecision(String),
    /// Operand refers to a latent that was never declared
    #[error("unknown latent `{0}`")]
    UnknownLatent(String),
    /// Named coefficient absent from the table it is resolved against
    #[error("coefficient `{name}` missing from table `{table}`")]
    MissingCoefficient { table: String, name: String },
    /// Latent operand used where only decisions may appear
    #[error("latent `{latent}` cannot appear in {context}")]
    LatentNotAllowed { latent: String, context: String },
    #[error("decision `{name}` has invalid bounds [{lb}, {ub}]")]
    BadBounds { name: String, lb: f64, ub: f64 },
    /// A type-conditioned statistic exists but no selector was named
    #[error("latent `{0}` is type-conditioned but the model names no type selector")]
    MissingTypeSelector(String),
    #[error("type selector `{0}` must be a binary decision")]
    SelectorNotBinary(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    #[error("sample size must be positive, got {0}")]
    InvalidSampleSize(usize),
    /// Latents reference each other in a cycle
    #[error("cyclic dependency between latents: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),
    /// Configured M cannot relax the inactive branch
    #[error("big-M {configured} is too small for `{quantity}`: the profiles differ by up to {required}")]
    BigMTooSmall {
        quantity: String,
        required: f64,
        configured: f64,
    },
    /// Profile difference is unbounded over the declared variable ranges
    #[error("range of `{quantity}` is unbounded through `{variable}`; no big-M is large enough")]
    UnboundedRange { quantity: String, variable: String },
    /// Fixed M is not finite, or derived headroom is below 1
    #[error("invalid big-M setting: {0}")]
    InvalidBigM(String),
    /// A type-conditioned quantity reached emission without a selector column
    #[error("`{0}` is type-conditioned but the program has no selector column")]
    MissingSelector(String),
}

/// Status reported by the solver oracle.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolveError {
    #[error("program is infeasible")]
    Infeasible,
    #[error("program is unbounded")]
    Unbounded,
    #[error("solver failure: {0}")]
    Internal(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResultError {
    #[error("unknown variable `{0}`")]
    UnknownVariable(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SampleError {
    #[error("posterior estimate needs at least one trial")]
    NoTrials,
    /// Mean or stdev is not a valid normal parameterization
    #[error("cannot sample `{latent}` from N({mean}, {stdev})")]
    InvalidDistribution { latent: String, mean: f64, stdev: f64 },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Solve(#[from] SolveError),
    #[error(transparent)]
    Lookup(#[from] ResultError),
    #[error(transparent)]
    Sample(#[from] SampleError),
}
