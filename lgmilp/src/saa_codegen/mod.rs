mod binders;
pub(crate) mod bounds;
mod emit;
pub(crate) mod env;
pub(crate) mod generator;
pub(crate) mod linear;
pub(crate) mod sources;

pub use env::{DecisionId, LatentId};
pub use linear::{Column, Constraint, Ilp, LinearExpr, VarId};

use crate::error::{CompileError, Error};
use crate::program::CompiledProgram;
use crate::ModelSpec;
use env::build_env;
use generator::Generator;
use sources::SampleSet;

/// How the big-M constant of each type disjunction is chosen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BigM {
    /// One M for every quantity; compilation fails if any quantity needs more.
    Fixed(f64),
    /// Per quantity: `required * headroom + 1`.
    Derived { headroom: f64 },
}

impl BigM {
    /// Reject settings no quantity could be relaxed with.
    pub fn validate(&self) -> Result<(), CompileError> {
        match *self {
            BigM::Fixed(m) if !m.is_finite() => {
                Err(CompileError::InvalidBigM(format!("fixed M must be finite, got {}", m)))
            }
            BigM::Derived { headroom } if !(headroom.is_finite() && headroom >= 1.0) => {
                Err(CompileError::InvalidBigM(format!(
                    "headroom must be finite and at least 1, got {}",
                    headroom
                )))
            }
            _ => Ok(()),
        }
    }
}

impl Default for BigM {
    fn default() -> Self {
        BigM::Derived { headroom: 2.0 }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompileOptions {
    /// N, the number of draws per latent
    pub sample_size: usize,
    pub seed: u64,
    pub big_m: BigM,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            sample_size: 100,
            seed: 0,
            big_m: BigM::default(),
        }
    }
}

/// Entry point: lower a `ModelSpec` into a sample-average MILP.
///
/// The same spec, sample size and seed always produce the same program.
pub fn compile(spec: &ModelSpec, opts: &CompileOptions) -> Result<CompiledProgram, Error> {
    if opts.sample_size == 0 {
        return Err(CompileError::InvalidSampleSize(0).into());
    }
    opts.big_m.validate()?;
    let env = build_env(spec)?;
    let samples = SampleSet::draw(env.latents.len(), opts.sample_size, opts.seed);
    let mut gen = Generator::new(env, samples, opts.big_m);

    // 1) mean/stdev definitions, ancestors first
    gen.emit_latents()?;

    // 2) objective over rewarded latents
    gen.emit_objective();

    // 3) budget and side constraints
    gen.emit_budget();
    gen.emit_side_constraints();

    // normalize constraints: move constants to rhs
    gen.normalize();

    log::debug!(
        "compiled `{}`: {} columns, {} constraints, N = {}",
        gen.env.name,
        gen.ilp.columns.len(),
        gen.ilp.constraints.len(),
        opts.sample_size
    );

    Ok(CompiledProgram::from_generator(gen))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AffineDecl, DecisionDecl, LatentDecl, Operand, StatDecl};

    fn chained() -> ModelSpec {
        ModelSpec::new("chain")
            .with_decision(DecisionDecl::binary("type"))
            .with_decision(DecisionDecl::continuous("water", 250.0, 1000.0))
            .with_type_selector("type")
            .with_latent(LatentDecl::new(
                "stem",
                StatDecl::Fixed(AffineDecl::constant(0.0).plus(Operand::latent("leaf"), 0.1)),
                StatDecl::Fixed(AffineDecl::constant(0.0).plus(Operand::latent("leaf"), 0.05)),
            ))
            .with_latent(
                LatentDecl::new(
                    "leaf",
                    StatDecl::ByType {
                        a: AffineDecl::constant(131.0).plus(Operand::decision("water"), 0.05),
                        b: AffineDecl::constant(150.0).plus(Operand::decision("water"), 0.005),
                    },
                    StatDecl::ByType {
                        a: AffineDecl::constant(65.0).plus(Operand::decision("water"), -0.001),
                        b: AffineDecl::constant(30.0).plus(Operand::decision("water"), -0.005),
                    },
                )
                .non_negative()
                .unrewarded(),
            )
    }

    #[test]
    fn test_zero_sample_size() {
        let opts = CompileOptions {
            sample_size: 0,
            ..CompileOptions::default()
        };
        assert_eq!(
            compile(&chained(), &opts).unwrap_err(),
            Error::Compile(CompileError::InvalidSampleSize(0))
        );
    }

    #[test]
    fn test_chain_realizes_ancestor_once() {
        let p = compile(&chained(), &CompileOptions::default()).unwrap();
        let ilp = p.ilp();
        let realized: Vec<&str> = ilp
            .columns()
            .iter()
            .map(|c| c.name())
            .filter(|n| n.ends_with("_value"))
            .collect();
        assert_eq!(realized, vec!["leaf_value"]);
        // the leaf is not rewarded: only stem columns carry objective weight
        let leaf_mean = ilp.column_by_name("leaf_mean").unwrap();
        let stem_mean = ilp.column_by_name("stem_mean").unwrap();
        let obj: Vec<VarId> = ilp.objective().terms().map(|(v, _)| v).collect();
        assert!(obj.contains(&stem_mean));
        assert!(!obj.contains(&leaf_mean));
        // the realized column is defined before the stem reads it
        let saa = ilp
            .constraints()
            .iter()
            .position(|c| c.name() == "leaf_value_saa")
            .unwrap();
        let stem_def = ilp
            .constraints()
            .iter()
            .position(|c| c.name() == "stem_mean_def")
            .unwrap();
        assert!(saa < stem_def);
    }

    #[test]
    fn test_undersized_m() {
        let opts = CompileOptions {
            big_m: BigM::Fixed(1.0),
            ..CompileOptions::default()
        };
        match compile(&chained(), &opts).unwrap_err() {
            Error::Compile(CompileError::BigMTooSmall {
                quantity,
                required,
                configured,
            }) => {
                assert_eq!(quantity, "leaf_mean");
                assert!(required > 1.0);
                assert_eq!(configured, 1.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_invalid_big_m_settings() {
        for big_m in [
            BigM::Fixed(f64::NAN),
            BigM::Fixed(f64::INFINITY),
            BigM::Derived { headroom: 0.0 },
            BigM::Derived { headroom: 0.5 },
            BigM::Derived { headroom: f64::NAN },
        ] {
            let opts = CompileOptions {
                big_m,
                ..CompileOptions::default()
            };
            assert!(
                matches!(
                    compile(&chained(), &opts).unwrap_err(),
                    Error::Compile(CompileError::InvalidBigM(_))
                ),
                "{:?} accepted",
                big_m
            );
        }
        assert!(BigM::Derived { headroom: 1.0 }.validate().is_ok());
        assert!(BigM::Fixed(0.0).validate().is_ok());
    }

    #[test]
    fn test_sample_size_without_latents() {
        let spec = ModelSpec::new("empty").with_decision(DecisionDecl::binary("type"));
        let opts = CompileOptions {
            sample_size: 25,
            ..CompileOptions::default()
        };
        assert_eq!(compile(&spec, &opts).unwrap().sample_size(), 25);
    }

    #[test]
    fn test_unbounded_range() {
        let spec = ModelSpec::new("open")
            .with_decision(DecisionDecl::binary("type"))
            .with_decision(DecisionDecl::continuous("water", 0.0, f64::INFINITY))
            .with_type_selector("type")
            .with_latent(LatentDecl::new(
                "stem",
                StatDecl::ByType {
                    a: AffineDecl::constant(0.0).plus(Operand::decision("water"), 2.0),
                    b: AffineDecl::constant(0.0).plus(Operand::decision("water"), 1.0),
                },
                StatDecl::Fixed(AffineDecl::constant(1.0)),
            ));
        assert_eq!(
            compile(&spec, &CompileOptions::default()).unwrap_err(),
            Error::Compile(CompileError::UnboundedRange {
                quantity: "stem_mean".into(),
                variable: "water".into()
            })
        );
    }
}
