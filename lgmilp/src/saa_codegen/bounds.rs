//! Interval bounds over decision ranges, used to size and validate big-M.

use crate::error::CompileError;
use crate::saa_codegen::env::{Affine, Env, Ref, ResolvedStat};
use crate::saa_codegen::generator::Generator;
use crate::saa_codegen::sources::SampleSet;
use crate::saa_codegen::BigM;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Interval {
    pub(crate) lo: f64,
    pub(crate) hi: f64,
}

impl Interval {
    pub(crate) fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    pub(crate) fn point(v: f64) -> Self {
        Self { lo: v, hi: v }
    }

    pub(crate) fn add(self, o: Interval) -> Interval {
        Interval::new(self.lo + o.lo, self.hi + o.hi)
    }

    pub(crate) fn scale(self, c: f64) -> Interval {
        if c == 0.0 {
            Interval::point(0.0)
        } else if c > 0.0 {
            Interval::new(self.lo * c, self.hi * c)
        } else {
            Interval::new(self.hi * c, self.lo * c)
        }
    }

    pub(crate) fn hull(self, o: Interval) -> Interval {
        Interval::new(self.lo.min(o.lo), self.hi.max(o.hi))
    }

    pub(crate) fn is_bounded(&self) -> bool {
        self.lo.is_finite() && self.hi.is_finite()
    }

    /// Largest absolute value in the interval.
    pub(crate) fn magnitude(&self) -> f64 {
        self.lo.abs().max(self.hi.abs())
    }
}

fn ref_range(env: &Env, realized: &[Interval], r: &Ref) -> Interval {
    match r {
        Ref::Decision(d) => {
            let (lb, ub) = env.decision_bounds(*d);
            Interval::new(lb, ub)
        }
        Ref::Latent(l) => realized[l.0],
    }
}

pub(crate) fn affine_range(env: &Env, realized: &[Interval], a: &Affine) -> Interval {
    a.terms
        .iter()
        .fold(Interval::point(a.constant), |acc, (r, c)| {
            acc.add(ref_range(env, realized, r).scale(*c))
        })
}

fn stat_range(env: &Env, realized: &[Interval], s: &ResolvedStat) -> Interval {
    match s {
        ResolvedStat::Fixed(e) => affine_range(env, realized, e),
        ResolvedStat::ByType { a, b } => {
            affine_range(env, realized, a).hull(affine_range(env, realized, b))
        }
    }
}

/// Range of every latent's sample-averaged realization, filled in dependency
/// order so ancestors are known before their dependents read them.
pub(crate) fn realization_ranges(env: &Env, samples: &SampleSet) -> Vec<Interval> {
    let mut out = vec![Interval::new(f64::NEG_INFINITY, f64::INFINITY); env.latents.len()];
    for &l in &env.order {
        let lat = &env.latents[l.0];
        let mean = stat_range(env, &out, &lat.mean);
        let sd = stat_range(env, &out, &lat.stdev);
        // stdev columns are bounded below by zero
        let sd = Interval::new(sd.lo.max(0.0), sd.hi.max(0.0));
        out[l.0] = mean.add(sd.scale(samples.mean(l)));
    }
    out
}

impl Generator {
    /// M for the disjunction between `a` and `b`, validated against the
    /// largest difference the two branches can reach.
    pub(crate) fn big_m_for(
        &mut self,
        quantity: &str,
        a: &Affine,
        b: &Affine,
    ) -> Result<f64, CompileError> {
        let diff = a.diff(b);
        let range = affine_range(&self.env, &self.ranges, &diff);
        if !range.is_bounded() {
            let variable = diff
                .terms
                .iter()
                .find(|(r, _)| !ref_range(&self.env, &self.ranges, r).is_bounded())
                .map(|(r, _)| match r {
                    Ref::Decision(d) => self.env.decisions[d.0].name.clone(),
                    Ref::Latent(l) => self.env.latents[l.0].name.clone(),
                })
                // a non-finite constant leaves no variable to blame
                .unwrap_or_else(|| quantity.to_string());
            return Err(CompileError::UnboundedRange {
                quantity: quantity.to_string(),
                variable,
            });
        }
        let required = range.magnitude();
        let m = match self.big_m {
            BigM::Fixed(m) => m,
            BigM::Derived { headroom } => required * headroom + 1.0,
        };
        // NaN fails this comparison too
        if !(m.is_finite() && m >= required) {
            return Err(CompileError::BigMTooSmall {
                quantity: quantity.to_string(),
                required,
                configured: m,
            });
        }
        log::debug!("big-M for `{}`: {} (required {})", quantity, m, required);
        self.chosen_m.push((quantity.to_string(), m));
        Ok(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::saa_codegen::env::{build_env, DecisionId};
    use crate::{AffineDecl, DecisionDecl, LatentDecl, ModelSpec, Operand, StatDecl};

    #[test]
    fn test_scale_flips_negative() {
        let i = Interval::new(-1.0, 3.0);
        assert_eq!(i.scale(-2.0), Interval::new(-6.0, 2.0));
        assert_eq!(i.scale(0.0), Interval::point(0.0));
        assert_eq!(i.magnitude(), 3.0);
    }

    #[test]
    fn test_unbounded_times_zero_is_bounded() {
        let i = Interval::new(f64::NEG_INFINITY, f64::INFINITY);
        assert!(i.scale(0.0).is_bounded());
        assert!(!i.scale(0.5).is_bounded());
    }

    #[test]
    fn test_chained_range_uses_ancestor() {
        let spec = ModelSpec::new("chain")
            .with_decision(DecisionDecl::continuous("water", 0.0, 10.0))
            .with_latent(LatentDecl::new(
                "leaf",
                StatDecl::Fixed(AffineDecl::constant(1.0).plus(Operand::decision("water"), 2.0)),
                StatDecl::Fixed(AffineDecl::constant(0.0)),
            ))
            .with_latent(LatentDecl::new(
                "stem",
                StatDecl::Fixed(AffineDecl::constant(0.0).plus(Operand::latent("leaf"), 0.1)),
                StatDecl::Fixed(AffineDecl::constant(0.0)),
            ));
        let env = build_env(&spec).unwrap();
        let samples = SampleSet::draw(2, 10, 3);
        let r = realization_ranges(&env, &samples);
        assert_eq!(r[0], Interval::new(1.0, 21.0));
        assert!((r[1].lo - 0.1).abs() < 1e-12);
        assert!((r[1].hi - 2.1).abs() < 1e-12);
        assert_eq!(env.decision_bounds(DecisionId(0)), (0.0, 10.0));
    }

    fn conditioned(a: AffineDecl) -> ModelSpec {
        ModelSpec::new("conditioned")
            .with_decision(DecisionDecl::binary("type"))
            .with_decision(DecisionDecl::continuous("water", 250.0, 1000.0))
            .with_type_selector("type")
            .with_latent(LatentDecl::new(
                "leaf",
                StatDecl::ByType {
                    a,
                    b: AffineDecl::constant(150.0).plus(Operand::decision("water"), 0.005),
                },
                StatDecl::Fixed(AffineDecl::constant(1.0)),
            ))
    }

    fn generator(spec: &ModelSpec, big_m: BigM) -> Generator {
        let env = build_env(spec).unwrap();
        let samples = SampleSet::draw(env.latents.len(), 10, 0);
        Generator::new(env, samples, big_m)
    }

    fn leaf_m(g: &mut Generator) -> Result<f64, CompileError> {
        let ResolvedStat::ByType { a, b } = g.env.latents[0].mean.clone() else {
            panic!("leaf mean is type-conditioned");
        };
        g.big_m_for("leaf_mean", &a, &b)
    }

    #[test]
    fn test_m_below_required_is_rejected() {
        // required = max |-19 + 0.045 * water| over [250, 1000] = 26
        let spec = conditioned(AffineDecl::constant(131.0).plus(Operand::decision("water"), 0.05));
        for big_m in [
            BigM::Derived { headroom: 0.0 },
            BigM::Fixed(f64::NAN),
            BigM::Fixed(25.0),
        ] {
            let mut g = generator(&spec, big_m);
            match leaf_m(&mut g).unwrap_err() {
                CompileError::BigMTooSmall { quantity, required, .. } => {
                    assert_eq!(quantity, "leaf_mean");
                    assert!((required - 26.0).abs() < 1e-9);
                }
                other => panic!("unexpected {:?}", other),
            }
            assert!(g.chosen_m.is_empty());
        }
        let mut g = generator(&spec, BigM::Fixed(26.5));
        assert_eq!(leaf_m(&mut g).unwrap(), 26.5);
    }

    #[test]
    fn test_unbounded_constant_names_quantity() {
        let spec = conditioned(AffineDecl::constant(f64::INFINITY));
        let mut g = generator(&spec, BigM::default());
        assert_eq!(
            leaf_m(&mut g).unwrap_err(),
            CompileError::UnboundedRange {
                quantity: "leaf_mean".into(),
                variable: "leaf_mean".into(),
            }
        );
    }
}
