use crate::error::{Error, SchemaError};
use crate::saa_codegen::binders::resolve_order;
use crate::{AffineDecl, Coef, DecisionDecl, Domain, ModelSpec, Operand, Sense, StatDecl};
use std::collections::{BTreeMap, HashMap};

/// Handle of a registered decision variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DecisionId(pub(crate) usize);

/// Handle of a registered latent outcome variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LatentId(pub(crate) usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Ref {
    Decision(DecisionId),
    /// realized value of a latent
    Latent(LatentId),
}

/// Affine expression over resolved handles.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Affine {
    pub(crate) constant: f64,
    pub(crate) terms: Vec<(Ref, f64)>,
}

impl Affine {
    pub(crate) fn eval(&self, decisions: &[f64], latents: &[f64]) -> f64 {
        self.terms.iter().fold(self.constant, |acc, (r, c)| {
            acc + c * match r {
                Ref::Decision(d) => decisions[d.0],
                Ref::Latent(l) => latents[l.0],
            }
        })
    }

    /// `self - other`, with like terms merged.
    pub(crate) fn diff(&self, other: &Affine) -> Affine {
        let mut terms = self.terms.clone();
        for (r, c) in &other.terms {
            match terms.iter_mut().find(|(x, _)| x == r) {
                Some((_, v)) => *v -= c,
                None => terms.push((*r, -c)),
            }
        }
        terms.retain(|(_, c)| c.abs() > 1e-12);
        Affine {
            constant: self.constant - other.constant,
            terms,
        }
    }

    /// Combine repeated operands, e.g. `x` and `1 - x` in one expression.
    fn merged(self) -> Affine {
        let mut terms: Vec<(Ref, f64)> = vec![];
        for (r, c) in self.terms {
            match terms.iter_mut().find(|(x, _)| *x == r) {
                Some((_, v)) => *v += c,
                None => terms.push((r, c)),
            }
        }
        terms.retain(|(_, c)| c.abs() > 1e-12);
        Affine {
            constant: self.constant,
            terms,
        }
    }

    pub(crate) fn latent_refs(&self) -> impl Iterator<Item = LatentId> + '_ {
        self.terms.iter().filter_map(|(r, _)| match r {
            Ref::Latent(l) => Some(*l),
            Ref::Decision(_) => None,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ResolvedStat {
    Fixed(Affine),
    /// `a` when the selector is 1, `b` when 0
    ByType { a: Affine, b: Affine },
}

impl ResolvedStat {
    pub(crate) fn branch(&self, type_set: bool) -> &Affine {
        match self {
            ResolvedStat::Fixed(e) => e,
            ResolvedStat::ByType { a, b } => {
                if type_set {
                    a
                } else {
                    b
                }
            }
        }
    }

    fn affines(&self) -> Vec<&Affine> {
        match self {
            ResolvedStat::Fixed(e) => vec![e],
            ResolvedStat::ByType { a, b } => vec![a, b],
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct ResolvedLatent {
    pub(crate) name: String,
    pub(crate) mean: ResolvedStat,
    pub(crate) stdev: ResolvedStat,
    pub(crate) non_negative: bool,
    pub(crate) rewarded: bool,
}

impl ResolvedLatent {
    /// Latents whose realized value this one reads, without duplicates.
    pub(crate) fn deps(&self) -> Vec<LatentId> {
        let mut out: Vec<LatentId> = vec![];
        for e in self.mean.affines().into_iter().chain(self.stdev.affines()) {
            for l in e.latent_refs() {
                if !out.contains(&l) {
                    out.push(l);
                }
            }
        }
        out
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Env {
    pub(crate) name: String,
    pub(crate) decisions: Vec<DecisionDecl>,
    pub(crate) decision_index: HashMap<String, DecisionId>,
    pub(crate) latents: Vec<ResolvedLatent>,
    pub(crate) latent_index: HashMap<String, LatentId>,
    pub(crate) selector: Option<DecisionId>,
    /// budget expression and its ceiling
    pub(crate) budget: Option<(Affine, f64)>,
    pub(crate) side: Vec<(String, Affine, Sense, f64)>,
    /// latents in dependency order: ancestors first
    pub(crate) order: Vec<LatentId>,
}

impl Env {
    pub(crate) fn decision_bounds(&self, d: DecisionId) -> (f64, f64) {
        self.decisions[d.0].domain.bounds()
    }
}

const PROFILE_A: &str = "profile_a";
const PROFILE_B: &str = "profile_b";
const PARAMS: &str = "params";

struct Resolver<'a> {
    spec: &'a ModelSpec,
    decision_index: &'a HashMap<String, DecisionId>,
    latent_index: &'a HashMap<String, LatentId>,
}

impl<'a> Resolver<'a> {
    fn table(&self, name: &str) -> &'a BTreeMap<String, f64> {
        match name {
            PROFILE_A => &self.spec.profile_a,
            PROFILE_B => &self.spec.profile_b,
            _ => &self.spec.params,
        }
    }

    fn coef(&self, c: &Coef, table: &str) -> Result<f64, SchemaError> {
        match c {
            Coef::Lit(v) => Ok(*v),
            Coef::Named(n) => self.table(table).get(n).copied().ok_or_else(|| {
                SchemaError::MissingCoefficient {
                    table: table.to_string(),
                    name: n.clone(),
                }
            }),
        }
    }

    fn decision(&self, name: &str) -> Result<DecisionId, SchemaError> {
        self.decision_index
            .get(name)
            .copied()
            .ok_or_else(|| SchemaError::UnknownDecision(name.to_string()))
    }

    /// `latent_context` is `None` where latent operands are allowed, otherwise
    /// it names the construct for the error message.
    fn affine(
        &self,
        decl: &AffineDecl,
        table: &str,
        latent_context: Option<&str>,
    ) -> Result<Affine, SchemaError> {
        let mut out = Affine {
            constant: self.coef(&decl.base, table)?,
            terms: vec![],
        };
        for t in &decl.terms {
            let c = self.coef(&t.coef, table)?;
            match &t.operand {
                Operand::Decision(n) => out.terms.push((Ref::Decision(self.decision(n)?), c)),
                Operand::Complement(n) => {
                    out.constant += c;
                    out.terms.push((Ref::Decision(self.decision(n)?), -c));
                }
                Operand::Latent(n) => {
                    if let Some(ctx) = latent_context {
                        return Err(SchemaError::LatentNotAllowed {
                            latent: n.clone(),
                            context: ctx.to_string(),
                        });
                    }
                    let l = self
                        .latent_index
                        .get(n)
                        .copied()
                        .ok_or_else(|| SchemaError::UnknownLatent(n.clone()))?;
                    out.terms.push((Ref::Latent(l), c));
                }
            }
        }
        Ok(out.merged())
    }

    fn stat(&self, decl: &StatDecl) -> Result<ResolvedStat, SchemaError> {
        Ok(match decl {
            StatDecl::Fixed(e) => ResolvedStat::Fixed(self.affine(e, PARAMS, None)?),
            StatDecl::ByType { a, b } => ResolvedStat::ByType {
                a: self.affine(a, PARAMS, None)?,
                b: self.affine(b, PARAMS, None)?,
            },
            StatDecl::Profiled(e) => ResolvedStat::ByType {
                a: self.affine(e, PROFILE_A, None)?,
                b: self.affine(e, PROFILE_B, None)?,
            },
        })
    }
}

fn check_domain(d: &DecisionDecl) -> Result<(), SchemaError> {
    let bad = match d.domain {
        Domain::Binary => false,
        Domain::Continuous { lb, ub } => lb.is_nan() || ub.is_nan() || lb > ub,
        Domain::Integer { lb, ub } => lb > ub,
    };
    if bad {
        let (lb, ub) = d.domain.bounds();
        return Err(SchemaError::BadBounds {
            name: d.name.clone(),
            lb,
            ub,
        });
    }
    Ok(())
}

pub(crate) fn build_env(spec: &ModelSpec) -> Result<Env, Error> {
    let mut decision_index: HashMap<String, DecisionId> = HashMap::new();
    let mut latent_index: HashMap<String, LatentId> = HashMap::new();

    for (i, d) in spec.decisions.iter().enumerate() {
        check_domain(d)?;
        if decision_index.insert(d.name.clone(), DecisionId(i)).is_some() {
            return Err(SchemaError::DuplicateName(d.name.clone()).into());
        }
    }
    for (i, l) in spec.latents.iter().enumerate() {
        if decision_index.contains_key(&l.name)
            || latent_index.insert(l.name.clone(), LatentId(i)).is_some()
        {
            return Err(SchemaError::DuplicateName(l.name.clone()).into());
        }
    }

    let selector = match &spec.type_selector {
        Some(name) => {
            let id = decision_index
                .get(name)
                .copied()
                .ok_or_else(|| SchemaError::UnknownDecision(name.clone()))?;
            if spec.decisions[id.0].domain != Domain::Binary {
                return Err(SchemaError::SelectorNotBinary(name.clone()).into());
            }
            Some(id)
        }
        None => None,
    };

    let r = Resolver {
        spec,
        decision_index: &decision_index,
        latent_index: &latent_index,
    };

    let mut latents = vec![];
    for l in &spec.latents {
        let mean = r.stat(&l.mean)?;
        let stdev = r.stat(&l.stdev)?;
        let conditioned = matches!(mean, ResolvedStat::ByType { .. })
            || matches!(stdev, ResolvedStat::ByType { .. });
        if conditioned && selector.is_none() {
            return Err(SchemaError::MissingTypeSelector(l.name.clone()).into());
        }
        latents.push(ResolvedLatent {
            name: l.name.clone(),
            mean,
            stdev,
            non_negative: l.non_negative,
            rewarded: l.rewarded,
        });
    }

    let budget = match &spec.budget {
        Some(b) => {
            let decl = AffineDecl {
                base: b.base.clone(),
                terms: b.costs.clone(),
            };
            Some((r.affine(&decl, PARAMS, Some("the budget"))?, b.ceiling))
        }
        None => None,
    };

    let mut side = vec![];
    for c in &spec.side_constraints {
        let ctx = format!("side constraint `{}`", c.name);
        let lhs = r.affine(&c.lhs, PARAMS, Some(&ctx))?;
        side.push((c.name.clone(), lhs, c.sense, c.rhs));
    }

    let order = resolve_order(&latents)?;

    Ok(Env {
        name: spec.name.clone(),
        decisions: spec.decisions.clone(),
        decision_index,
        latents,
        latent_index,
        selector,
        budget,
        side,
        order,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BudgetDecl, LatentDecl, SideConstraint};

    fn base() -> ModelSpec {
        ModelSpec::new("M")
            .with_decision(DecisionDecl::binary("type"))
            .with_decision(DecisionDecl::continuous("water", 250.0, 1000.0))
            .with_type_selector("type")
    }

    #[test]
    fn test_build_env_indices() {
        let spec = base().with_latent(LatentDecl::new(
            "stem",
            StatDecl::Fixed(AffineDecl::constant(15.0).plus(Operand::decision("water"), 0.001)),
            StatDecl::Fixed(AffineDecl::constant(1.0)),
        ));
        let env = build_env(&spec).unwrap();
        assert_eq!(env.decision_index["water"], DecisionId(1));
        assert_eq!(env.latent_index["stem"], LatentId(0));
        assert_eq!(env.selector, Some(DecisionId(0)));
        assert_eq!(env.order, vec![LatentId(0)]);
    }

    #[test]
    fn test_profiled_resolves_both_tables() {
        let spec = base()
            .with_profiles(
                [("Base", 15.0), ("Water", 0.0011)],
                [("Base", 15.0), ("Water", 0.001)],
            )
            .with_latent(LatentDecl::new(
                "stem",
                StatDecl::Profiled(AffineDecl::constant("Base").plus(Operand::decision("water"), "Water")),
                StatDecl::Fixed(AffineDecl::constant(1.0)),
            ));
        let env = build_env(&spec).unwrap();
        let mean = &env.latents[0].mean;
        assert_eq!(mean.branch(true).terms, vec![(Ref::Decision(DecisionId(1)), 0.0011)]);
        assert_eq!(mean.branch(false).terms, vec![(Ref::Decision(DecisionId(1)), 0.001)]);
    }

    #[test]
    fn test_missing_coefficient() {
        let spec = base()
            .with_profiles([("Base", 15.0)], [("Base", 15.0), ("Water", 0.001)])
            .with_latent(LatentDecl::new(
                "stem",
                StatDecl::Profiled(AffineDecl::constant("Base").plus(Operand::decision("water"), "Water")),
                StatDecl::Fixed(AffineDecl::constant(1.0)),
            ));
        let err = build_env(&spec).unwrap_err();
        assert_eq!(
            err,
            Error::Schema(SchemaError::MissingCoefficient {
                table: "profile_a".into(),
                name: "Water".into()
            })
        );
    }

    #[test]
    fn test_complement_expands() {
        let spec = base().with_budget(
            BudgetDecl::new(12.0)
                .cost(Operand::decision("type"), 1.5)
                .cost(Operand::complement("type"), 1.0)
                .cost(Operand::decision("water"), 0.015),
        );
        let env = build_env(&spec).unwrap();
        let (b, ceiling) = env.budget.unwrap();
        assert_eq!(ceiling, 12.0);
        assert_eq!(b.constant, 1.0);
        assert!((b.eval(&[1.0, 700.0], &[]) - 12.0).abs() < 1e-9);
        assert!((b.eval(&[0.0, 700.0], &[]) - 11.5).abs() < 1e-9);
    }

    #[test]
    fn test_schema_errors() {
        let dup = base().with_decision(DecisionDecl::binary("water"));
        assert_eq!(
            build_env(&dup).unwrap_err(),
            Error::Schema(SchemaError::DuplicateName("water".into()))
        );

        let unknown = base().with_latent(LatentDecl::new(
            "stem",
            StatDecl::Fixed(AffineDecl::constant(1.0).plus(Operand::decision("sun"), 1.0)),
            StatDecl::Fixed(AffineDecl::constant(1.0)),
        ));
        assert_eq!(
            build_env(&unknown).unwrap_err(),
            Error::Schema(SchemaError::UnknownDecision("sun".into()))
        );

        let dangling = base().with_latent(LatentDecl::new(
            "stem",
            StatDecl::Fixed(AffineDecl::constant(0.0).plus(Operand::latent("leaf"), 0.1)),
            StatDecl::Fixed(AffineDecl::constant(1.0)),
        ));
        assert_eq!(
            build_env(&dangling).unwrap_err(),
            Error::Schema(SchemaError::UnknownLatent("leaf".into()))
        );

        let mut no_selector = base().with_latent(LatentDecl::new(
            "stem",
            StatDecl::ByType {
                a: AffineDecl::constant(1.0),
                b: AffineDecl::constant(2.0),
            },
            StatDecl::Fixed(AffineDecl::constant(1.0)),
        ));
        no_selector.type_selector = None;
        assert_eq!(
            build_env(&no_selector).unwrap_err(),
            Error::Schema(SchemaError::MissingTypeSelector("stem".into()))
        );

        let not_binary = base().with_type_selector("water");
        assert_eq!(
            build_env(&not_binary).unwrap_err(),
            Error::Schema(SchemaError::SelectorNotBinary("water".into()))
        );

        let bad_bounds = base().with_decision(DecisionDecl::continuous("sun", 5.0, 1.0));
        assert!(matches!(
            build_env(&bad_bounds).unwrap_err(),
            Error::Schema(SchemaError::BadBounds { .. })
        ));
    }

    #[test]
    fn test_latent_rejected_in_side_constraint() {
        let spec = base()
            .with_latent(LatentDecl::new(
                "leaf",
                StatDecl::Fixed(AffineDecl::constant(1.0)),
                StatDecl::Fixed(AffineDecl::constant(1.0)),
            ))
            .with_side_constraint(SideConstraint {
                name: "cap".into(),
                lhs: AffineDecl::constant(0.0).plus(Operand::latent("leaf"), 1.0),
                sense: Sense::Le,
                rhs: 3.0,
            });
        assert!(matches!(
            build_env(&spec).unwrap_err(),
            Error::Schema(SchemaError::LatentNotAllowed { .. })
        ));
    }
}
