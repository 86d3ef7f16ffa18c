use crate::saa_codegen::bounds::{realization_ranges, Interval};
use crate::saa_codegen::env::{Affine, Env, LatentId, Ref};
use crate::saa_codegen::linear::{Ilp, LinearExpr, VarId};
use crate::saa_codegen::sources::SampleSet;
use crate::saa_codegen::BigM;
use crate::Domain;

/// Columns owned by one latent.
#[derive(Clone, Copy, Debug)]
pub(crate) struct LatentCols {
    pub(crate) mean: VarId,
    pub(crate) stdev: VarId,
    /// sample-averaged realization, only present when a dependent reads it
    pub(crate) realized: Option<VarId>,
}

pub(crate) struct Generator {
    pub(crate) env: Env,
    pub(crate) ilp: Ilp,
    pub(crate) samples: SampleSet,
    pub(crate) big_m: BigM,
    pub(crate) decision_cols: Vec<VarId>,
    pub(crate) latent_cols: Vec<LatentCols>,
    /// reachable range of each latent's realization
    pub(crate) ranges: Vec<Interval>,
    /// M chosen for each type-conditioned quantity, in emission order
    pub(crate) chosen_m: Vec<(String, f64)>,
}

impl Generator {
    pub(crate) fn new(env: Env, samples: SampleSet, big_m: BigM) -> Self {
        let mut ilp = Ilp::new();
        let decision_cols = env
            .decisions
            .iter()
            .map(|d| ilp.add_column(d.name.clone(), d.domain))
            .collect();
        let latent_cols = env
            .latents
            .iter()
            .map(|l| LatentCols {
                mean: ilp.add_column(
                    format!("{}_mean", l.name),
                    Domain::Continuous {
                        lb: f64::NEG_INFINITY,
                        ub: f64::INFINITY,
                    },
                ),
                stdev: ilp.add_column(
                    format!("{}_stdev", l.name),
                    Domain::Continuous {
                        lb: 0.0,
                        ub: f64::INFINITY,
                    },
                ),
                realized: None,
            })
            .collect();
        let ranges = realization_ranges(&env, &samples);
        Self {
            env,
            ilp,
            samples,
            big_m,
            decision_cols,
            latent_cols,
            ranges,
            chosen_m: vec![],
        }
    }

    pub(crate) fn selector_col(&self) -> Option<VarId> {
        self.env.selector.map(|d| self.decision_cols[d.0])
    }

    /// `mean + d̄ * stdev`: the reduced form of `(1/N) * sum_k (mean + stdev * d_k)`.
    pub(crate) fn sample_average(&self, l: LatentId) -> LinearExpr {
        let cols = self.latent_cols[l.0];
        let mut e = LinearExpr::from_var(cols.mean, 1.0);
        e.add_term(cols.stdev, self.samples.mean(l));
        e
    }

    /// Lower a resolved affine expression onto program columns. Latent
    /// operands read the realized column, creating it on first use.
    pub(crate) fn lower(&mut self, a: &Affine) -> LinearExpr {
        let mut e = LinearExpr::from_const(a.constant);
        for (r, c) in &a.terms {
            let v = match r {
                Ref::Decision(d) => self.decision_cols[d.0],
                Ref::Latent(l) => self.realized(*l),
            };
            e.add_term(v, *c);
        }
        e
    }

    pub(crate) fn normalize(&mut self) {
        self.ilp.normalize();
    }
}
