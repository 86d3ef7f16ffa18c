//! Chained latents: dependency ordering and realized-value columns.
//!
//! A latent whose statistics read another latent's realization can only be
//! constrained once that ancestor's sample average is bound to a column.

use crate::error::CompileError;
use crate::saa_codegen::env::{LatentId, ResolvedLatent};
use crate::saa_codegen::generator::Generator;
use crate::saa_codegen::linear::{Constraint, LinearExpr, VarId};
use crate::{Domain, Sense};
use std::collections::BTreeSet;

/// Orders latents so every ancestor precedes its dependents.
///
/// Ties keep declaration order, so the same schema always compiles to the same
/// constraint sequence.
pub(crate) fn resolve_order(latents: &[ResolvedLatent]) -> Result<Vec<LatentId>, CompileError> {
    let deps: Vec<Vec<LatentId>> = latents.iter().map(ResolvedLatent::deps).collect();
    let mut pending: Vec<usize> = deps.iter().map(Vec::len).collect();
    let mut ready: BTreeSet<usize> = (0..latents.len()).filter(|&i| pending[i] == 0).collect();
    let mut order = Vec::with_capacity(latents.len());

    while let Some(i) = ready.pop_first() {
        order.push(LatentId(i));
        for (j, ds) in deps.iter().enumerate() {
            let hits = ds.iter().filter(|d| d.0 == i).count();
            if hits > 0 {
                pending[j] -= hits;
                if pending[j] == 0 {
                    ready.insert(j);
                }
            }
        }
    }

    if order.len() < latents.len() {
        return Err(CompileError::CyclicDependency(find_cycle(latents, &deps, &pending)));
    }
    Ok(order)
}

/// Walks unresolved dependencies until a latent repeats.
fn find_cycle(latents: &[ResolvedLatent], deps: &[Vec<LatentId>], pending: &[usize]) -> Vec<String> {
    let Some(start) = (0..latents.len()).find(|&i| pending[i] > 0) else {
        return vec![];
    };
    let mut path: Vec<usize> = vec![];
    let mut cur = start;
    loop {
        if let Some(pos) = path.iter().position(|&p| p == cur) {
            let mut names: Vec<String> = path[pos..].iter().map(|&p| latents[p].name.clone()).collect();
            names.push(latents[cur].name.clone());
            return names;
        }
        path.push(cur);
        // an unresolved node always has an unresolved dependency
        match deps[cur].iter().find(|d| pending[d.0] > 0) {
            Some(next) => cur = next.0,
            None => return path.iter().map(|&p| latents[p].name.clone()).collect(),
        }
    }
}

impl Generator {
    /// Column holding `(1/N) * sum_k (mean + stdev * d_k)` for `l`, created on
    /// first use and bound by an equality constraint.
    pub(crate) fn realized(&mut self, l: LatentId) -> VarId {
        if let Some(v) = self.latent_cols[l.0].realized {
            return v;
        }
        let name = format!("{}_value", self.env.latents[l.0].name);
        let v = self.ilp.add_column(
            name.clone(),
            Domain::Continuous {
                lb: f64::NEG_INFINITY,
                ub: f64::INFINITY,
            },
        );
        let mut expr = LinearExpr::from_var(v, 1.0);
        expr.sub_inplace(&self.sample_average(l));
        self.ilp.constraints.push(Constraint {
            name: format!("{}_saa", name),
            expr,
            sense: Sense::Eq,
            rhs: 0.0,
        });
        self.latent_cols[l.0].realized = Some(v);
        v
    }
}
