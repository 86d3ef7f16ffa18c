use crate::error::CompileError;
use crate::saa_codegen::env::{LatentId, ResolvedStat};
use crate::saa_codegen::generator::Generator;
use crate::saa_codegen::linear::{Constraint, LinearExpr, VarId};
use crate::Sense;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Which {
    Mean,
    Stdev,
}

impl Which {
    fn tag(self) -> &'static str {
        match self {
            Which::Mean => "mean",
            Which::Stdev => "stdev",
        }
    }
}

impl Generator {
    fn push(&mut self, name: String, expr: LinearExpr, sense: Sense) {
        self.ilp.constraints.push(Constraint {
            name,
            expr,
            sense,
            rhs: 0.0,
        });
    }

    /// Latent statistics in dependency order, so an ancestor's realized
    /// column exists before a dependent reads it.
    pub(crate) fn emit_latents(&mut self) -> Result<(), CompileError> {
        let order = self.env.order.clone();
        for l in order {
            self.emit_stat(l, Which::Mean)?;
            self.emit_stat(l, Which::Stdev)?;
        }
        Ok(())
    }

    fn emit_stat(&mut self, l: LatentId, which: Which) -> Result<(), CompileError> {
        let cols = self.latent_cols[l.0];
        let (col, stat) = match which {
            Which::Mean => (cols.mean, self.env.latents[l.0].mean.clone()),
            Which::Stdev => (cols.stdev, self.env.latents[l.0].stdev.clone()),
        };
        let quantity = format!("{}_{}", self.env.latents[l.0].name, which.tag());

        match stat {
            ResolvedStat::Fixed(e) => {
                let mut expr = LinearExpr::from_var(col, 1.0);
                expr.sub_inplace(&self.lower(&e));
                self.push(format!("{}_def", quantity), expr, Sense::Eq);
            }
            ResolvedStat::ByType { a, b } => {
                let t = self
                    .selector_col()
                    .ok_or_else(|| CompileError::MissingSelector(quantity.clone()))?;
                let m = self.big_m_for(&quantity, &a, &b)?;
                let ea = self.lower(&a);
                let eb = self.lower(&b);
                self.emit_disjunction(&quantity, col, t, &ea, &eb, m);
            }
        }
        Ok(())
    }

    /// `stat = a` when the selector is 1 and `stat = b` when it is 0:
    ///
    ///   stat <= a + M(1 - t),  stat >= a - M(1 - t)
    ///   stat <= b + M t,       stat >= b - M t
    fn emit_disjunction(
        &mut self,
        quantity: &str,
        col: VarId,
        t: VarId,
        a: &LinearExpr,
        b: &LinearExpr,
        m: f64,
    ) {
        let stat = LinearExpr::from_var(col, 1.0);
        let relax_a = LinearExpr::from_const(m).sub(LinearExpr::from_var(t, m));
        let relax_b = LinearExpr::from_var(t, m);

        let a_ub = stat.clone().sub(a.clone()).sub(relax_a.clone());
        let a_lb = stat.clone().sub(a.clone()).add(relax_a);
        let b_ub = stat.clone().sub(b.clone()).sub(relax_b.clone());
        let b_lb = stat.sub(b.clone()).add(relax_b);

        self.push(format!("{}_a_ub", quantity), a_ub, Sense::Le);
        self.push(format!("{}_a_lb", quantity), a_lb, Sense::Ge);
        self.push(format!("{}_b_ub", quantity), b_ub, Sense::Le);
        self.push(format!("{}_b_lb", quantity), b_lb, Sense::Ge);
    }

    pub(crate) fn emit_budget(&mut self) {
        let Some((cost, ceiling)) = self.env.budget.clone() else {
            return;
        };
        let expr = self.lower(&cost);
        self.ilp.constraints.push(Constraint {
            name: "budget".to_string(),
            expr,
            sense: Sense::Le,
            rhs: ceiling,
        });
    }

    pub(crate) fn emit_side_constraints(&mut self) {
        let side = self.env.side.clone();
        for (name, lhs, sense, rhs) in side {
            let expr = self.lower(&lhs);
            self.ilp.constraints.push(Constraint {
                name,
                expr,
                sense,
                rhs,
            });
        }
    }
}
