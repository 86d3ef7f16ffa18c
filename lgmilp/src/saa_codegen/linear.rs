use crate::{Domain, Sense};
use std::collections::BTreeMap;

/// Column index in an `Ilp`, handed out in creation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(pub(crate) usize);

impl VarId {
    pub fn idx(&self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinearExpr {
    pub(crate) terms: BTreeMap<VarId, f64>,
    pub(crate) constant: f64,
}

impl LinearExpr {
    pub(crate) fn zero() -> Self {
        Self {
            terms: BTreeMap::new(),
            constant: 0.0,
        }
    }
    pub(crate) fn from_const(v: f64) -> Self {
        let mut e = Self::zero();
        e.constant = v;
        e
    }
    pub(crate) fn from_var(v: VarId, c: f64) -> Self {
        let mut e = Self::zero();
        if c != 0.0 {
            e.terms.insert(v, c);
        }
        e
    }
    pub(crate) fn add_term(&mut self, v: VarId, c: f64) {
        *self.terms.entry(v).or_insert(0.0) += c;
        self.terms.retain(|_, c| c.abs() > 1e-12);
    }
    pub(crate) fn add_inplace(&mut self, other: &LinearExpr) {
        self.constant += other.constant;
        for (k, v) in other.terms.iter() {
            *self.terms.entry(*k).or_insert(0.0) += *v;
        }
        self.terms.retain(|_, c| c.abs() > 1e-12);
    }
    pub(crate) fn sub_inplace(&mut self, other: &LinearExpr) {
        self.constant -= other.constant;
        for (k, v) in other.terms.iter() {
            *self.terms.entry(*k).or_insert(0.0) -= *v;
        }
        self.terms.retain(|_, c| c.abs() > 1e-12);
    }
    pub(crate) fn add(mut self, other: LinearExpr) -> LinearExpr {
        self.add_inplace(&other);
        self
    }
    pub(crate) fn sub(mut self, other: LinearExpr) -> LinearExpr {
        self.sub_inplace(&other);
        self
    }

    pub fn terms(&self) -> impl Iterator<Item = (VarId, f64)> + '_ {
        self.terms.iter().map(|(v, c)| (*v, *c))
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    /// Value of the expression at a full column assignment.
    pub fn eval(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .fold(self.constant, |acc, (v, c)| acc + c * values[v.0])
    }
}

#[derive(Clone, Debug)]
pub struct Column {
    pub(crate) name: String,
    pub(crate) domain: Domain,
}

impl Column {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn domain(&self) -> Domain {
        self.domain
    }
}

#[derive(Clone, Debug)]
pub struct Constraint {
    pub(crate) name: String,
    pub(crate) expr: LinearExpr, // lhs
    pub(crate) sense: Sense,
    pub(crate) rhs: f64,
}

impl Constraint {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn expr(&self) -> &LinearExpr {
        &self.expr
    }
    pub fn sense(&self) -> Sense {
        self.sense
    }
    pub fn rhs(&self) -> f64 {
        self.rhs
    }

    /// How far `values` are from satisfying the constraint; 0 when they do.
    pub fn violation(&self, values: &[f64]) -> f64 {
        let lhs = self.expr.eval(values);
        let v = match self.sense {
            Sense::Le => lhs - self.rhs,
            Sense::Ge => self.rhs - lhs,
            Sense::Eq => (lhs - self.rhs).abs(),
        };
        v.max(0.0)
    }

    pub fn is_satisfied(&self, values: &[f64], tol: f64) -> bool {
        self.violation(values) <= tol
    }
}

/// Flat maximization program handed to the solver oracle.
#[derive(Clone, Debug)]
pub struct Ilp {
    pub(crate) columns: Vec<Column>,
    pub(crate) objective: LinearExpr,
    pub(crate) constraints: Vec<Constraint>,
}

impl Ilp {
    pub(crate) fn new() -> Self {
        Self {
            columns: vec![],
            objective: LinearExpr::zero(),
            constraints: vec![],
        }
    }

    pub(crate) fn add_column(&mut self, name: String, domain: Domain) -> VarId {
        let id = VarId(self.columns.len());
        self.columns.push(Column { name, domain });
        id
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }
    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn column_by_name(&self, name: &str) -> Option<VarId> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .map(VarId)
    }

    /// Move constants of constraint left-hand sides to the right-hand side.
    pub(crate) fn normalize(&mut self) {
        for c in self.constraints.iter_mut() {
            if c.expr.constant.abs() > 1e-12 {
                c.rhs -= c.expr.constant;
            }
            c.expr.constant = 0.0;
        }
        self.objective.constant = 0.0;
    }
}

pub(crate) fn emit_lp(ilp: &Ilp) -> String {
    let names: Vec<String> = ilp.columns.iter().map(|c| sanitize(&c.name)).collect();
    let mut out = String::new();
    out.push_str("Maximize\n obj: ");
    out.push_str(&fmt_lin(&ilp.objective, &names));
    out.push('\n');
    out.push_str("Subject To\n");
    for c in &ilp.constraints {
        out.push_str(&format!(
            " {}: {} {} {}\n",
            sanitize(&c.name),
            fmt_lin(&c.expr, &names),
            fmt_sense(c.sense),
            fmt_num(c.rhs)
        ));
    }
    out.push_str("Bounds\n");
    for (col, name) in ilp.columns.iter().zip(&names) {
        if col.domain == Domain::Binary {
            continue;
        }
        let (lb, ub) = col.domain.bounds();
        let line = match (lb.is_finite(), ub.is_finite()) {
            (false, false) => format!(" {} free\n", name),
            (true, false) => format!(" {} >= {}\n", name, fmt_num(lb)),
            (false, true) => format!(" -inf <= {} <= {}\n", name, fmt_num(ub)),
            (true, true) => format!(" {} <= {} <= {}\n", fmt_num(lb), name, fmt_num(ub)),
        };
        out.push_str(&line);
    }
    let generals: Vec<&String> = ilp
        .columns
        .iter()
        .zip(&names)
        .filter(|(c, _)| matches!(c.domain, Domain::Integer { .. }))
        .map(|(_, n)| n)
        .collect();
    if !generals.is_empty() {
        out.push_str("General\n");
        for n in generals {
            out.push_str(&format!(" {}\n", n));
        }
    }
    out.push_str("Binary\n");
    for (col, name) in ilp.columns.iter().zip(&names) {
        if col.domain == Domain::Binary {
            out.push_str(&format!(" {}\n", name));
        }
    }
    out.push_str("End\n");
    out
}

fn fmt_sense(s: Sense) -> &'static str {
    match s {
        Sense::Le => "<=",
        Sense::Ge => ">=",
        Sense::Eq => "=",
    }
}

fn fmt_num(v: f64) -> String {
    if (v - v.round()).abs() < 1e-9 {
        format!("{}", v.round() as i64)
    } else {
        format!("{:.6}", v)
    }
}

fn fmt_lin(e: &LinearExpr, names: &[String]) -> String {
    let mut parts: Vec<String> = vec![];
    for (v, c) in e.terms.iter() {
        let n = &names[v.0];
        if (c - 1.0).abs() < 1e-12 {
            parts.push(format!("+1 {}", n));
        } else if (c + 1.0).abs() < 1e-12 {
            parts.push(format!("-1 {}", n));
        } else {
            parts.push(format!("{:+.6} {}", c, n));
        }
    }
    if parts.is_empty() {
        parts.push("+0".to_string());
    }
    if e.constant.abs() > 1e-12 {
        parts.push(format!("{:+.6}", e.constant));
    }
    parts.join(" ")
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
