//! Relation expressions over model entities.
//!
//! `Expr` is a flattened tree: sums and products hold their operands in a
//! `Vec`, so `a + b + c` is one `Add` node. Variables and parameters are held
//! by id; names are only needed to display an expression.

use crate::model::EntityModel;
use core::fmt;
use core::ops;
use fs_core::{ParamId, Real, VarId};
use std::collections::BTreeSet;

/// Source of variable and parameter values during evaluation.
pub trait Env {
    fn var(&self, id: VarId) -> Real;
    fn param(&self, id: ParamId) -> Real;
}

/// Environment backed by slot-indexed slices. Missing slots read as `NaN`.
#[derive(Debug, Clone, Copy)]
pub struct SliceEnv<'a> {
    pub vars: &'a [Real],
    pub params: &'a [Real],
}

impl Env for SliceEnv<'_> {
    fn var(&self, id: VarId) -> Real {
        self.vars.get(id.slot()).copied().unwrap_or(Real::NAN)
    }

    fn param(&self, id: ParamId) -> Real {
        self.params.get(id.slot()).copied().unwrap_or(Real::NAN)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(Real),
    Var(VarId),
    Param(ParamId),
    Add(Vec<Expr>),
    Mul(Vec<Expr>),
    Neg(Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, Real),
    Ln(Box<Expr>),
    Exp(Box<Expr>),
}

impl Expr {
    pub fn constant(value: Real) -> Self {
        Expr::Const(value)
    }

    pub fn var(id: VarId) -> Self {
        Expr::Var(id)
    }

    pub fn param(id: ParamId) -> Self {
        Expr::Param(id)
    }

    /// Sum of `terms`, flattening nested sums. An empty sum is `0`.
    pub fn sum(terms: impl IntoIterator<Item = Expr>) -> Self {
        let mut flat = Vec::new();
        for term in terms {
            match term {
                Expr::Add(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Expr::Const(0.0),
            1 => flat.remove(0),
            _ => Expr::Add(flat),
        }
    }

    /// Product of `factors`, flattening nested products. An empty product is `1`.
    pub fn product(factors: impl IntoIterator<Item = Expr>) -> Self {
        let mut flat = Vec::new();
        for factor in factors {
            match factor {
                Expr::Mul(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Expr::Const(1.0),
            1 => flat.remove(0),
            _ => Expr::Mul(flat),
        }
    }

    pub fn powf(self, exponent: Real) -> Self {
        Expr::Pow(Box::new(self), exponent)
    }

    pub fn ln(self) -> Self {
        Expr::Ln(Box::new(self))
    }

    pub fn exp(self) -> Self {
        Expr::Exp(Box::new(self))
    }

    pub fn eval<E: Env + ?Sized>(&self, env: &E) -> Real {
        match self {
            Expr::Const(v) => *v,
            Expr::Var(id) => env.var(*id),
            Expr::Param(id) => env.param(*id),
            Expr::Add(terms) => terms.iter().map(|t| t.eval(env)).sum(),
            Expr::Mul(factors) => factors.iter().map(|f| f.eval(env)).product(),
            Expr::Neg(inner) => -inner.eval(env),
            Expr::Div(num, den) => num.eval(env) / den.eval(env),
            Expr::Pow(base, p) => base.eval(env).powf(*p),
            Expr::Ln(inner) => inner.eval(env).ln(),
            Expr::Exp(inner) => inner.eval(env).exp(),
        }
    }

    /// Add every variable referenced by this expression to `out`.
    pub fn collect_vars(&self, out: &mut BTreeSet<VarId>) {
        match self {
            Expr::Const(_) | Expr::Param(_) => {}
            Expr::Var(id) => {
                out.insert(*id);
            }
            Expr::Add(items) | Expr::Mul(items) => {
                for item in items {
                    item.collect_vars(out);
                }
            }
            Expr::Neg(inner) | Expr::Pow(inner, _) | Expr::Ln(inner) | Expr::Exp(inner) => {
                inner.collect_vars(out)
            }
            Expr::Div(num, den) => {
                num.collect_vars(out);
                den.collect_vars(out);
            }
        }
    }

    /// Add every parameter referenced by this expression to `out`.
    pub fn collect_params(&self, out: &mut BTreeSet<ParamId>) {
        match self {
            Expr::Const(_) | Expr::Var(_) => {}
            Expr::Param(id) => {
                out.insert(*id);
            }
            Expr::Add(items) | Expr::Mul(items) => {
                for item in items {
                    item.collect_params(out);
                }
            }
            Expr::Neg(inner) | Expr::Pow(inner, _) | Expr::Ln(inner) | Expr::Exp(inner) => {
                inner.collect_params(out)
            }
            Expr::Div(num, den) => {
                num.collect_params(out);
                den.collect_params(out);
            }
        }
    }

    pub fn vars(&self) -> BTreeSet<VarId> {
        let mut out = BTreeSet::new();
        self.collect_vars(&mut out);
        out
    }

    pub fn has_vars(&self) -> bool {
        match self {
            Expr::Const(_) | Expr::Param(_) => false,
            Expr::Var(_) => true,
            Expr::Add(items) | Expr::Mul(items) => items.iter().any(Expr::has_vars),
            Expr::Neg(inner) | Expr::Pow(inner, _) | Expr::Ln(inner) | Expr::Exp(inner) => {
                inner.has_vars()
            }
            Expr::Div(num, den) => num.has_vars() || den.has_vars(),
        }
    }

    /// Numeric value if the expression holds only literals.
    pub fn const_value(&self) -> Option<Real> {
        match self {
            Expr::Const(v) => Some(*v),
            Expr::Var(_) | Expr::Param(_) => None,
            Expr::Add(terms) => terms.iter().map(Expr::const_value).sum(),
            Expr::Mul(factors) => factors.iter().map(Expr::const_value).product(),
            Expr::Neg(inner) => inner.const_value().map(|v| -v),
            Expr::Div(num, den) => Some(num.const_value()? / den.const_value()?),
            Expr::Pow(base, p) => base.const_value().map(|v| v.powf(*p)),
            Expr::Ln(inner) => inner.const_value().map(Real::ln),
            Expr::Exp(inner) => inner.const_value().map(Real::exp),
        }
    }

    /// True if the expression is affine in its variables.
    pub fn is_affine(&self) -> bool {
        match self {
            Expr::Const(_) | Expr::Param(_) | Expr::Var(_) => true,
            Expr::Add(terms) => terms.iter().all(Expr::is_affine),
            Expr::Mul(factors) => {
                let with_vars: Vec<&Expr> = factors.iter().filter(|f| f.has_vars()).collect();
                match with_vars.as_slice() {
                    [] => true,
                    [single] => single.is_affine(),
                    _ => false,
                }
            }
            Expr::Neg(inner) => inner.is_affine(),
            Expr::Div(num, den) => !den.has_vars() && num.is_affine(),
            Expr::Pow(base, p) => !base.has_vars() || (*p == 1.0 && base.is_affine()),
            Expr::Ln(inner) | Expr::Exp(inner) => !inner.has_vars(),
        }
    }

    /// Display the expression with entity names resolved through `model`.
    pub fn display<'a>(&'a self, model: &'a EntityModel) -> ExprDisplay<'a> {
        ExprDisplay { expr: self, model }
    }
}

impl From<Real> for Expr {
    fn from(value: Real) -> Self {
        Expr::Const(value)
    }
}

impl ops::Add for Expr {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        Expr::sum([self, rhs])
    }
}

impl ops::Sub for Expr {
    type Output = Expr;
    fn sub(self, rhs: Expr) -> Expr {
        Expr::sum([self, -rhs])
    }
}

impl ops::Mul for Expr {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        Expr::product([self, rhs])
    }
}

impl ops::Div for Expr {
    type Output = Expr;
    fn div(self, rhs: Expr) -> Expr {
        Expr::Div(Box::new(self), Box::new(rhs))
    }
}

impl ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        match self {
            Expr::Const(v) => Expr::Const(-v),
            Expr::Neg(inner) => *inner,
            other => Expr::Neg(Box::new(other)),
        }
    }
}

/// Canonical textual form of an [`Expr`]. The output parses back to the same tree.
pub struct ExprDisplay<'a> {
    expr: &'a Expr,
    model: &'a EntityModel,
}

// Binding strength, loosest first.
const PREC_ADD: u8 = 1;
const PREC_MUL: u8 = 2;
const PREC_NEG: u8 = 3;
const PREC_ATOM: u8 = 5;

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Add(_) => PREC_ADD,
        Expr::Mul(_) | Expr::Div(..) => PREC_MUL,
        Expr::Neg(_) => PREC_NEG,
        Expr::Const(v) if *v < 0.0 => PREC_NEG,
        Expr::Pow(..) => 4,
        _ => PREC_ATOM,
    }
}

impl ExprDisplay<'_> {
    fn write(&self, expr: &Expr, min_prec: u8, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let wrap = precedence(expr) < min_prec;
        if wrap {
            f.write_str("(")?;
        }
        match expr {
            Expr::Const(v) => write!(f, "{v}")?,
            Expr::Var(id) => match self.model.var_name(*id) {
                Some(name) => f.write_str(name)?,
                None => write!(f, "?v{id}")?,
            },
            Expr::Param(id) => match self.model.param_name(*id) {
                Some(name) => f.write_str(name)?,
                None => write!(f, "?p{id}")?,
            },
            Expr::Add(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    match term {
                        Expr::Neg(inner) if i > 0 => {
                            f.write_str(" - ")?;
                            self.write(inner, PREC_MUL, f)?;
                        }
                        Expr::Const(v) if i > 0 && *v < 0.0 => write!(f, " - {}", -v)?,
                        _ => {
                            if i > 0 {
                                f.write_str(" + ")?;
                            }
                            self.write(term, PREC_ADD + 1, f)?;
                        }
                    }
                }
            }
            Expr::Mul(factors) => {
                for (i, factor) in factors.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" * ")?;
                    }
                    self.write(factor, PREC_MUL + 1, f)?;
                }
            }
            Expr::Div(num, den) => {
                self.write(num, PREC_MUL + 1, f)?;
                f.write_str(" / ")?;
                self.write(den, PREC_MUL + 1, f)?;
            }
            Expr::Neg(inner) => {
                f.write_str("-")?;
                self.write(inner, PREC_NEG + 1, f)?;
            }
            Expr::Pow(base, p) => {
                self.write(base, PREC_ATOM, f)?;
                write!(f, "^{p}")?;
            }
            Expr::Ln(inner) => {
                f.write_str("ln(")?;
                self.write(inner, 0, f)?;
                f.write_str(")")?;
            }
            Expr::Exp(inner) => {
                f.write_str("exp(")?;
                self.write(inner, 0, f)?;
                f.write_str(")")?;
            }
        }
        if wrap {
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl fmt::Display for ExprDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(self.expr, 0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Bounds;

    fn model_xy() -> (EntityModel, VarId, VarId) {
        let mut m = EntityModel::new();
        let x = m.declare_unknown("x", Bounds::FREE, 1.0).unwrap();
        let y = m.declare_unknown("y", Bounds::FREE, 2.0).unwrap();
        (m, x, y)
    }

    #[test]
    fn sum_and_product_flatten() {
        let (_, x, y) = model_xy();
        let e = (Expr::var(x) + Expr::var(y)) + Expr::constant(3.0);
        assert!(matches!(&e, Expr::Add(t) if t.len() == 3));
        let p = Expr::var(x) * (Expr::var(y) * Expr::constant(2.0));
        assert!(matches!(&p, Expr::Mul(f) if f.len() == 3));
        assert_eq!(Expr::sum([]), Expr::Const(0.0));
        assert_eq!(Expr::product([]), Expr::Const(1.0));
    }

    #[test]
    fn eval_covers_every_node() {
        let (_, x, y) = model_xy();
        let vars = [2.0, 8.0];
        let env = SliceEnv {
            vars: &vars,
            params: &[],
        };
        let e = (Expr::var(x) * Expr::var(y) - Expr::var(y) / Expr::var(x)).powf(0.5);
        assert!((e.eval(&env) - 12.0_f64.sqrt()).abs() < 1e-12);
        let l = Expr::var(y).ln().exp();
        assert!((l.eval(&env) - 8.0).abs() < 1e-12);
    }

    #[test]
    fn collect_vars_and_affinity() {
        let (_, x, y) = model_xy();
        let lin = Expr::constant(2.0) * Expr::var(x) - Expr::var(y) / Expr::constant(4.0);
        assert!(lin.is_affine());
        assert_eq!(lin.vars().len(), 2);
        let bilinear = Expr::var(x) * Expr::var(y);
        assert!(!bilinear.is_affine());
        assert!(!Expr::var(x).ln().is_affine());
        assert!(Expr::constant(4.0).ln().is_affine());
    }

    #[test]
    fn display_is_canonical() {
        let (m, x, y) = model_xy();
        let e = Expr::constant(2.0) * (Expr::var(x) + Expr::var(y)) - Expr::var(y);
        assert_eq!(e.display(&m).to_string(), "2 * (x + y) - y");
        let p = (Expr::constant(1.0) - Expr::var(x)).powf(1.544);
        assert_eq!(p.display(&m).to_string(), "(1 - x)^1.544");
        let d = Expr::var(x) / (Expr::var(y) * Expr::constant(3.0));
        assert_eq!(d.display(&m).to_string(), "x / (y * 3)");
    }

    #[test]
    fn const_value_folds_literals() {
        let e = Expr::constant(2.0).powf(3.0) - Expr::constant(1.0);
        assert_eq!(e.const_value(), Some(7.0));
        let (_, x, _) = model_xy();
        assert_eq!((Expr::var(x) + Expr::constant(1.0)).const_value(), None);
    }
}
