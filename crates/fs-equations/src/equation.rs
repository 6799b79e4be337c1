//! Named constraints of the form `lhs == rhs`.

use crate::key::EquationKey;
use fs_core::{Real, VarId};
use fs_model::{Env, Expr};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    pub key: EquationKey,
    pub lhs: Expr,
    pub rhs: Expr,
    pub active: bool,
    pub region: Option<String>,
}

impl Equation {
    /// New active equation without a region tag.
    pub fn new(key: EquationKey, lhs: Expr, rhs: Expr) -> Self {
        Self {
            key,
            lhs,
            rhs,
            active: true,
            region: None,
        }
    }

    pub fn in_region(mut self, region: Option<String>) -> Self {
        self.region = region;
        self
    }

    /// `lhs - rhs` under `env`.
    pub fn residual<E: Env + ?Sized>(&self, env: &E) -> Real {
        self.lhs.eval(env) - self.rhs.eval(env)
    }

    pub fn vars(&self) -> BTreeSet<VarId> {
        let mut out = BTreeSet::new();
        self.lhs.collect_vars(&mut out);
        self.rhs.collect_vars(&mut out);
        out
    }

    pub fn is_affine(&self) -> bool {
        self.lhs.is_affine() && self.rhs.is_affine()
    }
}
