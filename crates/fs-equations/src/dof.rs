//! Degrees-of-freedom accounting.
//!
//! A mismatch is reported as a [`DofStatus`] value, never as an error.

use core::fmt;
use std::collections::{BTreeMap, BTreeSet};

use fs_core::{Real, VarId};
use tracing::warn;

use crate::equation::Equation;
use crate::flowsheet::Flowsheet;

/// Unknowns held at a value for one solve (tear guesses).
pub type Pins = BTreeMap<VarId, Real>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DofStatus {
    Square,
    /// More unknowns than equations, by the given count.
    UnderDetermined(usize),
    /// More equations than unknowns, by the given count.
    OverDetermined(usize),
}

impl fmt::Display for DofStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DofStatus::Square => f.write_str("square"),
            DofStatus::UnderDetermined(n) => write!(f, "under-determined by {n}"),
            DofStatus::OverDetermined(n) => write!(f, "over-determined by {n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DofReport {
    /// Active equations that constrain the free unknowns, including the
    /// ones written over fixed unknowns and parameters only.
    pub equations: usize,
    /// Unknowns that are neither fixed nor pinned.
    pub unknowns: usize,
    pub dof: i64,
    pub status: DofStatus,
    /// Free unknowns that appear in no counted equation.
    pub unreferenced: Vec<String>,
    /// Counted equations with no free unknown; they can only be checked.
    pub fully_fixed: Vec<String>,
    /// Active equations left without free unknowns by pinning.
    pub suspended: Vec<String>,
}

impl DofReport {
    pub fn is_square(&self) -> bool {
        self.status == DofStatus::Square
    }
}

/// How an active equation enters a count for a given set of free unknowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquationRole {
    /// Touches at least one free unknown.
    Counted,
    /// Touches only fixed unknowns and parameters. Counted, and must hold
    /// at the fixed values.
    FullyFixed,
    /// Touches no free unknown but at least one pinned one. Left out until
    /// the pins are released.
    Suspended,
}

/// Unknowns that are neither fixed nor pinned, in id order.
pub fn free_variables(fs: &Flowsheet, pins: &Pins) -> BTreeSet<VarId> {
    fs.model
        .variables()
        .filter(|v| v.fixed.is_none() && !pins.contains_key(&v.id))
        .map(|v| v.id)
        .collect()
}

pub fn classify(eq: &Equation, free: &BTreeSet<VarId>, pins: &Pins) -> EquationRole {
    let vars = eq.vars();
    if vars.iter().any(|v| free.contains(v)) {
        EquationRole::Counted
    } else if vars.iter().any(|v| pins.contains_key(v)) {
        EquationRole::Suspended
    } else {
        EquationRole::FullyFixed
    }
}

/// Count the flowsheet as assembled.
pub fn count(fs: &Flowsheet) -> DofReport {
    count_with_pins(fs, &Pins::new())
}

/// Count the flowsheet with `pins` treated as parameters.
pub fn count_with_pins(fs: &Flowsheet, pins: &Pins) -> DofReport {
    let free = free_variables(fs, pins);
    let mut equations = 0;
    let mut fully_fixed = Vec::new();
    let mut suspended = Vec::new();
    let mut referenced = BTreeSet::new();

    for eq in fs.equations.iter_active() {
        match classify(eq, &free, pins) {
            EquationRole::Counted => {
                equations += 1;
                referenced.extend(eq.vars().into_iter().filter(|v| free.contains(v)));
            }
            EquationRole::FullyFixed => {
                equations += 1;
                fully_fixed.push(fs.label(&eq.key));
            }
            EquationRole::Suspended => suspended.push(fs.label(&eq.key)),
        }
    }

    let unreferenced = free
        .iter()
        .filter(|v| !referenced.contains(*v))
        .filter_map(|v| fs.model.var_name(*v).map(str::to_string))
        .collect();

    let unknowns = free.len();
    let dof = unknowns as i64 - equations as i64;
    let status = match dof {
        0 => DofStatus::Square,
        d if d > 0 => DofStatus::UnderDetermined(d as usize),
        d => DofStatus::OverDetermined(d.unsigned_abs() as usize),
    };
    if status != DofStatus::Square {
        warn!(equations, unknowns, dof, "degrees of freedom mismatch: {status}");
    }

    DofReport {
        equations,
        unknowns,
        dof,
        status,
        unreferenced,
        fully_fixed,
        suspended,
    }
}
