//! Redundancy diagnostics.
//!
//! Finds equations that are linearly dependent on the others at a point,
//! which is how an over-specified flowsheet usually shows up.

use fs_model::Assignment;
use nalgebra::DMatrix;

use crate::jacobian::finite_difference_jacobian;
use crate::system::System;

#[derive(Debug, Clone, PartialEq)]
pub struct RedundancyReport {
    pub equations: usize,
    pub variables: usize,
    /// Numerical rank of the Jacobian.
    pub rank: usize,
    /// Equations whose removal leaves the rank unchanged.
    pub candidates: Vec<String>,
}

fn rank(matrix: &DMatrix<f64>, rel_tol: f64) -> usize {
    if matrix.nrows() == 0 || matrix.ncols() == 0 {
        return 0;
    }
    let svd = matrix.clone().svd(false, false);
    let largest = svd.singular_values.max();
    if largest <= 0.0 {
        return 0;
    }
    svd.rank(rel_tol * largest)
}

/// Rank test of each equation against the others at `values`.
pub fn redundant_equations(system: &System, values: &Assignment, rel_tol: f64) -> RedundancyReport {
    let x = system.pack(values);
    let r = system.residual(&x);
    let jac = finite_difference_jacobian(&x, &r, |v| system.residual(v), 1e-6);
    let full = rank(&jac, rel_tol);

    let candidates = system
        .equation_labels()
        .enumerate()
        .filter(|(i, _)| rank(&jac.clone().remove_row(*i), rel_tol) == full)
        .map(|(_, label)| label.to_string())
        .collect();

    RedundancyReport {
        equations: system.equation_count(),
        variables: system.variable_count(),
        rank: full,
        candidates,
    }
}
