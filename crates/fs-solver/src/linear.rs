//! One-shot linear least-squares back-end.

use fs_core::Deadline;
use nalgebra::DVector;

use crate::backend::{BackendOutcome, SolveBackend};
use crate::jacobian::finite_difference_jacobian;
use crate::options::SolveOptions;
use crate::status::SolveStatus;
use crate::system::System;

/// Solves affine systems with a single least-squares step from the initial guess.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearBackend;

impl SolveBackend for LinearBackend {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn solve(
        &self,
        system: &System,
        x0: DVector<f64>,
        options: &SolveOptions,
        deadline: &Deadline,
    ) -> BackendOutcome {
        let config = &options.newton;
        let outcome = |status, x, iterations, residual_norm, message: String| BackendOutcome {
            status,
            x,
            iterations,
            residual_norm,
            message,
        };

        let r0 = system.residual(&x0);
        let r0_norm = r0.norm();
        if deadline.expired() {
            return outcome(SolveStatus::Timeout, x0, 0, r0_norm, "deadline passed before solve".into());
        }
        if !system.is_linear() {
            return outcome(SolveStatus::Error, x0, 0, r0_norm, "system is not linear".into());
        }
        if !r0_norm.is_finite() {
            return outcome(SolveStatus::Error, x0, 0, r0_norm, "residual is not finite".into());
        }
        if r0_norm <= config.abs_tol {
            return outcome(SolveStatus::Optimal, x0, 0, r0_norm, "initial point satisfies the system".into());
        }

        // Any step is exact for an affine residual; a unit step keeps roundoff small.
        let jac = finite_difference_jacobian(&x0, &r0, |x| system.residual(x), 1.0);
        let svd = jac.clone().svd(true, true);
        let largest = svd.singular_values.max();
        let dx = if largest.is_finite() && largest > 0.0 {
            svd.solve(&(-&r0), config.svd_rel_eps * largest).ok()
        } else {
            None
        };
        let Some(dx) = dx else {
            return outcome(SolveStatus::Infeasible, x0, 1, r0_norm, "Jacobian is zero".into());
        };

        let x = &x0 + dx;
        let r = system.residual(&x);
        let r_norm = r.norm();
        let tolerance = config.abs_tol.max(1e-10 * r0_norm);
        if r_norm <= tolerance {
            return outcome(SolveStatus::Optimal, x, 1, r_norm, "solved".into());
        }
        let ratio = (jac.transpose() * &r).norm() / (jac.norm() * r_norm);
        if ratio <= config.stationary_tol.sqrt() {
            outcome(
                SolveStatus::Infeasible,
                x,
                1,
                r_norm,
                format!("least-squares residual {r_norm:e} is not zero"),
            )
        } else {
            outcome(
                SolveStatus::Error,
                x,
                1,
                r_norm,
                format!("least-squares step left residual {r_norm:e}"),
            )
        }
    }
}
