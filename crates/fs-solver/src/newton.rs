//! Gauss-Newton solver with backtracking line search.
//!
//! Square non-singular Jacobians are solved by LU; anything else falls back
//! to SVD least squares, so over- and under-determined systems still take
//! minimum-norm steps. Bounds are not enforced here.

use fs_core::Deadline;
use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::backend::{BackendOutcome, SolveBackend};
use crate::jacobian::finite_difference_jacobian;
use crate::options::SolveOptions;
use crate::status::SolveStatus;
use crate::system::System;

/// Newton solver configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct NewtonConfig {
    /// Maximum iterations
    pub max_iterations: usize,
    /// Absolute tolerance for the residual 2-norm
    pub abs_tol: f64,
    /// Line search backtracking factor
    pub line_search_beta: f64,
    /// Maximum line search iterations
    pub max_line_search_iters: usize,
    /// Relative finite-difference step
    pub fd_epsilon: f64,
    /// `‖Jᵀr‖ / (‖J‖ ‖r‖)` below this marks a stationary point of `‖r‖²`
    pub stationary_tol: f64,
    /// Singular values below this fraction of the largest are treated as zero
    pub svd_rel_eps: f64,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            abs_tol: 1e-8,
            line_search_beta: 0.5,
            max_line_search_iters: 40,
            fd_epsilon: 1e-7,
            stationary_tol: 1e-8,
            svd_rel_eps: 1e-12,
        }
    }
}

/// Why the iteration stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Converged,
    /// Residual above tolerance at a stationary point of `‖r‖²`.
    Stationary,
    IterationLimit,
    Timeout,
    LineSearchStalled,
    NonFinite,
}

/// Newton iteration result.
#[derive(Debug, Clone)]
pub struct NewtonResult {
    /// Last iterate
    pub x: DVector<f64>,
    /// Final residual norm
    pub residual_norm: f64,
    /// Number of iterations
    pub iterations: usize,
    pub termination: Termination,
}

/// Newton step `J dx = -r`: LU when square and non-singular, SVD least squares otherwise.
fn newton_step(jac: &DMatrix<f64>, r: &DVector<f64>, svd_rel_eps: f64) -> Option<DVector<f64>> {
    let rhs = -r;
    if jac.is_square() {
        if let Some(dx) = jac.clone().lu().solve(&rhs) {
            if dx.iter().all(|v| v.is_finite()) {
                return Some(dx);
            }
        }
    }
    let svd = jac.clone().svd(true, true);
    let largest = svd.singular_values.max();
    if !(largest.is_finite() && largest > 0.0) {
        return None;
    }
    svd.solve(&rhs, svd_rel_eps * largest).ok()
}

/// Cosine between the residual and the range of the Jacobian.
fn gradient_ratio(jac: &DMatrix<f64>, r: &DVector<f64>) -> f64 {
    let scale = jac.norm() * r.norm();
    if scale == 0.0 {
        return 0.0;
    }
    (jac.transpose() * r).norm() / scale
}

fn finish(x: DVector<f64>, residual_norm: f64, iterations: usize, termination: Termination) -> NewtonResult {
    NewtonResult {
        x,
        residual_norm,
        iterations,
        termination,
    }
}

/// Gauss-Newton iteration on `residual_fn` from `x0`.
pub fn newton_solve<F>(
    x0: DVector<f64>,
    residual_fn: F,
    config: &NewtonConfig,
    deadline: &Deadline,
) -> NewtonResult
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    let mut x = x0;
    let mut r = residual_fn(&x);
    let mut r_norm = r.norm();
    if !r_norm.is_finite() {
        return finish(x, r_norm, 0, Termination::NonFinite);
    }

    for iter in 0..config.max_iterations {
        if deadline.expired() {
            return finish(x, r_norm, iter, Termination::Timeout);
        }
        if r_norm <= config.abs_tol {
            return finish(x, r_norm, iter, Termination::Converged);
        }

        let jac = finite_difference_jacobian(&x, &r, &residual_fn, config.fd_epsilon);
        if gradient_ratio(&jac, &r) <= config.stationary_tol {
            return finish(x, r_norm, iter, Termination::Stationary);
        }
        let Some(dx) = newton_step(&jac, &r, config.svd_rel_eps) else {
            return finish(x, r_norm, iter, Termination::Stationary);
        };
        if dx.norm() <= f64::EPSILON * (1.0 + x.norm()) {
            return finish(x, r_norm, iter, Termination::Stationary);
        }

        // Backtrack until the residual norm decreases
        let mut alpha = 1.0;
        let mut accepted = None;
        for _ in 0..config.max_line_search_iters {
            if deadline.expired() {
                return finish(x, r_norm, iter, Termination::Timeout);
            }
            let x_new = &x + alpha * &dx;
            let r_new = residual_fn(&x_new);
            let r_new_norm = r_new.norm();
            if r_new_norm.is_finite() && r_new_norm < r_norm {
                accepted = Some((x_new, r_new, r_new_norm));
                break;
            }
            alpha *= config.line_search_beta;
        }

        let Some((x_new, r_new, r_new_norm)) = accepted else {
            let termination = if gradient_ratio(&jac, &r) <= config.stationary_tol.sqrt() {
                Termination::Stationary
            } else {
                Termination::LineSearchStalled
            };
            return finish(x, r_norm, iter, termination);
        };

        debug!(iteration = iter, residual = r_new_norm, alpha, "newton step");
        x = x_new;
        r = r_new;
        r_norm = r_new_norm;
    }

    let termination = if r_norm <= config.abs_tol {
        Termination::Converged
    } else {
        Termination::IterationLimit
    };
    finish(x, r_norm, config.max_iterations, termination)
}

/// Gauss-Newton back-end.
#[derive(Debug, Clone, Copy, Default)]
pub struct NewtonBackend;

impl SolveBackend for NewtonBackend {
    fn name(&self) -> &'static str {
        "newton"
    }

    fn solve(
        &self,
        system: &System,
        x0: DVector<f64>,
        options: &SolveOptions,
        deadline: &Deadline,
    ) -> BackendOutcome {
        let config = &options.newton;
        let result = newton_solve(x0, |x| system.residual(x), config, deadline);
        let (status, message) = match result.termination {
            Termination::Converged => (SolveStatus::Optimal, "converged".to_string()),
            Termination::Stationary => (
                SolveStatus::Infeasible,
                format!(
                    "residual stalled at {:e} on a stationary point",
                    result.residual_norm
                ),
            ),
            Termination::IterationLimit => (
                SolveStatus::IterationLimit,
                format!(
                    "{} iterations, residual {:e}",
                    config.max_iterations, result.residual_norm
                ),
            ),
            Termination::Timeout => (
                SolveStatus::Timeout,
                format!("deadline passed after {} iterations", result.iterations),
            ),
            Termination::LineSearchStalled => (
                SolveStatus::Error,
                format!(
                    "line search stalled at iteration {}, residual {:e}",
                    result.iterations, result.residual_norm
                ),
            ),
            Termination::NonFinite => (
                SolveStatus::Error,
                "residual is not finite at the initial point".to_string(),
            ),
        };
        BackendOutcome {
            status,
            x: result.x,
            iterations: result.iterations,
            residual_norm: result.residual_norm,
            message,
        }
    }
}
