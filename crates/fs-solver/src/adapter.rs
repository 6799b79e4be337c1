//! Solve adapter: one back-end call per request, results as values.

use fs_core::{Deadline, Timer};
use fs_equations::{Flowsheet, Pins};
use fs_model::Assignment;
use tracing::debug;

use crate::backend::{BackendOutcome, SolveBackend};
use crate::error::SolverResult;
use crate::linear::LinearBackend;
use crate::newton::NewtonBackend;
use crate::options::{BackendKind, SolveOptions};
use crate::status::SolveStatus;
use crate::system::System;

#[derive(Debug, Clone, PartialEq)]
pub struct SolveDiagnostics {
    pub backend: &'static str,
    pub iterations: usize,
    pub residual_norm: f64,
    pub message: String,
    pub elapsed_s: f64,
    /// Unknowns outside their bounds after convergence.
    pub bound_violations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    /// A fresh assignment; the caller's input is never modified.
    pub values: Assignment,
    pub diagnostics: SolveDiagnostics,
}

impl SolveOutcome {
    /// The solved values, or the error matching a non-optimal status.
    pub fn into_result(self) -> SolverResult<Assignment> {
        self.status.into_result(self.diagnostics.message)?;
        Ok(self.values)
    }
}

/// Solve with the back-end chosen in `options`.
pub fn solve(system: &System, initial: &Assignment, options: &SolveOptions) -> SolveOutcome {
    match options.backend {
        BackendKind::Newton => solve_with(&NewtonBackend, system, initial, options),
        BackendKind::Linear => solve_with(&LinearBackend, system, initial, options),
    }
}

/// Solve with an explicit back-end.
pub fn solve_with(
    backend: &dyn SolveBackend,
    system: &System,
    initial: &Assignment,
    options: &SolveOptions,
) -> SolveOutcome {
    let timer = Timer::start("solve");
    let deadline = Deadline::after(options.timeout);
    let x0 = system.pack(initial);
    let inconsistent = system.inconsistent_fixed(options.newton.abs_tol);

    let raw = if let Some(i) = x0.iter().position(|v| !v.is_finite()) {
        BackendOutcome {
            status: SolveStatus::Error,
            message: format!("initial value of '{}' is not finite", system.variable_names()[i]),
            residual_norm: f64::NAN,
            iterations: 0,
            x: x0,
        }
    } else if !inconsistent.is_empty() {
        let detail: Vec<String> = inconsistent
            .iter()
            .map(|(label, r)| format!("{label} (residual {r:e})"))
            .collect();
        BackendOutcome {
            status: SolveStatus::Infeasible,
            message: format!("inconsistent fixed equations: {}", detail.join(", ")),
            residual_norm: inconsistent.iter().map(|(_, r)| r * r).sum::<f64>().sqrt(),
            iterations: 0,
            x: x0,
        }
    } else {
        backend.solve(system, x0, options, &deadline)
    };

    let mut status = raw.status;
    let mut message = raw.message;
    let mut bound_violations = Vec::new();
    if status == SolveStatus::Optimal {
        let violations = system.bound_violations(&raw.x, options.bound_tolerance);
        if !violations.is_empty() {
            bound_violations = violations.iter().map(|(name, _)| name.clone()).collect();
            let detail: Vec<String> = violations
                .iter()
                .map(|(name, by)| format!("{name} by {by:e}"))
                .collect();
            status = SolveStatus::Infeasible;
            message = format!("converged outside bounds: {}", detail.join(", "));
        }
    }

    let elapsed_s = timer.elapsed_s();
    debug!(
        backend = backend.name(),
        %status,
        iterations = raw.iterations,
        residual = raw.residual_norm,
        elapsed_s,
        "solve finished"
    );

    SolveOutcome {
        status,
        values: system.unpack(&raw.x),
        diagnostics: SolveDiagnostics {
            backend: backend.name(),
            iterations: raw.iterations,
            residual_norm: raw.residual_norm,
            message,
            elapsed_s,
            bound_violations,
        },
    }
}

/// Compile a flowsheet without pins and solve it from its initial values.
pub fn solve_flowsheet(fs: &Flowsheet, options: &SolveOptions) -> SolverResult<SolveOutcome> {
    let system = System::compile(fs, &Pins::new())?;
    Ok(solve(&system, &fs.model.initial_assignment(), options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fs_model::Bounds;
    use std::time::Duration;

    fn scalar(relations: &[&str], lower: Option<f64>) -> Flowsheet {
        let mut fs = Flowsheet::new();
        fs.model
            .declare_unknown("x", Bounds::new(lower, None), 0.0)
            .unwrap();
        for (i, r) in relations.iter().enumerate() {
            fs.add_relation(format!("r{i}"), r).unwrap();
        }
        fs
    }

    #[test]
    fn contradictory_relations_are_infeasible() {
        let fs = scalar(&["x == 5", "x == 6"], None);
        let out = solve_flowsheet(&fs, &SolveOptions::default()).unwrap();
        assert_eq!(out.status, SolveStatus::Infeasible);
        assert!(out.clone().into_result().is_err());
    }

    #[test]
    fn contradiction_between_fixed_value_and_relation_is_infeasible() {
        let mut fs = scalar(&["x == 6"], None);
        let x = fs.model.variable("x").unwrap();
        fs.model.fix(x, 5.0).unwrap();
        let out = solve_flowsheet(&fs, &SolveOptions::default()).unwrap();
        assert_eq!(out.status, SolveStatus::Infeasible);
        assert_eq!(out.diagnostics.iterations, 0);
        assert!(out.diagnostics.message.contains("relation:r0"), "{}", out.diagnostics.message);

        let mut consistent = scalar(&["x == 5"], None);
        let x = consistent.model.variable("x").unwrap();
        consistent.model.fix(x, 5.0).unwrap();
        let out = solve_flowsheet(&consistent, &SolveOptions::default()).unwrap();
        assert_eq!(out.status, SolveStatus::Optimal);
    }

    #[test]
    fn bound_violation_is_infeasible_not_clamped() {
        let fs = scalar(&["x == -3"], Some(0.0));
        let out = solve_flowsheet(&fs, &SolveOptions::default()).unwrap();
        assert_eq!(out.status, SolveStatus::Infeasible);
        assert_eq!(out.diagnostics.bound_violations, vec!["x".to_string()]);
        let x = fs.model.variable("x").unwrap();
        assert!((out.values.get(x) + 3.0).abs() < 1e-8);
    }

    #[test]
    fn zero_timeout_reports_timeout() {
        let fs = scalar(&["x == 2"], None);
        let options = SolveOptions {
            timeout: Some(Duration::ZERO),
            ..SolveOptions::default()
        };
        let out = solve_flowsheet(&fs, &options).unwrap();
        assert_eq!(out.status, SolveStatus::Timeout);
    }

    #[test]
    fn input_assignment_is_untouched() {
        let fs = scalar(&["x == 2"], None);
        let system = System::compile(&fs, &Pins::new()).unwrap();
        let initial = fs.model.initial_assignment();
        let before = initial.clone();
        let out = solve(&system, &initial, &SolveOptions::default());
        assert_eq!(out.status, SolveStatus::Optimal);
        assert_eq!(initial, before);
    }

    #[test]
    fn non_finite_initial_value_is_an_error() {
        let fs = scalar(&["x == 2"], None);
        let system = System::compile(&fs, &Pins::new()).unwrap();
        let initial = Assignment::filled(1, f64::NAN);
        let out = solve(&system, &initial, &SolveOptions::default());
        assert_eq!(out.status, SolveStatus::Error);
    }
}
