//! Nonlinear system solve adapter for flowsheets.
//!
//! A [`System`] is compiled from a flowsheet's active equations and free
//! unknowns. [`solve`] hands it to a [`SolveBackend`] once and reports a
//! [`SolveStatus`] together with a fresh assignment; it never retries and
//! never clamps values into bounds.

pub mod adapter;
pub mod backend;
pub mod diagnostics;
pub mod error;
pub mod jacobian;
pub mod linear;
pub mod newton;
pub mod options;
pub mod status;
pub mod system;

pub use adapter::{SolveDiagnostics, SolveOutcome, solve, solve_flowsheet, solve_with};
pub use backend::{BackendOutcome, SolveBackend};
pub use diagnostics::{RedundancyReport, redundant_equations};
pub use error::{SolverError, SolverResult};
pub use linear::LinearBackend;
pub use newton::{NewtonBackend, NewtonConfig, NewtonResult, Termination};
pub use options::{BackendKind, SolveOptions};
pub use status::SolveStatus;
pub use system::System;
