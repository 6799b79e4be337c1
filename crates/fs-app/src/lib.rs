//! Shared application service layer for flowtear.
//!
//! Frontends go through this crate to load flowsheet files, check degrees of
//! freedom, run solves or tearing loops, sweep initial guesses or parameter
//! values, and look for redundant equations.

pub mod error;
pub mod project_service;
pub mod run_service;

pub use error::{AppError, AppResult};
pub use project_service::{FlowsheetSummary, load_flowsheet, save_flowsheet, summarize};
pub use run_service::{
    CheckReport, DofSummary, ParameterPointSummary, ParameterSweepSummary, RedundancySummary,
    RunMode, RunReport, SweepPointSummary, SweepSummary, check, parameter_sweep, redundant, run,
    sweep,
};
