//! Solve options.

use std::time::Duration;

use crate::newton::NewtonConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Newton,
    Linear,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolveOptions {
    pub backend: BackendKind,
    pub newton: NewtonConfig,
    /// Wall-clock limit for one solve, checked between iterations.
    pub timeout: Option<Duration>,
    /// Bound violations up to this size are accepted after convergence.
    pub bound_tolerance: f64,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            backend: BackendKind::Newton,
            newton: NewtonConfig::default(),
            timeout: None,
            bound_tolerance: 1e-6,
        }
    }
}
