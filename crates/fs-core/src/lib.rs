//! fs-core: stable foundation for the flowsheet engine.
//!
//! Contains:
//! - numeric (Real and tear-vector helpers)
//! - ids (stable compact IDs for entities, equations and units)
//! - timing (stopwatch and cooperative deadlines for solver calls)

pub mod ids;
pub mod numeric;
pub mod timing;

pub use ids::*;
pub use numeric::*;
pub use timing::{Deadline, Timer};
