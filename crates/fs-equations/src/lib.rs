//! fs-equations: equation registry, unit templates and degrees-of-freedom checks.
//!
//! A [`Flowsheet`] pairs an [`EntityModel`](fs_model::EntityModel) with an
//! [`EquationRegistry`]. Units declared through [`UnitSpec`] expand into
//! keyed equations; [`dof::count`] reports whether the result is square.

pub mod dof;
pub mod equation;
pub mod error;
pub mod flowsheet;
pub mod key;
pub mod registry;
pub mod templates;
pub mod units;

pub use dof::{
    DofReport, DofStatus, EquationRole, Pins, classify, count, count_with_pins, free_variables,
};
pub use equation::Equation;
pub use error::{EquationError, EquationResult};
pub use flowsheet::Flowsheet;
pub use key::{EquationKey, EquationKind, Scope};
pub use registry::{EquationRegistry, UnitRecord};
pub use units::{ConversionSpec, KeySpec, ReactionSpec, Side, UnitSpec, ValueRef};
