//! fs-model: entity model for flowsheets.
//!
//! Provides:
//! - Entity declarations (components, streams, parameters, extents, scalar unknowns)
//! - Relation expressions over those entities, with a small textual parser
//! - Unit/stream topology and recycle-loop detection
//!
//! # Example
//!
//! ```
//! use fs_model::{EntityModel, StreamSpec, StreamInit, CompositionBasis};
//!
//! let mut model = EntityModel::new();
//! model.declare_component("A").unwrap();
//! model.declare_component("B").unwrap();
//! model
//!     .declare_stream(StreamSpec::fixed("feed", 100.0, &[("A", 0.6), ("B", 0.4)]))
//!     .unwrap();
//! let top = model
//!     .declare_stream(StreamSpec::free(
//!         "top",
//!         CompositionBasis::Flows,
//!         StreamInit::uniform(50.0, 25.0),
//!     ))
//!     .unwrap();
//!
//! assert_eq!(model.stream_vars(top).len(), 3);
//! assert_eq!(model.free_variable_count(), 3);
//! ```

pub mod assignment;
pub mod entity;
pub mod error;
pub mod expr;
pub mod model;
pub mod parse;
pub mod topology;

// Re-exports for ergonomics
pub use assignment::Assignment;
pub use entity::{
    Bounds, Component, CompositionBasis, EntityKind, FixedFeed, Parameter, Stream, StreamInit,
    StreamKind, StreamShape, StreamSpec, VarRole, Variable,
};
pub use error::{ModelError, ModelResult};
pub use expr::{Env, Expr, ExprDisplay, SliceEnv};
pub use model::EntityModel;
pub use parse::{parse_expr, parse_relation};
pub use topology::Topology;
