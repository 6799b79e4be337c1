//! Unit catalogue.
//!
//! Units refer to streams, components, parameters and extents by name; the
//! registry resolves names when the unit is added.

use fs_core::Real;
use fs_model::{EntityModel, Expr};

use crate::error::EquationResult;

/// A number written inline, or the name of a parameter holding it.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueRef {
    Value(Real),
    Param(String),
}

impl ValueRef {
    pub fn to_expr(&self, model: &EntityModel) -> EquationResult<Expr> {
        Ok(match self {
            ValueRef::Value(v) => Expr::constant(*v),
            ValueRef::Param(name) => Expr::param(model.parameter(name)?),
        })
    }

    /// Current numeric value.
    pub fn resolve(&self, model: &EntityModel) -> EquationResult<Real> {
        Ok(match self {
            ValueRef::Value(v) => *v,
            ValueRef::Param(name) => model.get_parameter(model.parameter(name)?)?.value,
        })
    }
}

impl From<Real> for ValueRef {
    fn from(value: Real) -> Self {
        ValueRef::Value(value)
    }
}

/// Outlet of a two-outlet separation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Top,
    Bottom,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Top => Side::Bottom,
            Side::Bottom => Side::Top,
        }
    }
}

/// Key component with its fractional recovery to its preferred outlet.
#[derive(Debug, Clone, PartialEq)]
pub struct KeySpec {
    pub component: String,
    pub recovery: ValueRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReactionSpec {
    pub extent: String,
    /// Stoichiometric coefficients, negative for reactants.
    pub stoichiometry: Vec<(String, Real)>,
}

/// `extent == conversion * Σ inlets[key]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionSpec {
    pub extent: String,
    pub key: String,
    pub conversion: ValueRef,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnitSpec {
    /// Two-outlet separation by fractional recovery of key components.
    /// Every other component goes sharply to one side.
    Splitter {
        inlet: String,
        top: String,
        bottom: String,
        light_key: Option<KeySpec>,
        heavy_key: Option<KeySpec>,
        sharp: Vec<(String, Side)>,
    },
    Mixer {
        inlets: Vec<String>,
        outlet: String,
    },
    Reactor {
        inlets: Vec<String>,
        outlet: String,
        reactions: Vec<ReactionSpec>,
        conversions: Vec<ConversionSpec>,
    },
    /// Split of one inlet into outlets of equal composition. Holds one
    /// fraction per outlet except the last.
    Divider {
        inlet: String,
        outlets: Vec<String>,
        fractions: Vec<ValueRef>,
    },
}

impl UnitSpec {
    pub fn kind_name(&self) -> &'static str {
        match self {
            UnitSpec::Splitter { .. } => "splitter",
            UnitSpec::Mixer { .. } => "mixer",
            UnitSpec::Reactor { .. } => "reactor",
            UnitSpec::Divider { .. } => "divider",
        }
    }

    pub fn inlets(&self) -> Vec<&str> {
        match self {
            UnitSpec::Splitter { inlet, .. } | UnitSpec::Divider { inlet, .. } => {
                vec![inlet.as_str()]
            }
            UnitSpec::Mixer { inlets, .. } | UnitSpec::Reactor { inlets, .. } => {
                inlets.iter().map(String::as_str).collect()
            }
        }
    }

    pub fn outlets(&self) -> Vec<&str> {
        match self {
            UnitSpec::Splitter { top, bottom, .. } => vec![top.as_str(), bottom.as_str()],
            UnitSpec::Mixer { outlet, .. } | UnitSpec::Reactor { outlet, .. } => {
                vec![outlet.as_str()]
            }
            UnitSpec::Divider { outlets, .. } => outlets.iter().map(String::as_str).collect(),
        }
    }
}
