//! Entity declarations: components, streams, unknowns and parameters.

use core::fmt;
use fs_core::{ComponentId, ParamId, Real, StreamId, VarId};

/// Kind of a named entity, used in error messages and name lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Component,
    Stream,
    Variable,
    Parameter,
    Unit,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::Component => "component",
            EntityKind::Stream => "stream",
            EntityKind::Variable => "variable",
            EntityKind::Parameter => "parameter",
            EntityKind::Unit => "unit",
        };
        f.write_str(s)
    }
}

/// A chemical species. Its identity never changes after declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub id: ComponentId,
    pub name: String,
}

/// Inclusive bounds on an unknown. `None` means unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub lower: Option<Real>,
    pub upper: Option<Real>,
}

impl Bounds {
    pub const FREE: Bounds = Bounds {
        lower: None,
        upper: None,
    };
    pub const NON_NEGATIVE: Bounds = Bounds {
        lower: Some(0.0),
        upper: None,
    };
    pub const FRACTION: Bounds = Bounds {
        lower: Some(0.0),
        upper: Some(1.0),
    };

    pub fn new(lower: Option<Real>, upper: Option<Real>) -> Self {
        Self { lower, upper }
    }

    /// Distance by which `value` lies outside the bounds (0 when inside).
    pub fn violation(&self, value: Real) -> Real {
        let below = self.lower.map_or(0.0, |lo| (lo - value).max(0.0));
        let above = self.upper.map_or(0.0, |hi| (value - hi).max(0.0));
        below.max(above)
    }
}

/// What an unknown represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarRole {
    TotalFlow { stream: StreamId },
    ComponentFlow { stream: StreamId, component: ComponentId },
    MoleFraction { stream: StreamId, component: ComponentId },
    Extent,
    Scalar,
}

impl VarRole {
    pub fn stream(&self) -> Option<StreamId> {
        match *self {
            VarRole::TotalFlow { stream }
            | VarRole::ComponentFlow { stream, .. }
            | VarRole::MoleFraction { stream, .. } => Some(stream),
            VarRole::Extent | VarRole::Scalar => None,
        }
    }
}

/// A named unknown.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub id: VarId,
    pub name: String,
    pub role: VarRole,
    pub bounds: Bounds,
    pub initial: Real,
    /// Value the unknown is fixed at, if any. Fixed unknowns are not solved for.
    pub fixed: Option<Real>,
    pub region: Option<String>,
}

/// A named read-only value.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub id: ParamId,
    pub name: String,
    pub value: Real,
    pub region: Option<String>,
}

/// How the composition of a free stream is represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositionBasis {
    /// Total flow plus one flow per component.
    Flows,
    /// Total flow plus one mole fraction per component.
    Fractions,
}

/// Storage of a stream's quantities. Per-component vectors follow component order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamShape {
    Fixed {
        total: ParamId,
        fractions: Vec<ParamId>,
    },
    Flows {
        total: VarId,
        flows: Vec<VarId>,
    },
    Fractions {
        total: VarId,
        fractions: Vec<VarId>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stream {
    pub id: StreamId,
    pub name: String,
    pub shape: StreamShape,
    pub region: Option<String>,
}

impl Stream {
    pub fn is_fixed(&self) -> bool {
        matches!(self.shape, StreamShape::Fixed { .. })
    }

    pub fn basis(&self) -> Option<CompositionBasis> {
        match self.shape {
            StreamShape::Fixed { .. } => None,
            StreamShape::Flows { .. } => Some(CompositionBasis::Flows),
            StreamShape::Fractions { .. } => Some(CompositionBasis::Fractions),
        }
    }
}

/// Feed definition: total flow and mole fractions by component name.
/// Components not listed have a fraction of zero.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedFeed {
    pub total: Real,
    pub composition: Vec<(String, Real)>,
}

impl FixedFeed {
    /// Build a feed from non-negative ratios, normalized to mole fractions.
    pub fn from_ratios(total: Real, ratios: &[(&str, Real)]) -> Option<Self> {
        let sum: Real = ratios.iter().map(|(_, r)| *r).sum();
        if !(sum.is_finite() && sum > 0.0) || ratios.iter().any(|(_, r)| *r < 0.0) {
            return None;
        }
        Some(Self {
            total,
            composition: ratios
                .iter()
                .map(|(name, r)| (name.to_string(), r / sum))
                .collect(),
        })
    }

    pub fn fraction_sum(&self) -> Real {
        self.composition.iter().map(|(_, z)| *z).sum()
    }
}

/// Initial values for the unknowns of a free stream.
///
/// `component` is a flow for the `Flows` basis and a mole fraction for the
/// `Fractions` basis. Overrides replace it for single components.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInit {
    pub total: Real,
    pub component: Real,
    pub overrides: Vec<(String, Real)>,
}

impl StreamInit {
    pub fn uniform(total: Real, component: Real) -> Self {
        Self {
            total,
            component,
            overrides: Vec::new(),
        }
    }

    pub fn with_component(mut self, name: impl Into<String>, value: Real) -> Self {
        self.overrides.push((name.into(), value));
        self
    }

    pub fn component_value(&self, name: &str) -> Real {
        self.overrides
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map_or(self.component, |(_, v)| *v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamKind {
    Fixed(FixedFeed),
    Free {
        basis: CompositionBasis,
        init: StreamInit,
    },
}

/// Everything needed to declare a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSpec {
    pub name: String,
    pub kind: StreamKind,
    pub region: Option<String>,
}

impl StreamSpec {
    pub fn fixed(name: impl Into<String>, total: Real, composition: &[(&str, Real)]) -> Self {
        Self {
            name: name.into(),
            kind: StreamKind::Fixed(FixedFeed {
                total,
                composition: composition
                    .iter()
                    .map(|(c, z)| (c.to_string(), *z))
                    .collect(),
            }),
            region: None,
        }
    }

    pub fn free(name: impl Into<String>, basis: CompositionBasis, init: StreamInit) -> Self {
        Self {
            name: name.into(),
            kind: StreamKind::Free { basis, init },
            region: None,
        }
    }

    pub fn in_region(mut self, tag: impl Into<String>) -> Self {
        self.region = Some(tag.into());
        self
    }
}
