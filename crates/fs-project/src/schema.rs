//! Flowsheet file schema.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlowsheetFile {
    pub version: u32,
    pub name: String,
    pub components: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterDef>,
    #[serde(default)]
    pub streams: Vec<StreamDef>,
    #[serde(default)]
    pub unknowns: Vec<UnknownDef>,
    #[serde(default)]
    pub extents: Vec<ExtentDef>,
    #[serde(default)]
    pub units: Vec<UnitDef>,
    #[serde(default)]
    pub relations: Vec<RelationDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tearing: Option<TearingDef>,
    #[serde(default)]
    pub solver: SolverDef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep: Option<SweepDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_sweep: Option<ParameterSweepDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterDef {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamDef {
    pub name: String,
    pub kind: StreamKindDef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum StreamKindDef {
    /// Feed with known total flow and mole fractions.
    Fixed {
        total: f64,
        composition: BTreeMap<String, f64>,
    },
    Free {
        #[serde(default)]
        basis: BasisDef,
        #[serde(default)]
        init: InitDef,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BasisDef {
    #[default]
    Flows,
    Fractions,
}

/// Starting values of a free stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InitDef {
    pub total: f64,
    /// Value for every component flow or fraction not listed in `overrides`.
    pub component: f64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<String, f64>,
}

impl Default for InitDef {
    fn default() -> Self {
        Self {
            total: 1.0,
            component: 0.0,
            overrides: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnknownDef {
    pub name: String,
    #[serde(default)]
    pub initial: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtentDef {
    pub name: String,
    #[serde(default)]
    pub initial: f64,
}

/// A literal number or the name of a parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ValueDef {
    Value(f64),
    Parameter(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitDef {
    pub name: String,
    pub kind: UnitKindDef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum UnitKindDef {
    Splitter {
        inlet: String,
        top: String,
        bottom: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        light_key: Option<KeyDef>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        heavy_key: Option<KeyDef>,
        #[serde(default)]
        sharp: BTreeMap<String, SideDef>,
    },
    Mixer {
        inlets: Vec<String>,
        outlet: String,
    },
    Reactor {
        inlets: Vec<String>,
        outlet: String,
        #[serde(default)]
        reactions: Vec<ReactionDef>,
        #[serde(default)]
        conversions: Vec<ConversionDef>,
    },
    Divider {
        inlet: String,
        outlets: Vec<String>,
        fractions: Vec<ValueDef>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyDef {
    pub component: String,
    pub recovery: ValueDef,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SideDef {
    Top,
    Bottom,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReactionDef {
    pub extent: String,
    pub stoichiometry: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversionDef {
    pub extent: String,
    pub key: String,
    pub conversion: ValueDef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationDef {
    pub name: String,
    /// `lhs == rhs` over entity names.
    pub equation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TearingDef {
    pub streams: Vec<TearPairDef>,
    pub variables: Vec<TearPairDef>,
    pub tolerance: f64,
    pub max_iterations: usize,
    pub relaxation: f64,
}

impl Default for TearingDef {
    fn default() -> Self {
        Self {
            streams: Vec::new(),
            variables: Vec::new(),
            tolerance: 1e-4,
            max_iterations: 100,
            relaxation: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TearPairDef {
    pub guess: String,
    pub computed: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendDef {
    #[default]
    Newton,
    Linear,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SolverDef {
    pub backend: BackendDef,
    pub tolerance: f64,
    pub max_iterations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_s: Option<f64>,
    pub line_search_beta: f64,
    pub max_line_search_iters: usize,
}

impl Default for SolverDef {
    fn default() -> Self {
        Self {
            backend: BackendDef::Newton,
            tolerance: 1e-8,
            max_iterations: 100,
            timeout_s: None,
            line_search_beta: 0.5,
            max_line_search_iters: 40,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SweepDef {
    pub axes: Vec<AxisDef>,
}

/// One sweep axis: total-flow guesses of a torn stream, or values of a guess unknown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AxisDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
    pub values: Vec<f64>,
}

/// Values of one parameter to re-solve at, as a list or an inclusive range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterSweepDef {
    pub parameter: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<RangeDef>,
    /// Expression evaluated at every converged point; the best point maximizes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RangeDef {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}
