//! Turning a validated file into a live flowsheet.

use std::time::Duration;

use fs_equations::{ConversionSpec, Flowsheet, KeySpec, ReactionSpec, Side, UnitSpec, ValueRef};
use fs_model::{Bounds, CompositionBasis, StreamInit, StreamSpec, parse_expr};
use fs_solver::{BackendKind, NewtonConfig, SolveOptions};
use fs_tearing::{GuessGrid, ParameterSweep, TearOptions, TearSet};
use tracing::warn;

use crate::ProjectResult;
use crate::schema::{
    BackendDef, BasisDef, FlowsheetFile, ParameterSweepDef, SideDef, SolverDef, StreamKindDef,
    UnitKindDef, ValueDef,
};
use crate::validate::validate_file;

/// Everything needed to run a flowsheet file.
#[derive(Debug, Clone)]
pub struct BuiltFlowsheet {
    pub name: String,
    pub flowsheet: Flowsheet,
    pub tear_set: Option<TearSet>,
    pub tear_options: TearOptions,
    pub solve_options: SolveOptions,
    pub sweep: Option<GuessGrid>,
    pub parameter_sweep: Option<ParameterSweep>,
    /// Non-fatal findings, e.g. recycle loops left untorn.
    pub warnings: Vec<String>,
}

fn build_parameter_sweep(fs: &Flowsheet, def: &ParameterSweepDef) -> ProjectResult<ParameterSweep> {
    let values = match &def.range {
        Some(r) => ParameterSweep::range(r.start, r.stop, r.step)?,
        None => def.values.clone(),
    };
    let mut sweep = ParameterSweep::new(fs.model.parameter(&def.parameter)?, values);
    if let Some(text) = &def.objective {
        sweep = sweep.with_objective(parse_expr(text, &fs.model)?);
    }
    Ok(sweep)
}

fn value_ref(v: &ValueDef) -> ValueRef {
    match v {
        ValueDef::Value(x) => ValueRef::Value(*x),
        ValueDef::Parameter(name) => ValueRef::Param(name.clone()),
    }
}

fn unit_spec(kind: &UnitKindDef) -> UnitSpec {
    match kind {
        UnitKindDef::Splitter {
            inlet,
            top,
            bottom,
            light_key,
            heavy_key,
            sharp,
        } => {
            let key = |k: &crate::schema::KeyDef| KeySpec {
                component: k.component.clone(),
                recovery: value_ref(&k.recovery),
            };
            UnitSpec::Splitter {
                inlet: inlet.clone(),
                top: top.clone(),
                bottom: bottom.clone(),
                light_key: light_key.as_ref().map(key),
                heavy_key: heavy_key.as_ref().map(key),
                sharp: sharp
                    .iter()
                    .map(|(c, side)| {
                        let side = match side {
                            SideDef::Top => Side::Top,
                            SideDef::Bottom => Side::Bottom,
                        };
                        (c.clone(), side)
                    })
                    .collect(),
            }
        }
        UnitKindDef::Mixer { inlets, outlet } => UnitSpec::Mixer {
            inlets: inlets.clone(),
            outlet: outlet.clone(),
        },
        UnitKindDef::Reactor {
            inlets,
            outlet,
            reactions,
            conversions,
        } => UnitSpec::Reactor {
            inlets: inlets.clone(),
            outlet: outlet.clone(),
            reactions: reactions
                .iter()
                .map(|r| ReactionSpec {
                    extent: r.extent.clone(),
                    stoichiometry: r.stoichiometry.iter().map(|(c, nu)| (c.clone(), *nu)).collect(),
                })
                .collect(),
            conversions: conversions
                .iter()
                .map(|c| ConversionSpec {
                    extent: c.extent.clone(),
                    key: c.key.clone(),
                    conversion: value_ref(&c.conversion),
                })
                .collect(),
        },
        UnitKindDef::Divider {
            inlet,
            outlets,
            fractions,
        } => UnitSpec::Divider {
            inlet: inlet.clone(),
            outlets: outlets.clone(),
            fractions: fractions.iter().map(value_ref).collect(),
        },
    }
}

pub fn solve_options(def: &SolverDef) -> SolveOptions {
    SolveOptions {
        backend: match def.backend {
            BackendDef::Newton => BackendKind::Newton,
            BackendDef::Linear => BackendKind::Linear,
        },
        newton: NewtonConfig {
            max_iterations: def.max_iterations,
            abs_tol: def.tolerance,
            line_search_beta: def.line_search_beta,
            max_line_search_iters: def.max_line_search_iters,
            ..NewtonConfig::default()
        },
        timeout: def.timeout_s.map(Duration::from_secs_f64),
        ..SolveOptions::default()
    }
}

/// Validate `file` and build its flowsheet, tear set and options.
pub fn build(file: &FlowsheetFile) -> ProjectResult<BuiltFlowsheet> {
    validate_file(file)?;
    let mut fs = Flowsheet::new();

    for c in &file.components {
        fs.model.declare_component(c.as_str())?;
    }
    for p in &file.parameters {
        fs.model.declare_parameter(p.name.as_str(), p.value)?;
    }
    for s in &file.streams {
        let spec = match &s.kind {
            StreamKindDef::Fixed { total, composition } => {
                let composition: Vec<(&str, f64)> =
                    composition.iter().map(|(c, z)| (c.as_str(), *z)).collect();
                StreamSpec::fixed(s.name.as_str(), *total, &composition)
            }
            StreamKindDef::Free { basis, init } => {
                let basis = match basis {
                    BasisDef::Flows => CompositionBasis::Flows,
                    BasisDef::Fractions => CompositionBasis::Fractions,
                };
                let init = init
                    .overrides
                    .iter()
                    .fold(StreamInit::uniform(init.total, init.component), |i, (c, v)| {
                        i.with_component(c.as_str(), *v)
                    });
                StreamSpec::free(s.name.as_str(), basis, init)
            }
        };
        fs.model.declare_stream(spec)?;
    }
    for u in &file.unknowns {
        let var = fs
            .model
            .declare_unknown(u.name.as_str(), Bounds::new(u.lower, u.upper), u.initial)?;
        if let Some(value) = u.fixed {
            fs.model.fix(var, value)?;
        }
    }
    for e in &file.extents {
        fs.model.declare_extent(e.name.as_str(), e.initial)?;
    }
    for u in &file.units {
        fs.add_unit(u.name.as_str(), unit_spec(&u.kind))?;
    }
    for r in &file.relations {
        fs.add_relation(r.name.as_str(), &r.equation)?;
    }
    fs.add_stream_closures()?;

    let solve_options = solve_options(&file.solver);
    let mut tear_options = TearOptions {
        solve: solve_options.clone(),
        ..TearOptions::default()
    };
    let mut tear_set = None;
    let mut sweep = None;

    if let Some(def) = &file.tearing {
        tear_options.tolerance = def.tolerance;
        tear_options.max_iterations = def.max_iterations;
        tear_options.relaxation = def.relaxation;

        let mut set = TearSet::new();
        for pair in &def.streams {
            let guess = fs.model.stream(&pair.guess)?;
            let computed = fs.model.stream(&pair.computed)?;
            set = set.with_streams(&fs.model, guess, computed)?;
        }
        for pair in &def.variables {
            let guess = fs.model.variable(&pair.guess)?;
            let computed = fs.model.variable(&pair.computed)?;
            set = set.with_pair(&fs.model, guess, computed)?;
        }

        if let Some(def) = &file.sweep {
            let mut grid = GuessGrid::new();
            for axis in &def.axes {
                grid = match (&axis.stream, &axis.variable) {
                    (Some(s), _) => grid.stream(fs.model.stream(s)?, axis.values.clone()),
                    (None, Some(v)) => grid.variable(fs.model.variable(v)?, axis.values.clone()),
                    (None, None) => grid,
                };
            }
            sweep = Some(grid);
        }
        tear_set = Some(set);
    }

    let parameter_sweep = file
        .parameter_sweep
        .as_ref()
        .map(|def| build_parameter_sweep(&fs, def))
        .transpose()?;

    let mut warnings = Vec::new();
    let links = tear_set.as_ref().map_or_else(Vec::new, |s| s.streams().to_vec());
    let topology = fs.topology_with_links(&links)?;
    let computed: Vec<_> = links.iter().map(|(_, c)| *c).collect();
    if topology.has_recycle() && !topology.is_torn_by(&computed) {
        for group in topology.recycle_loops() {
            let names: Vec<&str> = group
                .iter()
                .filter_map(|u| fs.equations.unit_name(*u))
                .collect();
            let message = format!(
                "recycle loop through {} is not broken by the tear set; it is solved simultaneously",
                names.join(", ")
            );
            warn!("{message}");
            warnings.push(message);
        }
    }

    Ok(BuiltFlowsheet {
        name: file.name.clone(),
        flowsheet: fs,
        tear_set,
        tear_options,
        solve_options,
        sweep,
        parameter_sweep,
        warnings,
    })
}
