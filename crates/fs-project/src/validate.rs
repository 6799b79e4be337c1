//! Flowsheet file validation.

use std::collections::{HashMap, HashSet};

use crate::schema::{FlowsheetFile, StreamKindDef, UnitKindDef, ValueDef};

pub const LATEST_VERSION: u32 = 1;

/// Tolerance on the sum of a feed's mole fractions.
const COMPOSITION_TOLERANCE: f64 = 1e-6;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate name: {name} in {context}")]
    DuplicateName { name: String, context: String },

    #[error("Missing reference: {name} in {context}")]
    MissingReference { name: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

fn missing(name: &str, context: impl Into<String>) -> ValidationError {
    ValidationError::MissingReference {
        name: name.to_string(),
        context: context.into(),
    }
}

fn invalid(field: impl Into<String>, value: impl ToString, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

pub fn validate_file(file: &FlowsheetFile) -> Result<(), ValidationError> {
    if file.version == 0 || file.version > LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: file.version,
        });
    }

    let mut components = HashSet::new();
    for c in &file.components {
        if !components.insert(c.as_str()) {
            return Err(ValidationError::DuplicateName {
                name: c.clone(),
                context: "components".to_string(),
            });
        }
    }

    // Parameters, streams, unknowns, extents and units share one namespace.
    let mut names = HashSet::new();
    let declared = file
        .parameters
        .iter()
        .map(|p| (p.name.as_str(), "parameters"))
        .chain(file.streams.iter().map(|s| (s.name.as_str(), "streams")))
        .chain(file.unknowns.iter().map(|u| (u.name.as_str(), "unknowns")))
        .chain(file.extents.iter().map(|e| (e.name.as_str(), "extents")))
        .chain(file.units.iter().map(|u| (u.name.as_str(), "units")));
    for (name, context) in declared {
        if !names.insert(name) {
            return Err(ValidationError::DuplicateName {
                name: name.to_string(),
                context: context.to_string(),
            });
        }
    }

    let params: HashMap<&str, f64> = file
        .parameters
        .iter()
        .map(|p| (p.name.as_str(), p.value))
        .collect();
    for p in &file.parameters {
        if !p.value.is_finite() {
            return Err(invalid(format!("parameter '{}'", p.name), p.value, "must be finite"));
        }
    }

    let mut free_streams = HashSet::new();
    for stream in &file.streams {
        match &stream.kind {
            StreamKindDef::Fixed { total, composition } => {
                if !total.is_finite() || *total < 0.0 {
                    return Err(invalid(
                        format!("stream '{}' total", stream.name),
                        total,
                        "must be non-negative and finite",
                    ));
                }
                for (c, z) in composition {
                    if !components.contains(c.as_str()) {
                        return Err(missing(c, format!("stream '{}' composition", stream.name)));
                    }
                    if !(0.0..=1.0).contains(z) {
                        return Err(invalid(
                            format!("stream '{}' fraction of '{c}'", stream.name),
                            z,
                            "must lie in [0, 1]",
                        ));
                    }
                }
                let sum: f64 = composition.values().sum();
                if (sum - 1.0).abs() > COMPOSITION_TOLERANCE {
                    return Err(invalid(
                        format!("stream '{}' composition sum", stream.name),
                        sum,
                        "must equal 1",
                    ));
                }
            }
            StreamKindDef::Free { init, .. } => {
                free_streams.insert(stream.name.as_str());
                for c in init.overrides.keys() {
                    if !components.contains(c.as_str()) {
                        return Err(missing(c, format!("stream '{}' init", stream.name)));
                    }
                }
            }
        }
    }
    let streams: HashSet<&str> = file.streams.iter().map(|s| s.name.as_str()).collect();
    let extents: HashSet<&str> = file.extents.iter().map(|e| e.name.as_str()).collect();

    for unknown in &file.unknowns {
        if let (Some(lo), Some(hi)) = (unknown.lower, unknown.upper)
            && lo > hi
        {
            return Err(invalid(
                format!("unknown '{}' bounds", unknown.name),
                format!("[{lo}, {hi}]"),
                "lower bound exceeds upper bound",
            ));
        }
    }

    let fraction = |field: String, value: &ValueDef| -> Result<(), ValidationError> {
        let v = match value {
            ValueDef::Value(v) => *v,
            ValueDef::Parameter(name) => *params
                .get(name.as_str())
                .ok_or_else(|| missing(name, field.clone()))?,
        };
        if !(0.0..=1.0).contains(&v) {
            return Err(invalid(field, v, "must lie in [0, 1]"));
        }
        Ok(())
    };

    for unit in &file.units {
        let context = format!("unit '{}'", unit.name);
        let stream_ref = |s: &str| -> Result<(), ValidationError> {
            if streams.contains(s) {
                Ok(())
            } else {
                Err(missing(s, context.clone()))
            }
        };
        let component_ref = |c: &str| -> Result<(), ValidationError> {
            if components.contains(c) {
                Ok(())
            } else {
                Err(missing(c, context.clone()))
            }
        };
        match &unit.kind {
            UnitKindDef::Splitter {
                inlet,
                top,
                bottom,
                light_key,
                heavy_key,
                sharp,
            } => {
                for s in [inlet, top, bottom] {
                    stream_ref(s)?;
                }
                for key in [light_key, heavy_key].into_iter().flatten() {
                    component_ref(&key.component)?;
                    fraction(format!("{context} recovery of '{}'", key.component), &key.recovery)?;
                }
                for c in sharp.keys() {
                    component_ref(c)?;
                }
            }
            UnitKindDef::Mixer { inlets, outlet } => {
                for s in inlets.iter().chain([outlet]) {
                    stream_ref(s)?;
                }
            }
            UnitKindDef::Reactor {
                inlets,
                outlet,
                reactions,
                conversions,
            } => {
                for s in inlets.iter().chain([outlet]) {
                    stream_ref(s)?;
                }
                for r in reactions {
                    if !extents.contains(r.extent.as_str()) {
                        return Err(missing(&r.extent, context.clone()));
                    }
                    for c in r.stoichiometry.keys() {
                        component_ref(c)?;
                    }
                }
                for conv in conversions {
                    if !extents.contains(conv.extent.as_str()) {
                        return Err(missing(&conv.extent, context.clone()));
                    }
                    component_ref(&conv.key)?;
                    fraction(format!("{context} conversion"), &conv.conversion)?;
                }
            }
            UnitKindDef::Divider {
                inlet,
                outlets,
                fractions,
            } => {
                for s in outlets.iter().chain([inlet]) {
                    stream_ref(s)?;
                }
                for (k, phi) in fractions.iter().enumerate() {
                    fraction(format!("{context} split fraction {k}"), phi)?;
                }
            }
        }
    }

    if let Some(tearing) = &file.tearing {
        for pair in &tearing.streams {
            for s in [&pair.guess, &pair.computed] {
                if !free_streams.contains(s.as_str()) {
                    return Err(missing(s, "tearing streams (free streams only)"));
                }
            }
        }
        if !(tearing.tolerance.is_finite() && tearing.tolerance > 0.0) {
            return Err(invalid("tearing tolerance", tearing.tolerance, "must be positive"));
        }
        if tearing.max_iterations == 0 {
            return Err(invalid("tearing max_iterations", 0, "must be at least 1"));
        }
        if !(tearing.relaxation > 0.0 && tearing.relaxation <= 2.0) {
            return Err(invalid("tearing relaxation", tearing.relaxation, "must lie in (0, 2]"));
        }
    }

    let solver = &file.solver;
    if !(solver.tolerance.is_finite() && solver.tolerance > 0.0) {
        return Err(invalid("solver tolerance", solver.tolerance, "must be positive"));
    }
    if let Some(t) = solver.timeout_s
        && !(t.is_finite() && t >= 0.0)
    {
        return Err(invalid("solver timeout_s", t, "must be non-negative and finite"));
    }
    if !(solver.line_search_beta > 0.0 && solver.line_search_beta < 1.0) {
        return Err(invalid(
            "solver line_search_beta",
            solver.line_search_beta,
            "must lie in (0, 1)",
        ));
    }

    if let Some(sweep) = &file.sweep {
        if file.tearing.is_none() {
            return Err(missing("tearing", "sweep (a sweep needs a tear set)"));
        }
        for (i, axis) in sweep.axes.iter().enumerate() {
            match (&axis.stream, &axis.variable) {
                (Some(s), None) => {
                    let torn = file
                        .tearing
                        .iter()
                        .flat_map(|t| &t.streams)
                        .any(|p| &p.guess == s);
                    if !torn {
                        return Err(missing(s, format!("sweep axis {i} (torn guess streams)")));
                    }
                }
                (None, Some(_)) => {}
                _ => {
                    return Err(invalid(
                        format!("sweep axis {i}"),
                        "stream/variable",
                        "exactly one of stream or variable is required",
                    ));
                }
            }
            if axis.values.is_empty() || axis.values.iter().any(|v| !v.is_finite()) {
                return Err(invalid(
                    format!("sweep axis {i} values"),
                    format!("{:?}", axis.values),
                    "must be non-empty and finite",
                ));
            }
        }
    }

    if let Some(def) = &file.parameter_sweep {
        if !file.parameters.iter().any(|p| p.name == def.parameter) {
            return Err(missing(&def.parameter, "parameter_sweep (parameters)"));
        }
        match (&def.range, def.values.is_empty()) {
            (Some(range), true) => {
                let finite = range.start.is_finite() && range.stop.is_finite() && range.step.is_finite();
                if !(finite && range.step > 0.0 && range.stop >= range.start) {
                    return Err(invalid(
                        "parameter_sweep range",
                        format!("{}..={} by {}", range.start, range.stop, range.step),
                        "must be finite with a positive step and stop >= start",
                    ));
                }
            }
            (None, false) => {
                if def.values.iter().any(|v| !v.is_finite()) {
                    return Err(invalid(
                        "parameter_sweep values",
                        format!("{:?}", def.values),
                        "must be finite",
                    ));
                }
            }
            _ => {
                return Err(invalid(
                    "parameter_sweep",
                    "values/range",
                    "exactly one of a non-empty values list or range is required",
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::*;
    use std::collections::BTreeMap;

    fn minimal() -> FlowsheetFile {
        FlowsheetFile {
            version: 1,
            name: "t".to_string(),
            components: vec!["A".to_string(), "B".to_string()],
            parameters: vec![],
            streams: vec![StreamDef {
                name: "feed".to_string(),
                kind: StreamKindDef::Fixed {
                    total: 10.0,
                    composition: BTreeMap::from([("A".to_string(), 0.5), ("B".to_string(), 0.5)]),
                },
            }],
            unknowns: vec![],
            extents: vec![],
            units: vec![],
            relations: vec![],
            tearing: None,
            solver: SolverDef::default(),
            sweep: None,
            parameter_sweep: None,
        }
    }

    #[test]
    fn minimal_file_is_valid() {
        validate_file(&minimal()).unwrap();
    }

    #[test]
    fn composition_must_sum_to_one() {
        let mut file = minimal();
        file.streams[0].kind = StreamKindDef::Fixed {
            total: 10.0,
            composition: BTreeMap::from([("A".to_string(), 0.5), ("B".to_string(), 0.4)]),
        };
        assert!(matches!(
            validate_file(&file),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn names_are_shared_across_kinds() {
        let mut file = minimal();
        file.parameters.push(ParameterDef {
            name: "feed".to_string(),
            value: 1.0,
        });
        assert!(matches!(
            validate_file(&file),
            Err(ValidationError::DuplicateName { .. })
        ));
    }

    #[test]
    fn recovery_parameter_must_be_a_fraction() {
        let mut file = minimal();
        file.parameters.push(ParameterDef {
            name: "rec".to_string(),
            value: 1.5,
        });
        file.units.push(UnitDef {
            name: "col".to_string(),
            kind: UnitKindDef::Splitter {
                inlet: "feed".to_string(),
                top: "feed".to_string(),
                bottom: "feed".to_string(),
                light_key: Some(KeyDef {
                    component: "A".to_string(),
                    recovery: ValueDef::Parameter("rec".to_string()),
                }),
                heavy_key: None,
                sharp: BTreeMap::new(),
            },
        });
        let err = validate_file(&file).unwrap_err();
        assert!(err.to_string().contains("must lie in [0, 1]"));
    }

    #[test]
    fn unknown_stream_reference_is_reported() {
        let mut file = minimal();
        file.units.push(UnitDef {
            name: "mix".to_string(),
            kind: UnitKindDef::Mixer {
                inlets: vec!["feed".to_string()],
                outlet: "nowhere".to_string(),
            },
        });
        assert!(matches!(
            validate_file(&file),
            Err(ValidationError::MissingReference { name, .. }) if name == "nowhere"
        ));
    }

    #[test]
    fn parameter_sweep_needs_a_declared_parameter_and_one_value_source() {
        let mut file = minimal();
        file.parameters.push(ParameterDef {
            name: "t".to_string(),
            value: 5.0,
        });
        let mut def = ParameterSweepDef {
            parameter: "t".to_string(),
            values: vec![],
            range: Some(RangeDef {
                start: 5.0,
                stop: 300.0,
                step: 1.0,
            }),
            objective: None,
        };
        file.parameter_sweep = Some(def.clone());
        validate_file(&file).unwrap();

        def.values = vec![1.0];
        file.parameter_sweep = Some(def.clone());
        assert!(matches!(
            validate_file(&file),
            Err(ValidationError::InvalidValue { .. })
        ));

        def.range = None;
        def.parameter = "missing".to_string();
        file.parameter_sweep = Some(def);
        assert!(matches!(
            validate_file(&file),
            Err(ValidationError::MissingReference { name, .. }) if name == "missing"
        ));
    }

    #[test]
    fn parameter_sweep_range_must_increase() {
        let mut file = minimal();
        file.parameters.push(ParameterDef {
            name: "t".to_string(),
            value: 5.0,
        });
        file.parameter_sweep = Some(ParameterSweepDef {
            parameter: "t".to_string(),
            values: vec![],
            range: Some(RangeDef {
                start: 5.0,
                stop: 1.0,
                step: 0.0,
            }),
            objective: None,
        });
        let err = validate_file(&file).unwrap_err();
        assert!(err.to_string().contains("positive step"));
    }

    #[test]
    fn future_version_is_rejected() {
        let mut file = minimal();
        file.version = LATEST_VERSION + 1;
        assert!(matches!(
            validate_file(&file),
            Err(ValidationError::UnsupportedVersion { .. })
        ));
    }
}
