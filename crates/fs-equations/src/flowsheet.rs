//! The flowsheet context: entity model plus equation registry.

use std::collections::BTreeSet;

use fs_core::{Real, StreamId, UnitId};
use fs_model::{Assignment, EntityModel, SliceEnv, Topology, parse_relation};
use tracing::info;

use crate::equation::Equation;
use crate::error::{EquationError, EquationResult};
use crate::key::EquationKey;
use crate::registry::EquationRegistry;
use crate::templates;
use crate::units::UnitSpec;

/// Owns every entity and equation of one flowsheet.
///
/// Cloning is a deep copy; sweep workers each solve their own clone.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Flowsheet {
    pub model: EntityModel,
    pub equations: EquationRegistry,
}

impl Flowsheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_unit(&mut self, name: impl Into<String>, spec: UnitSpec) -> EquationResult<UnitId> {
        self.equations.add_unit(&self.model, name, spec)
    }

    /// Parse `text` as `lhs == rhs` and register it as a named relation.
    pub fn add_relation(&mut self, name: impl Into<String>, text: &str) -> EquationResult<()> {
        let (lhs, rhs) = parse_relation(text, &self.model)?;
        self.equations.insert(templates::relation(name, lhs, rhs))
    }

    pub fn add_stream_closures(&mut self) -> EquationResult<usize> {
        self.equations.add_stream_closures(&self.model)
    }

    pub fn insert(&mut self, equation: Equation) -> EquationResult<()> {
        self.equations.insert(equation)
    }

    /// Unit/stream graph of the declared units.
    pub fn topology(&self) -> EquationResult<Topology> {
        self.topology_with_links(&[])
    }

    /// Unit/stream graph where each `(guess, computed)` link is drawn as the
    /// single stream `computed`, so a torn recycle shows up as a loop.
    pub fn topology_with_links(&self, links: &[(StreamId, StreamId)]) -> EquationResult<Topology> {
        let mut edges: Vec<(UnitId, Vec<StreamId>, Vec<StreamId>)> = Vec::new();
        for unit in self.equations.units() {
            let resolve = |names: Vec<&str>| -> EquationResult<Vec<StreamId>> {
                names
                    .into_iter()
                    .map(|n| {
                        let s = self.model.stream(n)?;
                        Ok(links
                            .iter()
                            .find(|(guess, _)| *guess == s)
                            .map_or(s, |(_, computed)| *computed))
                    })
                    .collect()
            };
            edges.push((unit.id, resolve(unit.spec.inlets())?, resolve(unit.spec.outlets())?));
        }
        Ok(Topology::build(
            edges.iter().map(|(u, i, o)| (*u, i.as_slice(), o.as_slice())),
        )?)
    }

    pub fn listing(&self) -> Vec<String> {
        self.equations.listing(&self.model)
    }

    pub fn fingerprint(&self) -> String {
        self.equations.fingerprint(&self.model)
    }

    pub fn label(&self, key: &EquationKey) -> String {
        self.equations.label(key, &self.model)
    }

    /// Residual of every active equation under `values`, in key order.
    pub fn residuals(&self, values: &Assignment) -> Vec<(EquationKey, Real)> {
        let params = self.model.param_values();
        let env = SliceEnv {
            vars: values.as_slice(),
            params: &params,
        };
        self.equations
            .iter_active()
            .map(|eq| (eq.key.clone(), eq.residual(&env)))
            .collect()
    }

    /// Fail if any equation references a variable or parameter that no longer exists.
    pub fn check_references(&self) -> EquationResult<()> {
        for eq in self.equations.iter() {
            let mut params = BTreeSet::new();
            eq.lhs.collect_params(&mut params);
            eq.rhs.collect_params(&mut params);
            let dangling = eq.vars().into_iter().any(|v| self.model.get_variable(v).is_err())
                || params.into_iter().any(|p| self.model.get_parameter(p).is_err());
            if dangling {
                return Err(EquationError::DanglingReference {
                    key: eq.key.clone(),
                });
            }
        }
        Ok(())
    }

    /// Atomically rebuild everything tagged `tag`.
    ///
    /// Works on a clone: removes the region, runs `build` with `tag` as the
    /// active region, and swaps the clone in only if the build succeeds and
    /// leaves no dangling references. On error `self` is unchanged.
    pub fn redefine_region<F>(&mut self, tag: &str, build: F) -> EquationResult<()>
    where
        F: FnOnce(&mut Flowsheet) -> EquationResult<()>,
    {
        let mut working = self.clone();
        let removed = working.model.remove_region(tag) + working.equations.remove_region(tag);

        let previous = working.model.active_region().map(str::to_string);
        working.model.set_active_region(Some(tag.to_string()));
        working.equations.set_active_region(Some(tag.to_string()));
        let built = build(&mut working);
        working.model.set_active_region(previous.clone());
        working.equations.set_active_region(previous);
        built?;
        working.check_references()?;

        info!(region = tag, removed, "region redefined");
        *self = working;
        Ok(())
    }
}
