//! Ordered, keyed store of equations plus the units that produced them.

use std::collections::{BTreeMap, HashMap};

use fs_core::{ComponentId, Real, StreamId, UnitId, VarId};
use fs_model::{EntityKind, EntityModel, ModelError};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::equation::Equation;
use crate::error::{EquationError, EquationResult};
use crate::key::{EquationKey, Scope};
use crate::templates;
use crate::units::{Side, UnitSpec, ValueRef};

/// A declared unit. It holds nothing but its specification.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitRecord {
    pub id: UnitId,
    pub name: String,
    pub spec: UnitSpec,
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EquationRegistry {
    equations: BTreeMap<EquationKey, Equation>,
    units: Vec<Option<UnitRecord>>,
    unit_names: HashMap<String, UnitId>,
    retired_units: HashMap<String, UnitId>,
    active_region: Option<String>,
}

impl EquationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Region tag applied to inserted equations and units that carry none.
    pub fn set_active_region(&mut self, tag: Option<String>) {
        self.active_region = tag;
    }

    pub fn len(&self) -> usize {
        self.equations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.equations.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.iter_active().count()
    }

    pub fn get(&self, key: &EquationKey) -> Option<&Equation> {
        self.equations.get(key)
    }

    pub fn contains(&self, key: &EquationKey) -> bool {
        self.equations.contains_key(key)
    }

    /// All equations in key order.
    pub fn iter(&self) -> impl Iterator<Item = &Equation> {
        self.equations.values()
    }

    pub fn iter_active(&self) -> impl Iterator<Item = &Equation> {
        self.equations.values().filter(|e| e.active)
    }

    /// Insert a new equation. Fails if the key is taken.
    pub fn insert(&mut self, mut equation: Equation) -> EquationResult<()> {
        if self.equations.contains_key(&equation.key) {
            return Err(EquationError::DuplicateEquation { key: equation.key });
        }
        if equation.region.is_none() {
            equation.region = self.active_region.clone();
        }
        self.equations.insert(equation.key.clone(), equation);
        Ok(())
    }

    /// Insert or overwrite, returning the previous equation under the key.
    pub fn replace(&mut self, mut equation: Equation) -> Option<Equation> {
        if equation.region.is_none() {
            equation.region = self.active_region.clone();
        }
        let previous = self.equations.insert(equation.key.clone(), equation);
        if let Some(prev) = &previous {
            warn!(key = %prev.key, "equation overwritten");
        }
        previous
    }

    pub fn remove(&mut self, key: &EquationKey) -> EquationResult<Equation> {
        self.equations
            .remove(key)
            .ok_or_else(|| EquationError::UnknownEquation { key: key.clone() })
    }

    pub fn activate(&mut self, key: &EquationKey) -> EquationResult<()> {
        self.set_active(key, true)
    }

    pub fn deactivate(&mut self, key: &EquationKey) -> EquationResult<()> {
        self.set_active(key, false)
    }

    fn set_active(&mut self, key: &EquationKey, active: bool) -> EquationResult<()> {
        match self.equations.get_mut(key) {
            Some(eq) => {
                eq.active = active;
                Ok(())
            }
            None => Err(EquationError::UnknownEquation { key: key.clone() }),
        }
    }

    // ---- units ----

    pub fn units(&self) -> impl Iterator<Item = &UnitRecord> {
        self.units.iter().flatten()
    }

    pub fn unit(&self, name: &str) -> EquationResult<UnitId> {
        self.unit_names.get(name).copied().ok_or_else(|| {
            ModelError::UnknownEntity {
                kind: EntityKind::Unit,
                name: name.to_string(),
            }
            .into()
        })
    }

    pub fn unit_name(&self, id: UnitId) -> Option<&str> {
        self.units
            .get(id.slot())
            .and_then(Option::as_ref)
            .map(|u| u.name.as_str())
    }

    /// Declare a unit and instantiate all of its equation templates.
    ///
    /// Nothing is inserted unless every equation builds and none collides.
    pub fn add_unit(
        &mut self,
        model: &EntityModel,
        name: impl Into<String>,
        spec: UnitSpec,
    ) -> EquationResult<UnitId> {
        let name = name.into();
        if self.unit_names.contains_key(&name) || model.kind_of(&name).is_some() {
            return Err(ModelError::DuplicateEntity {
                kind: EntityKind::Unit,
                name,
            }
            .into());
        }
        let slot = match self.retired_units.get(&name) {
            Some(id) if self.units.get(id.slot()).is_some_and(Option::is_none) => id.slot(),
            _ => self.units.len(),
        };
        let id = UnitId::from_slot(slot).ok_or(ModelError::CapacityExceeded {
            kind: EntityKind::Unit,
        })?;

        let equations = expand_unit(model, id, &name, &spec)?;
        for eq in &equations {
            if self.equations.contains_key(&eq.key) {
                return Err(EquationError::DuplicateEquation {
                    key: eq.key.clone(),
                });
            }
        }
        debug!(unit = %name, kind = spec.kind_name(), equations = equations.len(), "unit added");
        for eq in equations {
            self.insert(eq)?;
        }

        self.retired_units.remove(&name);
        if slot == self.units.len() {
            self.units.push(None);
        }
        self.unit_names.insert(name.clone(), id);
        self.units[slot] = Some(UnitRecord {
            id,
            name,
            spec,
            region: self.active_region.clone(),
        });
        Ok(id)
    }

    /// Add the basis closure of every free stream that does not have one yet.
    ///
    /// Closures inherit the stream's region. Returns the number added.
    pub fn add_stream_closures(&mut self, model: &EntityModel) -> EquationResult<usize> {
        let mut added = 0;
        for stream in model.streams() {
            if let Some(mut eq) = templates::stream_closure(model, stream.id)? {
                if self.equations.contains_key(&eq.key) {
                    continue;
                }
                eq.region = stream.region.clone();
                self.insert(eq)?;
                added += 1;
            }
        }
        Ok(added)
    }

    /// Drop every equation and unit tagged `tag`. Returns the number removed.
    pub fn remove_region(&mut self, tag: &str) -> usize {
        let before = self.equations.len();
        self.equations
            .retain(|_, eq| eq.region.as_deref() != Some(tag));
        let mut removed = before - self.equations.len();
        for slot in &mut self.units {
            if slot.as_ref().is_some_and(|u| u.region.as_deref() == Some(tag)) {
                if let Some(unit) = slot.take() {
                    self.unit_names.remove(&unit.name);
                    self.retired_units.insert(unit.name, unit.id);
                    removed += 1;
                }
            }
        }
        removed
    }

    // ---- listing ----

    /// Human-readable key: `owner.kind[component]`.
    pub fn label(&self, key: &EquationKey, model: &EntityModel) -> String {
        let owner = match &key.scope {
            Scope::Global => None,
            Scope::Stream(s) => Some(
                model
                    .get_stream(*s)
                    .map_or_else(|_| format!("#{s}"), |s| s.name.clone()),
            ),
            Scope::Unit(u) => Some(self.unit_name(*u).map_or_else(|| format!("#{u}"), str::to_string)),
            Scope::Variable(v) => Some(model.var_name(*v).map_or_else(|| format!("#{v}"), str::to_string)),
        };
        let mut label = match owner {
            Some(owner) => format!("{owner}.{}", key.kind),
            None => key.kind.to_string(),
        };
        if let Some(c) = key.component {
            label.push('[');
            label.push_str(model.component_name(c).unwrap_or("?"));
            label.push(']');
        }
        label
    }

    /// One line per equation, in key order.
    pub fn listing(&self, model: &EntityModel) -> Vec<String> {
        self.equations
            .values()
            .map(|eq| {
                let mut line = format!(
                    "{}: {} == {}",
                    self.label(&eq.key, model),
                    eq.lhs.display(model),
                    eq.rhs.display(model)
                );
                if !eq.active {
                    line.push_str("  (inactive)");
                }
                line
            })
            .collect()
    }

    /// SHA-256 over the canonical listing, including ids.
    pub fn fingerprint(&self, model: &EntityModel) -> String {
        let mut hasher = Sha256::new();
        for (eq, line) in self.equations.values().zip(self.listing(model)) {
            hasher.update(eq.key.to_string().as_bytes());
            hasher.update(b"|");
            hasher.update(line.as_bytes());
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }
}

fn resolve_streams(model: &EntityModel, names: &[String]) -> EquationResult<Vec<StreamId>> {
    names
        .iter()
        .map(|n| model.stream(n).map_err(EquationError::from))
        .collect()
}

fn invalid(unit: &str, what: impl Into<String>) -> EquationError {
    EquationError::InvalidUnit {
        unit: unit.to_string(),
        what: what.into(),
    }
}

fn check_fraction(unit: &str, what: &str, value: &ValueRef, model: &EntityModel) -> EquationResult<()> {
    let v = value.resolve(model)?;
    if (0.0..=1.0).contains(&v) {
        Ok(())
    } else {
        Err(invalid(unit, format!("{what} {v} is outside [0, 1]")))
    }
}

/// Instantiate every template of a unit.
fn expand_unit(
    model: &EntityModel,
    id: UnitId,
    name: &str,
    spec: &UnitSpec,
) -> EquationResult<Vec<Equation>> {
    let components: Vec<ComponentId> = model.components().iter().map(|c| c.id).collect();
    let mut out = Vec::new();
    match spec {
        UnitSpec::Splitter {
            inlet,
            top,
            bottom,
            light_key,
            heavy_key,
            sharp,
        } => {
            let inlet = model.stream(inlet)?;
            let top = model.stream(top)?;
            let bottom = model.stream(bottom)?;
            if top == bottom || inlet == top || inlet == bottom {
                return Err(invalid(name, "inlet, top and bottom must be distinct streams"));
            }
            let mut assigned = vec![0_usize; components.len()];
            for (key, preferred) in [(light_key, Side::Top), (heavy_key, Side::Bottom)] {
                let Some(key) = key else { continue };
                let c = model.component(&key.component)?;
                check_fraction(name, "recovery", &key.recovery, model)?;
                let recovery = key.recovery.to_expr(model)?;
                out.extend(templates::recovery_split(
                    model, id, inlet, top, bottom, c, &recovery, preferred,
                )?);
                assigned[c.slot()] += 1;
            }
            for (component, side) in sharp {
                let c = model.component(component)?;
                let (to, away) = match side {
                    Side::Top => (top, bottom),
                    Side::Bottom => (bottom, top),
                };
                out.push(templates::sharp_balance(model, id, inlet, to, c)?);
                out.push(templates::zero_flow(model, id, away, c)?);
                assigned[c.slot()] += 1;
            }
            for (c, count) in components.iter().zip(&assigned) {
                let component = model.component_name(*c).unwrap_or("?").to_string();
                match count {
                    0 => {
                        return Err(EquationError::UnassignedComponent {
                            unit: name.to_string(),
                            component,
                        });
                    }
                    1 => {}
                    _ => {
                        return Err(EquationError::DuplicateAssignment {
                            unit: name.to_string(),
                            component,
                        });
                    }
                }
            }
        }
        UnitSpec::Mixer { inlets, outlet } => {
            if inlets.is_empty() {
                return Err(invalid(name, "mixer needs at least one inlet"));
            }
            let inlets = resolve_streams(model, inlets)?;
            let outlet = model.stream(outlet)?;
            for &c in &components {
                out.push(templates::component_balance(model, id, &inlets, &[outlet], c, &[])?);
            }
        }
        UnitSpec::Reactor {
            inlets,
            outlet,
            reactions,
            conversions,
        } => {
            if inlets.is_empty() {
                return Err(invalid(name, "reactor needs at least one inlet"));
            }
            let inlets = resolve_streams(model, inlets)?;
            let outlet = model.stream(outlet)?;
            let mut terms: Vec<Vec<(Real, VarId)>> = vec![Vec::new(); components.len()];
            for reaction in reactions {
                let extent = model.variable(&reaction.extent)?;
                for (component, nu) in &reaction.stoichiometry {
                    let c = model.component(component)?;
                    terms[c.slot()].push((*nu, extent));
                }
            }
            for &c in &components {
                out.push(templates::component_balance(
                    model,
                    id,
                    &inlets,
                    &[outlet],
                    c,
                    &terms[c.slot()],
                )?);
            }
            for (i, conv) in conversions.iter().enumerate() {
                let extent = model.variable(&conv.extent)?;
                let key = model.component(&conv.key)?;
                check_fraction(name, "conversion", &conv.conversion, model)?;
                out.push(templates::conversion(
                    model,
                    id,
                    i,
                    extent,
                    conv.conversion.to_expr(model)?,
                    &inlets,
                    key,
                )?);
            }
        }
        UnitSpec::Divider {
            inlet,
            outlets,
            fractions,
        } => {
            if outlets.len() < 2 {
                return Err(invalid(name, "divider needs at least two outlets"));
            }
            if fractions.len() != outlets.len() - 1 {
                return Err(invalid(
                    name,
                    format!(
                        "divider with {} outlets needs {} fractions, got {}",
                        outlets.len(),
                        outlets.len() - 1,
                        fractions.len()
                    ),
                ));
            }
            let inlet = model.stream(inlet)?;
            let outlets = resolve_streams(model, outlets)?;
            let mut shares = Vec::with_capacity(fractions.len());
            for phi in fractions {
                check_fraction(name, "split fraction", phi, model)?;
                shares.push(phi.to_expr(model)?);
            }
            for &c in &components {
                for (k, (outlet, phi)) in outlets.iter().zip(&shares).enumerate() {
                    out.push(templates::divider_split(model, id, k, inlet, *outlet, phi, c)?);
                }
                out.push(templates::component_balance(model, id, &[inlet], &outlets, c, &[])?);
            }
        }
    }
    Ok(out)
}
