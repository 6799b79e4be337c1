//! The entity model: every named component, stream, unknown and parameter.

use std::collections::HashMap;

use fs_core::{ComponentId, Id, ParamId, Real, StreamId, VarId};

use crate::assignment::Assignment;
use crate::entity::{
    Bounds, Component, CompositionBasis, EntityKind, Parameter, Stream, StreamKind, StreamShape,
    StreamSpec, VarRole, Variable,
};
use crate::error::{ModelError, ModelResult};
use crate::expr::Expr;

/// Fixed feed compositions must sum to one within this tolerance.
pub const COMPOSITION_TOLERANCE: Real = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Component(ComponentId),
    Stream(StreamId),
    Variable(VarId),
    Parameter(ParamId),
}

impl Entry {
    fn kind(self) -> EntityKind {
        match self {
            Entry::Component(_) => EntityKind::Component,
            Entry::Stream(_) => EntityKind::Stream,
            Entry::Variable(_) => EntityKind::Variable,
            Entry::Parameter(_) => EntityKind::Parameter,
        }
    }

    fn slot(self) -> usize {
        match self {
            Entry::Component(id) | Entry::Stream(id) | Entry::Variable(id) | Entry::Parameter(id) => {
                id.slot()
            }
        }
    }
}

/// Container for all declared entities.
///
/// Streams, unknowns and parameters live in slot vectors indexed by id.
/// Removing a region empties slots and remembers their names, so that a
/// later declaration under the same name lands in the same slot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityModel {
    components: Vec<Component>,
    streams: Vec<Option<Stream>>,
    variables: Vec<Option<Variable>>,
    parameters: Vec<Option<Parameter>>,
    names: HashMap<String, Entry>,
    retired: HashMap<String, Entry>,
    active_region: Option<String>,
}

fn id_for(slot: usize, kind: EntityKind) -> ModelResult<Id> {
    Id::from_slot(slot).ok_or(ModelError::CapacityExceeded { kind })
}

impl EntityModel {
    /// Create an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Region tag applied to declarations that do not carry their own.
    pub fn set_active_region(&mut self, tag: Option<String>) {
        self.active_region = tag;
    }

    pub fn active_region(&self) -> Option<&str> {
        self.active_region.as_deref()
    }

    // ---- declarations ----

    /// Declare a chemical component.
    ///
    /// Components fix the per-stream dimension, so they must all be declared
    /// before the first stream.
    pub fn declare_component(&mut self, name: impl Into<String>) -> ModelResult<ComponentId> {
        let name = name.into();
        self.ensure_available(&name, EntityKind::Component)?;
        if self.streams.iter().any(Option::is_some) {
            return Err(ModelError::invalid(format!(
                "component '{name}' declared after streams"
            )));
        }
        let id = id_for(self.components.len(), EntityKind::Component)?;
        self.names.insert(name.clone(), Entry::Component(id));
        self.components.push(Component { id, name });
        Ok(id)
    }

    /// Declare a named parameter.
    pub fn declare_parameter(&mut self, name: impl Into<String>, value: Real) -> ModelResult<ParamId> {
        let name = name.into();
        self.ensure_available(&name, EntityKind::Parameter)?;
        ensure_value(&name, value)?;
        let region = self.active_region.clone();
        self.insert_parameter(name, value, region)
    }

    /// Declare a non-negative extent of reaction.
    pub fn declare_extent(&mut self, name: impl Into<String>, initial: Real) -> ModelResult<VarId> {
        let name = name.into();
        self.ensure_available(&name, EntityKind::Variable)?;
        ensure_value(&name, initial)?;
        let region = self.active_region.clone();
        self.insert_variable(name, VarRole::Extent, Bounds::NON_NEGATIVE, initial, region)
    }

    /// Declare a general scalar unknown.
    pub fn declare_unknown(
        &mut self,
        name: impl Into<String>,
        bounds: Bounds,
        initial: Real,
    ) -> ModelResult<VarId> {
        let name = name.into();
        self.ensure_available(&name, EntityKind::Variable)?;
        ensure_value(&name, initial)?;
        if let (Some(lo), Some(hi)) = (bounds.lower, bounds.upper) {
            if lo > hi {
                return Err(ModelError::invalid(format!(
                    "unknown '{name}' has lower bound {lo} above upper bound {hi}"
                )));
            }
        }
        let region = self.active_region.clone();
        self.insert_variable(name, VarRole::Scalar, bounds, initial, region)
    }

    /// Declare a stream and all of its per-component quantities.
    ///
    /// Fixed streams register parameters `S.F` and `S.z[c]`. Free streams
    /// register unknowns `S.F` plus `S.f[c]` or `S.x[c]` by basis. Nothing is
    /// registered if any part of the declaration is invalid.
    pub fn declare_stream(&mut self, spec: StreamSpec) -> ModelResult<StreamId> {
        let StreamSpec { name, kind, region } = spec;
        self.ensure_available(&name, EntityKind::Stream)?;
        let region = region.or_else(|| self.active_region.clone());

        let total_name = format!("{name}.F");
        let letter = match &kind {
            StreamKind::Fixed(_) => "z",
            StreamKind::Free {
                basis: CompositionBasis::Flows,
                ..
            } => "f",
            StreamKind::Free {
                basis: CompositionBasis::Fractions,
                ..
            } => "x",
        };
        let member_names: Vec<String> = self
            .components
            .iter()
            .map(|c| format!("{name}.{letter}[{}]", c.name))
            .collect();
        let (total_kind, member_kind) = if matches!(kind, StreamKind::Fixed(_)) {
            (EntityKind::Parameter, EntityKind::Parameter)
        } else {
            (EntityKind::Variable, EntityKind::Variable)
        };
        self.ensure_available(&total_name, total_kind)?;
        for member in &member_names {
            self.ensure_available(member, member_kind)?;
        }

        // Validate values before anything is registered.
        let member_values: Vec<Real> = match &kind {
            StreamKind::Fixed(feed) => {
                ensure_value(&total_name, feed.total)?;
                if feed.total < 0.0 {
                    return Err(ModelError::invalid(format!(
                        "stream '{name}' has negative total flow {}",
                        feed.total
                    )));
                }
                let mut fractions = vec![0.0; self.components.len()];
                for (component, z) in &feed.composition {
                    let c = self.component(component)?;
                    ensure_value(component, *z)?;
                    if !(0.0..=1.0).contains(z) {
                        return Err(ModelError::invalid(format!(
                            "stream '{name}' fraction of '{component}' is {z}, outside [0, 1]"
                        )));
                    }
                    fractions[c.slot()] = *z;
                }
                let sum: Real = fractions.iter().sum();
                if (sum - 1.0).abs() > COMPOSITION_TOLERANCE {
                    return Err(ModelError::invalid(format!(
                        "stream '{name}' fractions sum to {sum}, expected 1"
                    )));
                }
                fractions
            }
            StreamKind::Free { init, .. } => {
                ensure_value(&total_name, init.total)?;
                for (component, _) in &init.overrides {
                    self.component(component)?;
                }
                let values: Vec<Real> = self
                    .components
                    .iter()
                    .map(|c| init.component_value(&c.name))
                    .collect();
                for (member, v) in member_names.iter().zip(&values) {
                    ensure_value(member, *v)?;
                }
                values
            }
        };

        // Every slot the members may append must be addressable.
        let member_slots = match total_kind {
            EntityKind::Parameter => self.parameters.len(),
            _ => self.variables.len(),
        };
        id_for(member_slots + member_names.len(), total_kind)?;
        let component_ids: Vec<ComponentId> = self.components.iter().map(|c| c.id).collect();

        let slot = self.reusable_slot(&name, EntityKind::Stream);
        let (slot, id) = claim(&mut self.streams, slot, EntityKind::Stream)?;

        let shape = match kind {
            StreamKind::Fixed(feed) => {
                let total = self.insert_parameter(total_name, feed.total, region.clone())?;
                let fractions: Vec<ParamId> = member_names
                    .into_iter()
                    .zip(member_values)
                    .map(|(n, z)| self.insert_parameter(n, z, region.clone()))
                    .collect::<ModelResult<_>>()?;
                StreamShape::Fixed { total, fractions }
            }
            StreamKind::Free { basis, init } => {
                let total = self.insert_variable(
                    total_name,
                    VarRole::TotalFlow { stream: id },
                    Bounds::NON_NEGATIVE,
                    init.total,
                    region.clone(),
                )?;
                let members: Vec<VarId> = member_names
                    .into_iter()
                    .zip(member_values)
                    .zip(component_ids)
                    .map(|((n, v), component)| {
                        let (role, bounds) = match basis {
                            CompositionBasis::Flows => (
                                VarRole::ComponentFlow {
                                    stream: id,
                                    component,
                                },
                                Bounds::NON_NEGATIVE,
                            ),
                            CompositionBasis::Fractions => (
                                VarRole::MoleFraction {
                                    stream: id,
                                    component,
                                },
                                Bounds::FRACTION,
                            ),
                        };
                        self.insert_variable(n, role, bounds, v, region.clone())
                    })
                    .collect::<ModelResult<_>>()?;
                match basis {
                    CompositionBasis::Flows => StreamShape::Flows {
                        total,
                        flows: members,
                    },
                    CompositionBasis::Fractions => StreamShape::Fractions {
                        total,
                        fractions: members,
                    },
                }
            }
        };

        self.names.insert(name.clone(), Entry::Stream(id));
        self.streams[slot] = Some(Stream {
            id,
            name,
            shape,
            region,
        });
        Ok(id)
    }

    /// Pin an unknown at `value`. It is no longer solved for.
    pub fn fix(&mut self, var: VarId, value: Real) -> ModelResult<()> {
        let variable = self.variable_mut(var)?;
        ensure_value(&variable.name, value)?;
        variable.fixed = Some(value);
        Ok(())
    }

    /// Release a fixed unknown.
    pub fn unfix(&mut self, var: VarId) -> ModelResult<()> {
        self.variable_mut(var)?.fixed = None;
        Ok(())
    }

    /// Replace the initial value of an unknown.
    pub fn set_initial(&mut self, var: VarId, value: Real) -> ModelResult<()> {
        let variable = self.variable_mut(var)?;
        ensure_value(&variable.name, value)?;
        variable.initial = value;
        Ok(())
    }

    /// Replace the value of a parameter.
    pub fn set_parameter_value(&mut self, param: ParamId, value: Real) -> ModelResult<()> {
        let parameter = self
            .parameters
            .get_mut(param.slot())
            .and_then(Option::as_mut)
            .ok_or_else(|| ModelError::unknown(EntityKind::Parameter, format!("#{param}")))?;
        ensure_value(&parameter.name, value)?;
        parameter.value = value;
        Ok(())
    }

    /// Remove every stream, unknown and parameter tagged `tag`.
    ///
    /// Returns the number of removed entities.
    pub fn remove_region(&mut self, tag: &str) -> usize {
        let mut removed = Vec::new();
        for slot in &mut self.streams {
            if slot.as_ref().is_some_and(|s| s.region.as_deref() == Some(tag)) {
                if let Some(s) = slot.take() {
                    removed.push(s.name);
                }
            }
        }
        for slot in &mut self.variables {
            if slot.as_ref().is_some_and(|v| v.region.as_deref() == Some(tag)) {
                if let Some(v) = slot.take() {
                    removed.push(v.name);
                }
            }
        }
        for slot in &mut self.parameters {
            if slot.as_ref().is_some_and(|p| p.region.as_deref() == Some(tag)) {
                if let Some(p) = slot.take() {
                    removed.push(p.name);
                }
            }
        }
        for name in &removed {
            if let Some(entry) = self.names.remove(name) {
                self.retired.insert(name.clone(), entry);
            }
        }
        removed.len()
    }

    // ---- lookups ----

    pub fn component(&self, name: &str) -> ModelResult<ComponentId> {
        match self.names.get(name) {
            Some(Entry::Component(id)) => Ok(*id),
            _ => Err(ModelError::unknown(EntityKind::Component, name)),
        }
    }

    pub fn stream(&self, name: &str) -> ModelResult<StreamId> {
        match self.names.get(name) {
            Some(Entry::Stream(id)) => Ok(*id),
            _ => Err(ModelError::unknown(EntityKind::Stream, name)),
        }
    }

    pub fn variable(&self, name: &str) -> ModelResult<VarId> {
        match self.names.get(name) {
            Some(Entry::Variable(id)) => Ok(*id),
            _ => Err(ModelError::unknown(EntityKind::Variable, name)),
        }
    }

    pub fn parameter(&self, name: &str) -> ModelResult<ParamId> {
        match self.names.get(name) {
            Some(Entry::Parameter(id)) => Ok(*id),
            _ => Err(ModelError::unknown(EntityKind::Parameter, name)),
        }
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn component_name(&self, id: ComponentId) -> Option<&str> {
        self.components.get(id.slot()).map(|c| c.name.as_str())
    }

    /// Live streams in id order.
    pub fn streams(&self) -> impl Iterator<Item = &Stream> {
        self.streams.iter().flatten()
    }

    /// Live unknowns in id order.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter().flatten()
    }

    /// Live parameters in id order.
    pub fn parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().flatten()
    }

    pub fn get_stream(&self, id: StreamId) -> ModelResult<&Stream> {
        self.streams
            .get(id.slot())
            .and_then(Option::as_ref)
            .ok_or_else(|| ModelError::unknown(EntityKind::Stream, format!("#{id}")))
    }

    pub fn get_variable(&self, id: VarId) -> ModelResult<&Variable> {
        self.variables
            .get(id.slot())
            .and_then(Option::as_ref)
            .ok_or_else(|| ModelError::unknown(EntityKind::Variable, format!("#{id}")))
    }

    pub fn get_parameter(&self, id: ParamId) -> ModelResult<&Parameter> {
        self.parameters
            .get(id.slot())
            .and_then(Option::as_ref)
            .ok_or_else(|| ModelError::unknown(EntityKind::Parameter, format!("#{id}")))
    }

    pub fn var_name(&self, id: VarId) -> Option<&str> {
        self.get_variable(id).ok().map(|v| v.name.as_str())
    }

    pub fn param_name(&self, id: ParamId) -> Option<&str> {
        self.get_parameter(id).ok().map(|p| p.name.as_str())
    }

    /// Number of variable slots, including empty ones.
    pub fn variable_slots(&self) -> usize {
        self.variables.len()
    }

    /// Number of unknowns that are not fixed.
    pub fn free_variable_count(&self) -> usize {
        self.variables().filter(|v| v.fixed.is_none()).count()
    }

    /// Parameter values indexed by slot (`NaN` for empty slots).
    pub fn param_values(&self) -> Vec<Real> {
        self.parameters
            .iter()
            .map(|p| p.as_ref().map_or(Real::NAN, |p| p.value))
            .collect()
    }

    /// Initial values of all unknowns, with fixed unknowns at their fixed value.
    pub fn initial_assignment(&self) -> Assignment {
        Assignment::from_values(
            self.variables
                .iter()
                .map(|v| v.as_ref().map_or(Real::NAN, |v| v.fixed.unwrap_or(v.initial)))
                .collect(),
        )
    }

    // ---- stream accessors ----

    /// Total molar flow of a stream.
    pub fn total_flow(&self, stream: StreamId) -> ModelResult<Expr> {
        Ok(match &self.get_stream(stream)?.shape {
            StreamShape::Fixed { total, .. } => Expr::param(*total),
            StreamShape::Flows { total, .. } | StreamShape::Fractions { total, .. } => {
                Expr::var(*total)
            }
        })
    }

    /// Molar flow of `component` in a stream.
    pub fn component_flow(&self, stream: StreamId, component: ComponentId) -> ModelResult<Expr> {
        let c = self.component_slot(component)?;
        Ok(match &self.get_stream(stream)?.shape {
            StreamShape::Fixed { total, fractions } => {
                Expr::param(*total) * Expr::param(fractions[c])
            }
            StreamShape::Flows { flows, .. } => Expr::var(flows[c]),
            StreamShape::Fractions { total, fractions } => {
                Expr::var(*total) * Expr::var(fractions[c])
            }
        })
    }

    /// Mole fraction of `component` in a stream.
    pub fn mole_fraction(&self, stream: StreamId, component: ComponentId) -> ModelResult<Expr> {
        let c = self.component_slot(component)?;
        Ok(match &self.get_stream(stream)?.shape {
            StreamShape::Fixed { fractions, .. } => Expr::param(fractions[c]),
            StreamShape::Flows { total, flows } => Expr::var(flows[c]) / Expr::var(*total),
            StreamShape::Fractions { fractions, .. } => Expr::var(fractions[c]),
        })
    }

    /// Unknowns of a stream: total flow first, then per-component in component order.
    pub fn stream_vars(&self, stream: StreamId) -> Vec<VarId> {
        match self.get_stream(stream).map(|s| &s.shape) {
            Ok(StreamShape::Flows { total, flows }) => {
                std::iter::once(*total).chain(flows.iter().copied()).collect()
            }
            Ok(StreamShape::Fractions { total, fractions }) => {
                std::iter::once(*total).chain(fractions.iter().copied()).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Name lookup across all entity kinds, for diagnostics.
    pub fn kind_of(&self, name: &str) -> Option<EntityKind> {
        self.names.get(name).map(|e| e.kind())
    }

    // ---- internals ----

    fn component_slot(&self, component: ComponentId) -> ModelResult<usize> {
        let slot = component.slot();
        if slot < self.components.len() {
            Ok(slot)
        } else {
            Err(ModelError::unknown(
                EntityKind::Component,
                format!("#{component}"),
            ))
        }
    }

    fn ensure_available(&self, name: &str, kind: EntityKind) -> ModelResult<()> {
        if name.is_empty() {
            return Err(ModelError::invalid(format!("empty {kind} name")));
        }
        if self.names.contains_key(name) {
            return Err(ModelError::DuplicateEntity {
                kind,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn variable_mut(&mut self, id: VarId) -> ModelResult<&mut Variable> {
        self.variables
            .get_mut(id.slot())
            .and_then(Option::as_mut)
            .ok_or_else(|| ModelError::unknown(EntityKind::Variable, format!("#{id}")))
    }

    /// Slot previously held by `name`, if it was retired with the same kind.
    fn reusable_slot(&mut self, name: &str, kind: EntityKind) -> Option<usize> {
        match self.retired.get(name) {
            Some(entry) if entry.kind() == kind => {
                let slot = entry.slot();
                self.retired.remove(name);
                Some(slot)
            }
            _ => None,
        }
    }

    fn insert_variable(
        &mut self,
        name: String,
        role: VarRole,
        bounds: Bounds,
        initial: Real,
        region: Option<String>,
    ) -> ModelResult<VarId> {
        let slot = self.reusable_slot(&name, EntityKind::Variable);
        let (slot, id) = claim(&mut self.variables, slot, EntityKind::Variable)?;
        self.names.insert(name.clone(), Entry::Variable(id));
        self.variables[slot] = Some(Variable {
            id,
            name,
            role,
            bounds,
            initial,
            fixed: None,
            region,
        });
        Ok(id)
    }

    fn insert_parameter(
        &mut self,
        name: String,
        value: Real,
        region: Option<String>,
    ) -> ModelResult<ParamId> {
        let slot = self.reusable_slot(&name, EntityKind::Parameter);
        let (slot, id) = claim(&mut self.parameters, slot, EntityKind::Parameter)?;
        self.names.insert(name.clone(), Entry::Parameter(id));
        self.parameters[slot] = Some(Parameter {
            id,
            name,
            value,
            region,
        });
        Ok(id)
    }
}

/// Use `reuse` if that slot is empty, otherwise append a new slot.
fn claim<T>(
    slots: &mut Vec<Option<T>>,
    reuse: Option<usize>,
    kind: EntityKind,
) -> ModelResult<(usize, Id)> {
    let slot = match reuse {
        Some(slot) if slots.get(slot).is_some_and(Option::is_none) => slot,
        _ => slots.len(),
    };
    let id = id_for(slot, kind)?;
    if slot == slots.len() {
        slots.push(None);
    }
    Ok((slot, id))
}

fn ensure_value(name: &str, value: Real) -> ModelResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ModelError::invalid(format!(
            "'{name}' has non-finite value {value}"
        )))
    }
}
