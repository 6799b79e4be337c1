//! Values for every unknown slot of an entity model.

use fs_core::{Real, VarId};

/// A full assignment of values, indexed by variable slot.
///
/// Slots of removed variables hold `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    values: Vec<Real>,
}

impl Assignment {
    pub fn from_values(values: Vec<Real>) -> Self {
        Self { values }
    }

    pub fn filled(len: usize, value: Real) -> Self {
        Self {
            values: vec![value; len],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of `var`, or `NaN` if the slot does not exist.
    pub fn get(&self, var: VarId) -> Real {
        self.values.get(var.slot()).copied().unwrap_or(Real::NAN)
    }

    pub fn set(&mut self, var: VarId, value: Real) {
        let slot = var.slot();
        if slot >= self.values.len() {
            self.values.resize(slot + 1, Real::NAN);
        }
        self.values[slot] = value;
    }

    pub fn as_slice(&self) -> &[Real] {
        &self.values
    }
}
