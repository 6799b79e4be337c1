//! Compiled residual system.

use fs_core::{Real, VarId};
use fs_equations::{EquationKey, EquationRole, Flowsheet, Pins, dof};
use fs_model::{Assignment, Bounds, Expr, SliceEnv};
use nalgebra::DVector;

use crate::error::{SolverError, SolverResult};

#[derive(Debug, Clone, PartialEq)]
struct Row {
    key: EquationKey,
    label: String,
    lhs: Expr,
    rhs: Expr,
}

/// Residual system over the free unknowns of a flowsheet.
///
/// Fixed and pinned unknowns are baked into a template value vector; the
/// solver only sees the free ones. Equations over fixed unknowns and
/// parameters only are held apart and checked against the fixed values;
/// equations that pinning left without a free unknown are suspended.
#[derive(Debug, Clone, PartialEq)]
pub struct System {
    free: Vec<VarId>,
    names: Vec<String>,
    bounds: Vec<Bounds>,
    rows: Vec<Row>,
    fixed_rows: Vec<Row>,
    template: Vec<Real>,
    params: Vec<Real>,
    suspended: Vec<String>,
}

impl System {
    /// Compile the active equations of `fs` with `pins` held as parameters.
    pub fn compile(fs: &Flowsheet, pins: &Pins) -> SolverResult<Self> {
        let free_set = dof::free_variables(fs, pins);
        let mut template = fs.model.initial_assignment();
        for (&var, &value) in pins {
            let variable = fs.model.get_variable(var).map_err(|e| SolverError::Setup {
                what: format!("pinned unknown: {e}"),
            })?;
            if !value.is_finite() {
                return Err(SolverError::Setup {
                    what: format!("pin for '{}' is not finite", variable.name),
                });
            }
            template.set(var, value);
        }

        let mut free = Vec::with_capacity(free_set.len());
        let mut names = Vec::with_capacity(free_set.len());
        let mut bounds = Vec::with_capacity(free_set.len());
        for &var in &free_set {
            let v = fs
                .model
                .get_variable(var)
                .map_err(|e| SolverError::Equation(e.into()))?;
            free.push(var);
            names.push(v.name.clone());
            bounds.push(v.bounds);
        }

        let mut rows = Vec::new();
        let mut fixed_rows = Vec::new();
        let mut suspended = Vec::new();
        for eq in fs.equations.iter_active() {
            let label = fs.label(&eq.key);
            let row = || Row {
                key: eq.key.clone(),
                label: label.clone(),
                lhs: eq.lhs.clone(),
                rhs: eq.rhs.clone(),
            };
            match dof::classify(eq, &free_set, pins) {
                EquationRole::Counted => rows.push(row()),
                EquationRole::FullyFixed => fixed_rows.push(row()),
                EquationRole::Suspended => suspended.push(label),
            }
        }

        Ok(Self {
            free,
            names,
            bounds,
            rows,
            fixed_rows,
            template: template.as_slice().to_vec(),
            params: fs.model.param_values(),
            suspended,
        })
    }

    pub fn variable_count(&self) -> usize {
        self.free.len()
    }

    pub fn equation_count(&self) -> usize {
        self.rows.len()
    }

    pub fn free_variables(&self) -> &[VarId] {
        &self.free
    }

    pub fn variable_names(&self) -> &[String] {
        &self.names
    }

    pub fn equation_keys(&self) -> impl Iterator<Item = &EquationKey> {
        self.rows.iter().map(|r| &r.key)
    }

    pub fn equation_labels(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.label.as_str())
    }

    pub fn suspended(&self) -> &[String] {
        &self.suspended
    }

    /// Equations with no free unknown whose residual at the fixed values
    /// exceeds `tolerance`, with that residual.
    pub fn inconsistent_fixed(&self, tolerance: f64) -> Vec<(String, f64)> {
        let env = SliceEnv {
            vars: &self.template,
            params: &self.params,
        };
        self.fixed_rows
            .iter()
            .filter_map(|r| {
                let residual = r.lhs.eval(&env) - r.rhs.eval(&env);
                (residual.is_nan() || residual.abs() > tolerance)
                    .then(|| (r.label.clone(), residual))
            })
            .collect()
    }

    /// True if every equation is affine in the free unknowns.
    pub fn is_linear(&self) -> bool {
        self.rows.iter().all(|r| r.lhs.is_affine() && r.rhs.is_affine())
    }

    /// Free-unknown vector taken from a full assignment.
    pub fn pack(&self, values: &Assignment) -> DVector<f64> {
        DVector::from_iterator(self.free.len(), self.free.iter().map(|v| values.get(*v)))
    }

    /// Full assignment: template values with `x` written into the free slots.
    pub fn unpack(&self, x: &DVector<f64>) -> Assignment {
        let mut values = Assignment::from_values(self.template.clone());
        for (var, value) in self.free.iter().zip(x.iter()) {
            values.set(*var, *value);
        }
        values
    }

    /// Residual vector `lhs - rhs` per equation.
    pub fn residual(&self, x: &DVector<f64>) -> DVector<f64> {
        let values = self.unpack(x);
        let env = SliceEnv {
            vars: values.as_slice(),
            params: &self.params,
        };
        DVector::from_iterator(
            self.rows.len(),
            self.rows.iter().map(|r| r.lhs.eval(&env) - r.rhs.eval(&env)),
        )
    }

    /// Names and sizes of bound violations larger than `tolerance`.
    pub fn bound_violations(&self, x: &DVector<f64>, tolerance: f64) -> Vec<(String, f64)> {
        self.names
            .iter()
            .zip(&self.bounds)
            .zip(x.iter())
            .filter_map(|((name, bounds), value)| {
                let v = bounds.violation(*value);
                (v > tolerance).then(|| (name.clone(), v))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flowsheet() -> (Flowsheet, VarId, VarId) {
        let mut fs = Flowsheet::new();
        let g = fs.model.declare_unknown("g", Bounds::FREE, 0.0).unwrap();
        let y = fs.model.declare_unknown("y", Bounds::NON_NEGATIVE, 1.0).unwrap();
        fs.add_relation("loop", "y == 0.5 * g + 10").unwrap();
        (fs, g, y)
    }

    #[test]
    fn pins_become_template_values() {
        let (fs, g, y) = flowsheet();
        let pins: Pins = [(g, 4.0)].into_iter().collect();
        let sys = System::compile(&fs, &pins).unwrap();
        assert_eq!(sys.free_variables(), &[y]);
        assert_eq!(sys.equation_count(), 1);
        let r = sys.residual(&DVector::from_element(1, 12.0));
        assert!(r[0].abs() < 1e-12);
        let full = sys.unpack(&DVector::from_element(1, 12.0));
        assert_eq!(full.get(g), 4.0);
        assert!(sys.is_linear());
    }

    #[test]
    fn equations_without_free_unknowns_are_suspended() {
        let (fs, g, y) = flowsheet();
        let pins: Pins = [(g, 4.0), (y, 12.0)].into_iter().collect();
        let sys = System::compile(&fs, &pins).unwrap();
        assert_eq!(sys.equation_count(), 0);
        assert_eq!(sys.suspended(), &["relation:loop".to_string()]);
    }

    #[test]
    fn fixed_only_equations_are_checked_not_solved() {
        let (mut fs, g, _) = flowsheet();
        fs.model.fix(g, 4.0).unwrap();
        fs.model.declare_parameter("p", 100.0).unwrap();
        fs.add_relation("g_four", "g == 4").unwrap();
        fs.add_relation("p_fifty", "p == 50").unwrap();
        let sys = System::compile(&fs, &Pins::new()).unwrap();
        assert_eq!(sys.equation_count(), 1);
        assert!(sys.suspended().is_empty());
        assert_eq!(
            sys.inconsistent_fixed(1e-9),
            vec![("relation:p_fifty".to_string(), 50.0)]
        );
    }

    #[test]
    fn bound_violations_are_named() {
        let (fs, _, _) = flowsheet();
        let sys = System::compile(&fs, &Pins::new()).unwrap();
        let x = DVector::from_vec(vec![0.0, -2.0]);
        let v = sys.bound_violations(&x, 1e-9);
        assert_eq!(v, vec![("y".to_string(), 2.0)]);
    }
}
