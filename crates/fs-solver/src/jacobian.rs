//! Finite difference Jacobian computation.

use nalgebra::{DMatrix, DVector};

/// Compute Jacobian using forward finite differences.
///
/// For each column j, perturbs x[j] by epsilon (scaled by |x[j]|) and
/// computes (f(x+e) - f(x))/e. `f_x` is `f(x)`, already evaluated by the caller.
pub fn finite_difference_jacobian<F>(
    x: &DVector<f64>,
    f_x: &DVector<f64>,
    f: F,
    epsilon: f64,
) -> DMatrix<f64>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    let n = x.len();
    let m = f_x.len();
    let mut jac = DMatrix::zeros(m, n);

    for j in 0..n {
        let mut x_perturbed = x.clone();
        let dx = epsilon * x[j].abs().max(1.0);
        x_perturbed[j] += dx;
        // Use the representable step to keep the quotient exact for linear f.
        let step = x_perturbed[j] - x[j];

        let df = (f(&x_perturbed) - f_x) / step;
        jac.set_column(j, &df);
    }

    jac
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jacobian_linear() {
        // f(x) = 2*x, J = 2
        let f = |x: &DVector<f64>| DVector::from_element(1, 2.0 * x[0]);
        let x = DVector::from_element(1, 3.0);
        let jac = finite_difference_jacobian(&x, &f(&x), f, 1e-7);
        assert!((jac[(0, 0)] - 2.0).abs() < 1e-5);
    }

    #[test]
    fn jacobian_rectangular() {
        // f(x, y) = [x*y, x + y, y^2]
        let f = |v: &DVector<f64>| DVector::from_vec(vec![v[0] * v[1], v[0] + v[1], v[1] * v[1]]);
        let x = DVector::from_vec(vec![2.0, 3.0]);
        let jac = finite_difference_jacobian(&x, &f(&x), f, 1e-7);
        assert_eq!(jac.shape(), (3, 2));
        assert!((jac[(0, 0)] - 3.0).abs() < 1e-5);
        assert!((jac[(0, 1)] - 2.0).abs() < 1e-5);
        assert!((jac[(2, 1)] - 6.0).abs() < 1e-5);
        assert!(jac[(2, 0)].abs() < 1e-9);
    }
}
