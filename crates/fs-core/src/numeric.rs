/// Floating point type used throughout the engine
pub type Real = f64;

/// L1 distance between two equally sized slices.
///
/// Extra trailing entries of the longer slice are ignored.
pub fn l1_distance(a: &[Real], b: &[Real]) -> Real {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}

/// Move each entry of `current` a fraction `lambda` of the way to `target`.
///
/// `lambda = 1` is plain substitution; values below 1 under-relax.
pub fn relax_toward(current: &mut [Real], target: &[Real], lambda: Real) {
    for (x, t) in current.iter_mut().zip(target) {
        *x += lambda * (t - *x);
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn l1_distance_is_symmetric(v in prop::collection::vec((-1e3_f64..1e3, -1e3_f64..1e3), 0..8)) {
            let a: Vec<Real> = v.iter().map(|p| p.0).collect();
            let b: Vec<Real> = v.iter().map(|p| p.1).collect();
            prop_assert!((l1_distance(&a, &b) - l1_distance(&b, &a)).abs() < 1e-9);
            prop_assert!(l1_distance(&a, &a) == 0.0);
        }

        #[test]
        fn under_relaxation_shrinks_the_gap(
            v in prop::collection::vec((-1e3_f64..1e3, -1e3_f64..1e3), 1..8),
            lambda in 0.1_f64..1.0,
        ) {
            let mut x: Vec<Real> = v.iter().map(|p| p.0).collect();
            let target: Vec<Real> = v.iter().map(|p| p.1).collect();
            let before = l1_distance(&x, &target);
            relax_toward(&mut x, &target, lambda);
            prop_assert!(l1_distance(&x, &target) <= before * (1.0 - lambda) + 1e-9);
        }
    }
}
