//! Tearing on small recycle flowsheets.

use fs_equations::{Flowsheet, UnitSpec, count, count_with_pins};
use fs_model::{Bounds, CompositionBasis, StreamInit, StreamSpec};
use fs_tearing::{
    GuessGrid, SweepOutcome, TearError, TearOptions, TearSet, TearState, TearingIterator,
    closure_equations, sweep,
};
use proptest::prelude::*;

fn linear_recycle(a: f64, b: f64, start: f64) -> (Flowsheet, TearSet) {
    let mut fs = Flowsheet::new();
    let r = fs.model.declare_unknown("r", Bounds::FREE, start).unwrap();
    let out = fs.model.declare_unknown("out", Bounds::FREE, 0.0).unwrap();
    fs.add_relation("loop", &format!("out == {a} * r + {b}")).unwrap();
    let set = TearSet::new().with_pair(&fs.model, r, out).unwrap();
    (fs, set)
}

#[test]
fn halving_recycle_converges_to_twenty() {
    let (fs, set) = linear_recycle(0.5, 10.0, 0.0);
    let options = TearOptions {
        tolerance: 1e-6,
        ..TearOptions::default()
    };
    let report = TearingIterator::new(&fs, set, options).unwrap().run().unwrap();

    assert_eq!(report.state, TearState::Converged);
    assert_eq!(report.iterations, 25);
    assert!(report.warnings.is_empty());
    assert!((report.tear_values[0] - 20.0).abs() < 1e-5);
    let out = fs.model.variable("out").unwrap();
    assert!((report.assignment.get(out) - 20.0).abs() < 1e-6);
}

/// feed -> mixer -> divider -> product, with half the divider outlet recycled.
fn mixer_divider_loop() -> (Flowsheet, TearSet) {
    let mut fs = Flowsheet::new();
    for c in ["A", "B"] {
        fs.model.declare_component(c).unwrap();
    }
    fs.model
        .declare_stream(StreamSpec::fixed("feed", 100.0, &[("A", 0.6), ("B", 0.4)]))
        .unwrap();
    for name in ["r_guess", "mix", "product", "r_out"] {
        fs.model
            .declare_stream(StreamSpec::free(
                name,
                CompositionBasis::Flows,
                StreamInit::uniform(10.0, 5.0),
            ))
            .unwrap();
    }
    fs.add_unit(
        "mixer",
        UnitSpec::Mixer {
            inlets: vec!["feed".into(), "r_guess".into()],
            outlet: "mix".into(),
        },
    )
    .unwrap();
    fs.add_unit(
        "divider",
        UnitSpec::Divider {
            inlet: "mix".into(),
            outlets: vec!["product".into(), "r_out".into()],
            fractions: vec![0.5.into()],
        },
    )
    .unwrap();
    fs.add_stream_closures().unwrap();

    let g = fs.model.stream("r_guess").unwrap();
    let c = fs.model.stream("r_out").unwrap();
    let set = TearSet::from_streams(&fs.model, g, c).unwrap();
    (fs, set)
}

#[test]
fn stream_tear_converges_and_matches_joint_solve() {
    let (fs, set) = mixer_divider_loop();
    let pins: fs_equations::Pins = set
        .pairs()
        .iter()
        .map(|p| (p.guess, 0.0))
        .collect();
    assert!(count_with_pins(&fs, &pins).is_square());

    let report = TearingIterator::new(&fs, set.clone(), TearOptions::default())
        .unwrap()
        .run()
        .unwrap();
    assert!(report.converged());
    let a = fs.model.variable("r_out.f[A]").unwrap();
    let b = fs.model.variable("r_out.f[B]").unwrap();
    assert!((report.assignment.get(a) - 60.0).abs() < 1e-3);
    assert!((report.assignment.get(b) - 40.0).abs() < 1e-3);

    let mut joint = fs.clone();
    for eq in closure_equations(&set, &joint.model).unwrap() {
        joint.insert(eq).unwrap();
    }
    assert!(count(&joint).is_square());
    let out = fs_solver::solve_flowsheet(&joint, &fs_solver::SolveOptions::default()).unwrap();
    assert_eq!(out.status, fs_solver::SolveStatus::Optimal);
    assert!((out.values.get(a) - report.assignment.get(a)).abs() < 1e-3);
}

#[test]
fn stream_guess_override_sets_every_member() {
    let (fs, set) = mixer_divider_loop();
    let g = fs.model.stream("r_guess").unwrap();
    let it = TearingIterator::new(&fs, set, TearOptions::default())
        .unwrap()
        .with_stream_guess(g, &[100.0, 60.0, 40.0])
        .unwrap();
    assert_eq!(it.guesses(), &[100.0, 60.0, 40.0]);
}

#[test]
fn failing_inner_solve_is_an_error() {
    let mut fs = Flowsheet::new();
    let r = fs.model.declare_unknown("r", Bounds::FREE, -100.0).unwrap();
    let out = fs
        .model
        .declare_unknown("out", Bounds::NON_NEGATIVE, 0.0)
        .unwrap();
    fs.add_relation("loop", "out == 0.5 * r + 10").unwrap();
    let set = TearSet::new().with_pair(&fs.model, r, out).unwrap();

    let err = TearingIterator::new(&fs, set, TearOptions::default())
        .unwrap()
        .run()
        .unwrap_err();
    assert!(matches!(
        err,
        TearError::InnerSolve {
            iteration: 0,
            status: fs_solver::SolveStatus::Infeasible,
            ..
        }
    ));
}

#[test]
fn sweep_records_failed_points_and_keeps_going() {
    let mut fs = Flowsheet::new();
    let r = fs.model.declare_unknown("r", Bounds::FREE, 0.0).unwrap();
    let out = fs
        .model
        .declare_unknown("out", Bounds::NON_NEGATIVE, 0.0)
        .unwrap();
    fs.add_relation("loop", "out == 0.5 * r + 10").unwrap();
    let set = TearSet::new().with_pair(&fs.model, r, out).unwrap();
    let grid = GuessGrid::new().variable(r, [-100.0, 0.0, 40.0]);

    let report = sweep(&fs, &set, &grid, &TearOptions::default());
    assert_eq!(report.points.len(), 3);
    assert_eq!(report.failed_count(), 1);
    assert_eq!(report.converged_count(), 2);
    assert!(matches!(report.points[0].outcome, SweepOutcome::Failed { .. }));
    assert_eq!(report.points[1].guesses, vec![0.0]);
    assert!(report.best().is_some());
}

#[test]
fn stream_axis_scales_component_guesses() {
    let (fs, set) = mixer_divider_loop();
    let g = fs.model.stream("r_guess").unwrap();
    let grid = GuessGrid::new().stream(g, [50.0, 100.0]);
    let report = sweep(&fs, &set, &grid, &TearOptions::default());
    assert_eq!(report.converged_count(), 2);
    assert_eq!(report.best().map(|p| p.index), Some(1));
}

proptest! {
    #[test]
    fn contracting_recycle_error_never_grows(
        a in 0.05f64..0.8,
        b in -50.0f64..50.0,
        start in -100.0f64..100.0,
    ) {
        let (fs, set) = linear_recycle(a, b, start);
        let report = TearingIterator::new(&fs, set, TearOptions::default())
            .unwrap()
            .run()
            .unwrap();
        prop_assert_eq!(report.state, TearState::Converged);
        for pair in report.error_history.windows(2).skip(1) {
            prop_assert!(pair[1] <= pair[0] * (1.0 + 1e-9) + 1e-9);
        }
        let fixed_point = b / (1.0 - a);
        prop_assert!((report.tear_values[0] - fixed_point).abs() < 1e-3);
    }
}
