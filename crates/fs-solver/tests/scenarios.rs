//! End-to-end solves of small flowsheets.

use std::time::Duration;

use fs_equations::{Flowsheet, KeySpec, Pins, Side, UnitSpec, count};
use fs_model::{Bounds, CompositionBasis, StreamInit, StreamSpec};
use fs_solver::{
    BackendKind, SolveOptions, SolveStatus, SolverError, System, redundant_equations, solve,
    solve_flowsheet,
};

fn splitter() -> Flowsheet {
    let mut fs = Flowsheet::new();
    for c in ["A", "B"] {
        fs.model.declare_component(c).unwrap();
    }
    fs.model
        .declare_stream(StreamSpec::fixed("feed", 100.0, &[("A", 0.6), ("B", 0.4)]))
        .unwrap();
    for name in ["top", "bottom"] {
        fs.model
            .declare_stream(StreamSpec::free(
                name,
                CompositionBasis::Flows,
                StreamInit::uniform(10.0, 5.0),
            ))
            .unwrap();
    }
    fs.add_unit(
        "col",
        UnitSpec::Splitter {
            inlet: "feed".into(),
            top: "top".into(),
            bottom: "bottom".into(),
            light_key: Some(KeySpec {
                component: "A".into(),
                recovery: 0.9.into(),
            }),
            heavy_key: Some(KeySpec {
                component: "B".into(),
                recovery: 0.95.into(),
            }),
            sharp: Vec::<(String, Side)>::new(),
        },
    )
    .unwrap();
    fs.add_stream_closures().unwrap();
    fs
}

fn flow(fs: &Flowsheet, values: &fs_model::Assignment, name: &str) -> f64 {
    values.get(fs.model.variable(name).unwrap())
}

#[test]
fn splitter_recoveries_close_both_backends() {
    let fs = splitter();
    assert!(count(&fs).is_square());

    for backend in [BackendKind::Newton, BackendKind::Linear] {
        let options = SolveOptions {
            backend,
            ..SolveOptions::default()
        };
        let out = solve_flowsheet(&fs, &options).unwrap();
        assert_eq!(out.status, SolveStatus::Optimal, "{backend:?}");
        let v = out.values;
        assert!((flow(&fs, &v, "top.f[A]") - 54.0).abs() < 1e-6);
        assert!((flow(&fs, &v, "bottom.f[A]") - 6.0).abs() < 1e-6);
        assert!((flow(&fs, &v, "top.f[B]") - 2.0).abs() < 1e-6);
        assert!((flow(&fs, &v, "bottom.f[B]") - 38.0).abs() < 1e-6);
        for s in ["top", "bottom"] {
            let total = flow(&fs, &v, &format!("{s}.F"));
            let parts = flow(&fs, &v, &format!("{s}.f[A]")) + flow(&fs, &v, &format!("{s}.f[B]"));
            assert!((total - parts).abs() < 1e-6);
        }
    }
}

#[test]
fn contradictory_pair_is_infeasible_not_zero() {
    let mut fs = Flowsheet::new();
    let x = fs.model.declare_unknown("x", Bounds::FREE, 0.0).unwrap();
    fs.add_relation("five", "x == 5").unwrap();
    fs.add_relation("six", "x == 6").unwrap();
    assert_eq!(count(&fs).dof, -1);

    let out = solve_flowsheet(&fs, &SolveOptions::default()).unwrap();
    assert_eq!(out.status, SolveStatus::Infeasible);
    assert!(out.values.get(x) != 0.0);
    assert!(matches!(
        out.into_result(),
        Err(SolverError::Infeasible { .. })
    ));
}

#[test]
fn fixed_unknown_contradicting_a_relation_is_infeasible() {
    let mut fs = Flowsheet::new();
    let x = fs.model.declare_unknown("x", Bounds::FREE, 0.0).unwrap();
    fs.model.fix(x, 5.0).unwrap();
    fs.add_relation("x_six", "x == 6").unwrap();

    let report = count(&fs);
    assert_eq!(report.equations, 1);
    assert!(!report.is_square());

    let out = solve_flowsheet(&fs, &SolveOptions::default()).unwrap();
    assert_eq!(out.status, SolveStatus::Infeasible);
    assert!(out.diagnostics.message.contains("relation:x_six"));
    assert!(matches!(
        out.into_result(),
        Err(SolverError::Infeasible { .. })
    ));
}

#[test]
fn parameter_only_relation_is_counted_and_infeasible() {
    let mut fs = Flowsheet::new();
    fs.model.declare_parameter("p", 100.0).unwrap();
    let y = fs.model.declare_unknown("y", Bounds::FREE, 0.0).unwrap();
    fs.add_relation("p_fifty", "p == 50").unwrap();
    fs.add_relation("y_two", "y == 2").unwrap();

    let report = count(&fs);
    assert_eq!(report.equations, 2);
    assert_eq!(report.fully_fixed, vec!["relation:p_fifty".to_string()]);

    for backend in [BackendKind::Newton, BackendKind::Linear] {
        let options = SolveOptions {
            backend,
            ..SolveOptions::default()
        };
        let out = solve_flowsheet(&fs, &options).unwrap();
        assert_eq!(out.status, SolveStatus::Infeasible, "{backend:?}");
        assert!(out.diagnostics.message.contains("relation:p_fifty"));
        assert_eq!(out.values.get(y), 0.0);
    }
}

#[test]
fn zero_timeout_yields_timeout_status() {
    let fs = splitter();
    let options = SolveOptions {
        timeout: Some(Duration::ZERO),
        ..SolveOptions::default()
    };
    let out = solve_flowsheet(&fs, &options).unwrap();
    assert_eq!(out.status, SolveStatus::Timeout);
    assert!(matches!(out.into_result(), Err(SolverError::Timeout { .. })));
}

#[test]
fn pinned_unknown_is_held() {
    let fs = splitter();
    let top_total = fs.model.variable("top.F").unwrap();
    let mut pins = Pins::new();
    pins.insert(top_total, 56.0);
    let system = System::compile(&fs, &pins).unwrap();
    assert!(!system.free_variables().contains(&top_total));

    let out = solve(&system, &fs.model.initial_assignment(), &SolveOptions::default());
    assert_eq!(out.status, SolveStatus::Optimal);
    assert_eq!(out.values.get(top_total), 56.0);
}

#[test]
fn over_specified_splitter_reports_redundancy() {
    let mut fs = splitter();
    fs.add_relation("total", "top.F + bottom.F == 100").unwrap();
    assert_eq!(count(&fs).dof, -1);

    let system = System::compile(&fs, &Pins::new()).unwrap();
    let report = redundant_equations(&system, &fs.model.initial_assignment(), 1e-6);
    assert_eq!(report.variables, 6);
    assert_eq!(report.equations, 7);
    assert_eq!(report.rank, 6);
    assert!(report.candidates.contains(&"relation:total".to_string()));
}
