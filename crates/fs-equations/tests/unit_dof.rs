//! Degrees-of-freedom accounting across the unit catalogue.

use fs_equations::{
    ConversionSpec, DofStatus, EquationKey, EquationKind, Flowsheet, KeySpec, ReactionSpec, Side,
    UnitSpec, count,
};
use fs_model::{CompositionBasis, StreamInit, StreamSpec};

fn with_components(names: &[&str]) -> Flowsheet {
    let mut fs = Flowsheet::new();
    for c in names {
        fs.model.declare_component(*c).unwrap();
    }
    fs
}

fn free(fs: &mut Flowsheet, name: &str, basis: CompositionBasis) {
    fs.model
        .declare_stream(StreamSpec::free(name, basis, StreamInit::uniform(10.0, 1.0)))
        .unwrap();
}

#[test]
fn missing_zero_flow_equation_leaves_one_dof() {
    let mut fs = with_components(&["A", "B", "C"]);
    fs.model
        .declare_stream(StreamSpec::fixed(
            "feed",
            100.0,
            &[("A", 0.5), ("B", 0.3), ("C", 0.2)],
        ))
        .unwrap();
    free(&mut fs, "top", CompositionBasis::Flows);
    free(&mut fs, "bottom", CompositionBasis::Flows);
    let col = fs
        .add_unit(
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
                sharp: vec![("C".into(), Side::Top)],
            },
        )
        .unwrap();
    fs.add_stream_closures().unwrap();
    assert_eq!(count(&fs).status, DofStatus::Square);

    let c = fs.model.component("C").unwrap();
    fs.equations
        .remove(&EquationKey::unit(col, EquationKind::ZeroFlow, c))
        .unwrap();
    let report = count(&fs);
    assert_eq!(report.dof, 1);
    assert_eq!(report.status, DofStatus::UnderDetermined(1));
    assert_eq!(report.unreferenced, vec!["bottom.f[C]".to_string()]);
}

#[test]
fn fraction_basis_splitter_is_square() {
    let mut fs = with_components(&["A", "B", "C"]);
    fs.model
        .declare_stream(StreamSpec::fixed(
            "feed",
            100.0,
            &[("A", 0.5), ("B", 0.3), ("C", 0.2)],
        ))
        .unwrap();
    free(&mut fs, "top", CompositionBasis::Fractions);
    free(&mut fs, "bottom", CompositionBasis::Fractions);
    fs.add_unit(
        "col",
        UnitSpec::Splitter {
            inlet: "feed".into(),
            top: "top".into(),
            bottom: "bottom".into(),
            light_key: Some(KeySpec {
                component: "B".into(),
                recovery: 0.98.into(),
            }),
            heavy_key: None,
            sharp: vec![("A".into(), Side::Top), ("C".into(), Side::Bottom)],
        },
    )
    .unwrap();
    fs.add_stream_closures().unwrap();
    let report = count(&fs);
    assert_eq!((report.unknowns, report.equations), (8, 8));
}

#[test]
fn divider_and_reactor_are_square() {
    let mut fs = with_components(&["A", "B"]);
    fs.model
        .declare_stream(StreamSpec::fixed("feed", 10.0, &[("A", 1.0)]))
        .unwrap();
    free(&mut fs, "r_out", CompositionBasis::Flows);
    for o in ["o1", "o2", "o3"] {
        free(&mut fs, o, CompositionBasis::Flows);
    }
    fs.model.declare_extent("zeta", 1.0).unwrap();
    fs.model.declare_parameter("X", 0.5).unwrap();
    fs.add_unit(
        "rx",
        UnitSpec::Reactor {
            inlets: vec!["feed".into()],
            outlet: "r_out".into(),
            reactions: vec![ReactionSpec {
                extent: "zeta".into(),
                stoichiometry: vec![("A".into(), -1.0), ("B".into(), 1.0)],
            }],
            conversions: vec![ConversionSpec {
                extent: "zeta".into(),
                key: "A".into(),
                conversion: fs_equations::ValueRef::Param("X".into()),
            }],
        },
    )
    .unwrap();
    fs.add_unit(
        "split",
        UnitSpec::Divider {
            inlet: "r_out".into(),
            outlets: vec!["o1".into(), "o2".into(), "o3".into()],
            fractions: vec![0.2.into(), 0.3.into()],
        },
    )
    .unwrap();
    fs.add_stream_closures().unwrap();

    let report = count(&fs);
    // reactor: 3 stream unknowns + extent; divider: 3 outlets x 3 unknowns
    assert_eq!(report.unknowns, 13);
    assert!(report.is_square(), "{report:?}");

    let bad = fs.add_unit(
        "split2",
        UnitSpec::Divider {
            inlet: "r_out".into(),
            outlets: vec!["o1".into(), "o2".into()],
            fractions: vec![],
        },
    );
    assert!(bad.is_err());
}
