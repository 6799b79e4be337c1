//! Integration tests for the entity model and relation parser together.

use fs_model::{
    Bounds, CompositionBasis, EntityModel, ModelError, SliceEnv, StreamInit, StreamSpec,
    parse_relation,
};

fn splitter_model() -> EntityModel {
    let mut model = EntityModel::new();
    for c in ["A", "B"] {
        model.declare_component(c).unwrap();
    }
    model
        .declare_stream(StreamSpec::fixed("feed", 100.0, &[("A", 0.6), ("B", 0.4)]))
        .unwrap();
    for name in ["top", "bottom"] {
        model
            .declare_stream(StreamSpec::free(
                name,
                CompositionBasis::Flows,
                StreamInit::uniform(50.0, 25.0),
            ))
            .unwrap();
    }
    model.declare_parameter("r_lk", 0.9).unwrap();
    model
}

#[test]
fn recovery_relation_evaluates_against_feed() {
    let model = splitter_model();
    let (lhs, rhs) = parse_relation("r_lk * feed.f[A] == top.f[A]", &model).unwrap();
    let mut values = model.initial_assignment();
    values.set(model.variable("top.f[A]").unwrap(), 54.0);
    let params = model.param_values();
    let env = SliceEnv {
        vars: values.as_slice(),
        params: &params,
    };
    assert!((lhs.eval(&env) - rhs.eval(&env)).abs() < 1e-12);
    assert_eq!(lhs.vars().len(), 0);
    assert_eq!(rhs.vars().len(), 1);
}

#[test]
fn every_free_unknown_has_an_initial_value() {
    let mut model = splitter_model();
    model.declare_extent("zeta", 0.0).unwrap();
    model
        .declare_unknown("S", Bounds::new(Some(0.0), Some(1.0)), 0.9)
        .unwrap();
    let init = model.initial_assignment();
    for v in model.variables() {
        assert!(init.get(v.id).is_finite(), "{} has no initial value", v.name);
    }
    assert_eq!(model.free_variable_count(), 8);
}

#[test]
fn relation_over_removed_stream_is_unknown() {
    let mut model = EntityModel::new();
    model.declare_component("A").unwrap();
    model
        .declare_stream(
            StreamSpec::free("tmp", CompositionBasis::Flows, StreamInit::uniform(1.0, 1.0))
                .in_region("r"),
        )
        .unwrap();
    assert!(parse_relation("tmp.F == 1", &model).is_ok());
    model.remove_region("r");
    assert!(matches!(
        parse_relation("tmp.F == 1", &model),
        Err(ModelError::UnknownEntity { .. })
    ));
}
