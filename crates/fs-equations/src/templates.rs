//! Equation templates.
//!
//! Each template builds one keyed equation (or a fixed pair) from stream
//! accessors, so the same template serves fixed, `Flows` and `Fractions`
//! streams alike.

use fs_core::{ComponentId, Real, StreamId, UnitId, VarId};
use fs_model::{EntityModel, Expr, ModelError, StreamShape};

use crate::equation::Equation;
use crate::error::EquationResult;
use crate::key::{EquationKey, EquationKind, Scope};
use crate::units::Side;

/// `S.F == Σ_c S.f[c]` for a `Flows` stream.
pub fn overall_balance(model: &EntityModel, stream: StreamId) -> EquationResult<Equation> {
    let s = model.get_stream(stream)?;
    match &s.shape {
        StreamShape::Flows { total, flows } => Ok(Equation::new(
            EquationKey::stream(stream, EquationKind::OverallBalance),
            Expr::var(*total),
            Expr::sum(flows.iter().map(|f| Expr::var(*f))),
        )),
        _ => Err(ModelError::InvalidSpec {
            what: format!("overall balance needs a flow-basis stream, '{}' is not", s.name),
        }
        .into()),
    }
}

/// `Σ_c S.x[c] == 1` for a `Fractions` stream.
pub fn composition_sum(model: &EntityModel, stream: StreamId) -> EquationResult<Equation> {
    let s = model.get_stream(stream)?;
    match &s.shape {
        StreamShape::Fractions { fractions, .. } => Ok(Equation::new(
            EquationKey::stream(stream, EquationKind::CompositionSum),
            Expr::sum(fractions.iter().map(|x| Expr::var(*x))),
            Expr::constant(1.0),
        )),
        _ => Err(ModelError::InvalidSpec {
            what: format!(
                "composition sum needs a fraction-basis stream, '{}' is not",
                s.name
            ),
        }
        .into()),
    }
}

/// The closure equation matching a free stream's basis; `None` for fixed streams.
pub fn stream_closure(model: &EntityModel, stream: StreamId) -> EquationResult<Option<Equation>> {
    match model.get_stream(stream)?.shape {
        StreamShape::Fixed { .. } => Ok(None),
        StreamShape::Flows { .. } => overall_balance(model, stream).map(Some),
        StreamShape::Fractions { .. } => composition_sum(model, stream).map(Some),
    }
}

/// `1 - r`, folded when `r` is a literal.
fn complement(recovery: &Expr) -> Expr {
    match recovery {
        Expr::Const(r) => Expr::constant(1.0 - r),
        other => Expr::constant(1.0) - other.clone(),
    }
}

/// Fractional-recovery pair for a key component recovered to `preferred`.
///
/// Light key (`preferred == Top`): `r * in == top`, `(1 - r) * in == bottom`.
/// Heavy key mirrors it.
#[allow(clippy::too_many_arguments)]
pub fn recovery_split(
    model: &EntityModel,
    unit: UnitId,
    inlet: StreamId,
    top: StreamId,
    bottom: StreamId,
    component: ComponentId,
    recovery: &Expr,
    preferred: Side,
) -> EquationResult<[Equation; 2]> {
    let feed = model.component_flow(inlet, component)?;
    let (top_share, bottom_share) = match preferred {
        Side::Top => (recovery.clone(), complement(recovery)),
        Side::Bottom => (complement(recovery), recovery.clone()),
    };
    Ok([
        Equation::new(
            EquationKey::unit(unit, EquationKind::RecoveryTop, component),
            top_share * feed.clone(),
            model.component_flow(top, component)?,
        ),
        Equation::new(
            EquationKey::unit(unit, EquationKind::RecoveryBottom, component),
            bottom_share * feed,
            model.component_flow(bottom, component)?,
        ),
    ])
}

/// `in[c] == side[c]` for a component sent entirely to one outlet.
pub fn sharp_balance(
    model: &EntityModel,
    unit: UnitId,
    inlet: StreamId,
    side: StreamId,
    component: ComponentId,
) -> EquationResult<Equation> {
    Ok(Equation::new(
        EquationKey::unit(unit, EquationKind::SharpBalance, component),
        model.component_flow(inlet, component)?,
        model.component_flow(side, component)?,
    ))
}

/// `out[c] == 0`, stated on the fraction for a `Fractions` stream.
pub fn zero_flow(
    model: &EntityModel,
    unit: UnitId,
    stream: StreamId,
    component: ComponentId,
) -> EquationResult<Equation> {
    let s = model.get_stream(stream)?;
    let lhs = match &s.shape {
        StreamShape::Fixed { .. } => {
            return Err(ModelError::InvalidSpec {
                what: format!("zero-flow equation on fixed stream '{}'", s.name),
            }
            .into());
        }
        StreamShape::Flows { .. } => model.component_flow(stream, component)?,
        StreamShape::Fractions { .. } => model.mole_fraction(stream, component)?,
    };
    Ok(Equation::new(
        EquationKey::unit(unit, EquationKind::ZeroFlow, component),
        lhs,
        Expr::constant(0.0),
    ))
}

/// `Σ inlets[c] + Σ_r ν[r,c] ζ[r] == Σ outlets[c]`.
///
/// `reaction_terms` holds `(ν, ζ)` for the reactions `c` takes part in.
pub fn component_balance(
    model: &EntityModel,
    unit: UnitId,
    inlets: &[StreamId],
    outlets: &[StreamId],
    component: ComponentId,
    reaction_terms: &[(Real, VarId)],
) -> EquationResult<Equation> {
    let mut lhs = Vec::with_capacity(inlets.len() + reaction_terms.len());
    for &s in inlets {
        lhs.push(model.component_flow(s, component)?);
    }
    for &(nu, extent) in reaction_terms {
        lhs.push(Expr::constant(nu) * Expr::var(extent));
    }
    let mut rhs = Vec::with_capacity(outlets.len());
    for &s in outlets {
        rhs.push(model.component_flow(s, component)?);
    }
    Ok(Equation::new(
        EquationKey::unit(unit, EquationKind::ComponentBalance, component),
        Expr::sum(lhs),
        Expr::sum(rhs),
    ))
}

/// `ζ == X * Σ inlets[key]`.
pub fn conversion(
    model: &EntityModel,
    unit: UnitId,
    index: usize,
    extent: VarId,
    conversion: Expr,
    inlets: &[StreamId],
    key: ComponentId,
) -> EquationResult<Equation> {
    let mut feed = Vec::with_capacity(inlets.len());
    for &s in inlets {
        feed.push(model.component_flow(s, key)?);
    }
    Ok(Equation::new(
        EquationKey::unit(unit, EquationKind::Conversion(index), key),
        Expr::var(extent),
        conversion * Expr::sum(feed),
    ))
}

/// `out_k[c] == φ_k * in[c]`.
pub fn divider_split(
    model: &EntityModel,
    unit: UnitId,
    k: usize,
    inlet: StreamId,
    outlet: StreamId,
    fraction: &Expr,
    component: ComponentId,
) -> EquationResult<Equation> {
    Ok(Equation::new(
        EquationKey::unit(unit, EquationKind::DividerSplit(k), component),
        model.component_flow(outlet, component)?,
        fraction.clone() * model.component_flow(inlet, component)?,
    ))
}

/// A free-form named relation.
pub fn relation(name: impl Into<String>, lhs: Expr, rhs: Expr) -> Equation {
    Equation::new(EquationKey::relation(name), lhs, rhs)
}

/// `guess == computed`, closing a recycle without tearing.
pub fn recycle_closure(
    model: &EntityModel,
    guess: VarId,
    computed: VarId,
) -> EquationResult<Equation> {
    model.get_variable(guess)?;
    model.get_variable(computed)?;
    Ok(Equation::new(
        EquationKey::new(Scope::Variable(guess), EquationKind::RecycleClosure),
        Expr::var(guess),
        Expr::var(computed),
    ))
}
