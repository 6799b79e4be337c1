//! Structured equation keys.

use core::fmt;
use fs_core::{ComponentId, StreamId, UnitId, VarId};

/// What an equation belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    Global,
    Stream(StreamId),
    Unit(UnitId),
    Variable(VarId),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EquationKind {
    OverallBalance,
    CompositionSum,
    RecoveryTop,
    RecoveryBottom,
    SharpBalance,
    ZeroFlow,
    ComponentBalance,
    /// Split of the k-th divider outlet.
    DividerSplit(usize),
    /// Conversion relation of the i-th reactor conversion spec.
    Conversion(usize),
    Relation(String),
    RecycleClosure,
}

impl fmt::Display for EquationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EquationKind::OverallBalance => f.write_str("overall_balance"),
            EquationKind::CompositionSum => f.write_str("composition_sum"),
            EquationKind::RecoveryTop => f.write_str("recovery_top"),
            EquationKind::RecoveryBottom => f.write_str("recovery_bottom"),
            EquationKind::SharpBalance => f.write_str("sharp_balance"),
            EquationKind::ZeroFlow => f.write_str("zero_flow"),
            EquationKind::ComponentBalance => f.write_str("component_balance"),
            EquationKind::DividerSplit(k) => write!(f, "split_{k}"),
            EquationKind::Conversion(i) => write!(f, "conversion_{i}"),
            EquationKind::Relation(name) => write!(f, "relation:{name}"),
            EquationKind::RecycleClosure => f.write_str("recycle_closure"),
        }
    }
}

/// Identity of an equation: `(scope, kind, component)`.
///
/// Keys order by scope first, so a registry iterates global relations,
/// then stream closures, then unit equations.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EquationKey {
    pub scope: Scope,
    pub kind: EquationKind,
    pub component: Option<ComponentId>,
}

impl EquationKey {
    pub fn new(scope: Scope, kind: EquationKind) -> Self {
        Self {
            scope,
            kind,
            component: None,
        }
    }

    pub fn stream(stream: StreamId, kind: EquationKind) -> Self {
        Self::new(Scope::Stream(stream), kind)
    }

    pub fn unit(unit: UnitId, kind: EquationKind, component: ComponentId) -> Self {
        Self::new(Scope::Unit(unit), kind).with_component(component)
    }

    pub fn relation(name: impl Into<String>) -> Self {
        Self::new(Scope::Global, EquationKind::Relation(name.into()))
    }

    pub fn with_component(mut self, component: ComponentId) -> Self {
        self.component = Some(component);
        self
    }
}

/// Id-based form, used in error messages. Name-based labels come from the registry.
impl fmt::Display for EquationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Scope::Global => f.write_str("global")?,
            Scope::Stream(s) => write!(f, "stream#{s}")?,
            Scope::Unit(u) => write!(f, "unit#{u}")?,
            Scope::Variable(v) => write!(f, "var#{v}")?,
        }
        write!(f, "/{}", self.kind)?;
        if let Some(c) = self.component {
            write!(f, "[#{c}]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn keys_order_by_scope_then_kind_then_component() {
        let u = UnitId::from_index(0);
        let s = StreamId::from_index(4);
        let c0 = ComponentId::from_index(0);
        let c1 = ComponentId::from_index(1);
        let keys: BTreeSet<EquationKey> = [
            EquationKey::unit(u, EquationKind::RecoveryBottom, c0),
            EquationKey::unit(u, EquationKind::RecoveryTop, c1),
            EquationKey::unit(u, EquationKind::RecoveryTop, c0),
            EquationKey::stream(s, EquationKind::OverallBalance),
            EquationKey::relation("sel"),
        ]
        .into_iter()
        .collect();
        let labels: Vec<String> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(
            labels,
            vec![
                "global/relation:sel",
                "stream#4/overall_balance",
                "unit#0/recovery_top[#0]",
                "unit#0/recovery_top[#1]",
                "unit#0/recovery_bottom[#0]",
            ]
        );
    }
}
