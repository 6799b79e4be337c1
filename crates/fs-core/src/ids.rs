use core::fmt;
use core::num::NonZeroU32;

/// Position of an entity in its model slot vector.
///
/// Stored as `slot + 1` so `Option<Id>` is no larger than `Id`. Ids of
/// removed entities are reused when an entity of the same name and kind is
/// declared again.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(NonZeroU32);

impl Id {
    /// Highest slot an id can address.
    pub const MAX_SLOT: usize = (u32::MAX - 1) as usize;

    /// Id for a slot vector position, `None` past [`Id::MAX_SLOT`].
    pub fn from_slot(slot: usize) -> Option<Self> {
        let stored = u32::try_from(slot).ok()?.checked_add(1)?;
        NonZeroU32::new(stored).map(Self)
    }

    /// Id for a literal index. Indices past the last slot clamp to it.
    pub fn from_index(index: u32) -> Self {
        Self(NonZeroU32::MIN.saturating_add(index))
    }

    pub fn index(self) -> u32 {
        self.0.get() - 1
    }

    pub fn slot(self) -> usize {
        self.index() as usize
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index())
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

pub type ComponentId = Id;
pub type StreamId = Id;
/// Scalar unknown: a stream quantity, an extent or a free-standing unknown.
pub type VarId = Id;
pub type ParamId = Id;
pub type UnitId = Id;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_map_back_to_themselves() {
        for slot in [0usize, 1, 7, 4096, Id::MAX_SLOT] {
            let id = Id::from_slot(slot).unwrap();
            assert_eq!(id.slot(), slot);
        }
        assert_eq!(Id::from_index(3), Id::from_slot(3).unwrap());
    }

    #[test]
    fn slots_past_the_id_range_are_rejected() {
        assert_eq!(Id::from_slot(Id::MAX_SLOT + 1), None);
        assert_eq!(Id::from_slot(usize::MAX), None);
        assert_eq!(Id::from_index(u32::MAX).slot(), Id::MAX_SLOT);
    }

    #[test]
    fn missing_id_costs_nothing() {
        assert_eq!(
            core::mem::size_of::<Id>(),
            core::mem::size_of::<Option<Id>>()
        );
    }

    #[test]
    fn ids_order_by_slot() {
        assert!(Id::from_index(3) < Id::from_index(4));
        assert_eq!(format!("{:?}", Id::from_index(5)), "#5");
    }
}
