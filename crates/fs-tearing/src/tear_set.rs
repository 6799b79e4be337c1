//! Guess/computed pairs that break recycle loops.

use std::collections::BTreeSet;

use fs_core::{StreamId, VarId};
use fs_equations::{Equation, EquationResult, templates};
use fs_model::{CompositionBasis, EntityModel};

use crate::error::{TearError, TearResult};

/// One torn unknown: the pinned `guess` and the `computed` value it must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TearPair {
    pub guess: VarId,
    pub computed: VarId,
}

/// Ordered list of tear pairs. The order fixes the layout of tear vectors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TearSet {
    pairs: Vec<TearPair>,
    streams: Vec<(StreamId, StreamId)>,
    /// Guesses whose closure follows from the stream's own closure equation.
    implied: BTreeSet<VarId>,
}

impl TearSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an explicit unknown pair.
    pub fn with_pair(mut self, model: &EntityModel, guess: VarId, computed: VarId) -> TearResult<Self> {
        self.push(model, guess, computed)?;
        Ok(self)
    }

    /// Add a stream pair: total flow plus every component flow or fraction.
    ///
    /// Both streams must be free and share a composition basis.
    pub fn with_streams(
        mut self,
        model: &EntityModel,
        guess: StreamId,
        computed: StreamId,
    ) -> TearResult<Self> {
        let g = model.get_stream(guess)?;
        let c = model.get_stream(computed)?;
        if guess == computed {
            return Err(TearError::InvalidTearSet {
                what: format!("stream '{}' cannot be torn against itself", g.name),
            });
        }
        let basis = match (g.basis(), c.basis()) {
            (Some(a), Some(b)) if a == b => a,
            (None, _) | (_, None) => {
                return Err(TearError::InvalidTearSet {
                    what: format!("'{}' and '{}' must both be free streams", g.name, c.name),
                });
            }
            _ => {
                return Err(TearError::InvalidTearSet {
                    what: format!("'{}' and '{}' use different composition bases", g.name, c.name),
                });
            }
        };
        let guess_vars = model.stream_vars(guess);
        for (gv, cv) in guess_vars.iter().zip(model.stream_vars(computed)) {
            self.push(model, *gv, cv)?;
        }
        let implied = match basis {
            CompositionBasis::Flows => guess_vars.first(),
            CompositionBasis::Fractions => guess_vars.last(),
        };
        self.implied.extend(implied.copied());
        self.streams.push((guess, computed));
        Ok(self)
    }

    /// Shorthand for a single torn stream pair.
    pub fn from_streams(model: &EntityModel, guess: StreamId, computed: StreamId) -> TearResult<Self> {
        Self::new().with_streams(model, guess, computed)
    }

    fn push(&mut self, model: &EntityModel, guess: VarId, computed: VarId) -> TearResult<()> {
        let g = model.get_variable(guess)?;
        let c = model.get_variable(computed)?;
        if guess == computed {
            return Err(TearError::InvalidTearSet {
                what: format!("'{}' cannot be torn against itself", g.name),
            });
        }
        if g.fixed.is_some() {
            return Err(TearError::InvalidTearSet {
                what: format!("guess '{}' is fixed", g.name),
            });
        }
        let used: BTreeSet<VarId> = self.pairs.iter().flat_map(|p| [p.guess, p.computed]).collect();
        if used.contains(&guess) || used.contains(&computed) {
            return Err(TearError::InvalidTearSet {
                what: format!("'{}' or '{}' is already torn", g.name, c.name),
            });
        }
        self.pairs.push(TearPair { guess, computed });
        Ok(())
    }

    pub fn pairs(&self) -> &[TearPair] {
        &self.pairs
    }

    /// Stream pairs added through [`TearSet::with_streams`].
    pub fn streams(&self) -> &[(StreamId, StreamId)] {
        &self.streams
    }

    /// Guess streams, for the topology check.
    pub fn guess_streams(&self) -> Vec<StreamId> {
        self.streams.iter().map(|(g, _)| *g).collect()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn position(&self, guess: VarId) -> Option<usize> {
        self.pairs.iter().position(|p| p.guess == guess)
    }
}

/// `guess == computed` equations that close the recycle for a simultaneous
/// solve instead of iterating.
///
/// For a torn stream one member is left out: with a flow basis the total,
/// with a fraction basis the last fraction. Its closure already follows from
/// the stream's own balance, so the joint system stays square.
pub fn closure_equations(set: &TearSet, model: &EntityModel) -> EquationResult<Vec<Equation>> {
    set.pairs()
        .iter()
        .filter(|p| !set.implied.contains(&p.guess))
        .map(|p| templates::recycle_closure(model, p.guess, p.computed))
        .collect()
}
