//! Unit/stream topology and recycle detection.

use std::collections::BTreeMap;

use fs_core::{StreamId, UnitId};
use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::{ModelError, ModelResult};

/// Graph node: a unit, or the open end of a feed or product stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Unit(UnitId),
    Source(StreamId),
    Sink(StreamId),
}

/// Directed graph with one node per unit plus terminals and one edge per stream.
#[derive(Debug, Clone)]
pub struct Topology {
    graph: DiGraph<Endpoint, StreamId>,
}

impl Topology {
    /// Build from each unit's inlet and outlet streams.
    ///
    /// A stream may be produced by at most one unit and consumed by at most
    /// one unit. Streams with no producer start at a source terminal; streams
    /// with no consumer end at a sink terminal.
    pub fn build<'a>(
        units: impl IntoIterator<Item = (UnitId, &'a [StreamId], &'a [StreamId])>,
    ) -> ModelResult<Self> {
        let mut graph = DiGraph::new();
        let mut unit_nodes: BTreeMap<UnitId, NodeIndex> = BTreeMap::new();
        let mut producer: BTreeMap<StreamId, UnitId> = BTreeMap::new();
        let mut consumer: BTreeMap<StreamId, UnitId> = BTreeMap::new();

        for (unit, inlets, outlets) in units {
            unit_nodes
                .entry(unit)
                .or_insert_with(|| graph.add_node(Endpoint::Unit(unit)));
            for &s in inlets {
                if consumer.insert(s, unit).is_some_and(|prev| prev != unit) {
                    return Err(ModelError::InvalidSpec {
                        what: format!("stream #{s} is consumed by more than one unit"),
                    });
                }
            }
            for &s in outlets {
                if producer.insert(s, unit).is_some_and(|prev| prev != unit) {
                    return Err(ModelError::InvalidSpec {
                        what: format!("stream #{s} is produced by more than one unit"),
                    });
                }
            }
        }

        let mut streams: Vec<StreamId> = producer.keys().chain(consumer.keys()).copied().collect();
        streams.sort();
        streams.dedup();

        for s in streams {
            let from = match producer.get(&s) {
                Some(u) => unit_nodes[u],
                None => graph.add_node(Endpoint::Source(s)),
            };
            let to = match consumer.get(&s) {
                Some(u) => unit_nodes[u],
                None => graph.add_node(Endpoint::Sink(s)),
            };
            graph.add_edge(from, to, s);
        }

        Ok(Self { graph })
    }

    pub fn stream_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Groups of units that form recycle loops, sorted for determinism.
    pub fn recycle_loops(&self) -> Vec<Vec<UnitId>> {
        let mut loops: Vec<Vec<UnitId>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || scc.iter().any(|&n| self.graph.find_edge(n, n).is_some())
            })
            .map(|scc| {
                let mut units: Vec<UnitId> = scc
                    .into_iter()
                    .filter_map(|n| match self.graph[n] {
                        Endpoint::Unit(u) => Some(u),
                        _ => None,
                    })
                    .collect();
                units.sort();
                units
            })
            .collect();
        loops.sort();
        loops
    }

    pub fn has_recycle(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// True if cutting `streams` leaves the flowsheet without loops.
    pub fn is_torn_by(&self, streams: &[StreamId]) -> bool {
        let cut = self
            .graph
            .filter_map(|_, n| Some(*n), |_, s| (!streams.contains(s)).then_some(*s));
        !is_cyclic_directed(&cut)
    }
}
