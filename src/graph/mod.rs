//! Dependency ordering for a regeneration batch
//!
//! The world logic tells us which chunks depend on which. Dependencies are
//! only meaningful inside the current batch: edges that point at chunks
//! outside the affected set are dropped. Cycles are collapsed into strongly
//! connected components and the components are ordered topologically, so
//! every chunk comes after the chunks it depends on (unless they share a
//! cycle, in which case they simply sit next to each other).

pub mod scc;
pub mod topo;

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use log::debug;

use crate::chunk::ChunkKey;

pub use scc::{tarjan_scc, Component};
pub use topo::{topological_order, CondensedGraph};

/// Supplies "depends-on" edges for a set of affected chunks.
pub trait DependencyProvider {
    fn dependencies(&self, keys: &[ChunkKey]) -> HashMap<ChunkKey, HashSet<ChunkKey>>;
}

impl<F> DependencyProvider for F
where
    F: Fn(&[ChunkKey]) -> HashMap<ChunkKey, HashSet<ChunkKey>>,
{
    fn dependencies(&self, keys: &[ChunkKey]) -> HashMap<ChunkKey, HashSet<ChunkKey>> {
        self(keys)
    }
}

/// Each chunk depends on its left-hand neighbour at the same level, when
/// that neighbour is also part of the batch. Terrain that flows left to
/// right (rivers, roads) regenerates in a sensible order with this.
#[derive(Clone, Copy, Debug, Default)]
pub struct LeftNeighbourDependencies;

impl DependencyProvider for LeftNeighbourDependencies {
    fn dependencies(&self, keys: &[ChunkKey]) -> HashMap<ChunkKey, HashSet<ChunkKey>> {
        keys.iter()
            .map(|k| {
                let mut deps = HashSet::new();
                deps.insert(ChunkKey::new(k.cx - 1, k.cy, k.level));
                (*k, deps)
            })
            .collect()
    }
}

/// Directed graph restricted to one batch of keys. Nodes are indexed in the
/// order the keys were given; adjacency lists are sorted by that index so
/// traversal is deterministic.
#[derive(Clone, Debug)]
pub struct DependencyGraph<K> {
    keys: Vec<K>,
    edges: Vec<Vec<usize>>,
    dropped_edges: usize,
}

impl<K: Copy + Eq + Hash> DependencyGraph<K> {
    /// Build the graph from an edge map. Duplicate keys are ignored, as are
    /// self-edges and edges leaving the key set.
    pub fn from_edges(keys: &[K], deps: &HashMap<K, HashSet<K>>) -> Self {
        let mut index: HashMap<K, usize> = HashMap::with_capacity(keys.len());
        let mut unique = Vec::with_capacity(keys.len());
        for &key in keys {
            if !index.contains_key(&key) {
                index.insert(key, unique.len());
                unique.push(key);
            }
        }

        let mut dropped_edges = 0;
        let mut edges = vec![Vec::new(); unique.len()];
        for (from, targets) in deps {
            let Some(&from_idx) = index.get(from) else {
                dropped_edges += targets.len();
                continue;
            };
            for to in targets {
                match index.get(to) {
                    Some(&to_idx) if to_idx != from_idx => edges[from_idx].push(to_idx),
                    _ => dropped_edges += 1,
                }
            }
        }
        for list in &mut edges {
            list.sort_unstable();
            list.dedup();
        }

        Self {
            keys: unique,
            edges,
            dropped_edges,
        }
    }

    /// Graph with no edges at all.
    pub fn unconnected(keys: &[K]) -> Self {
        Self::from_edges(keys, &HashMap::new())
    }

    pub fn node_count(&self) -> usize {
        self.keys.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().map(|e| e.len()).sum()
    }

    /// Edges discarded while building (outside the batch or self-referencing).
    pub fn dropped_edges(&self) -> usize {
        self.dropped_edges
    }

    pub fn key(&self, node: usize) -> K {
        self.keys[node]
    }

    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    /// Nodes that `node` depends on.
    pub fn edges_of(&self, node: usize) -> &[usize] {
        &self.edges[node]
    }
}

impl DependencyGraph<ChunkKey> {
    /// Ask the provider (once) for the batch's dependencies. Without a
    /// provider every chunk is independent.
    pub fn resolve(keys: &[ChunkKey], provider: Option<&dyn DependencyProvider>) -> Self {
        let graph = match provider {
            Some(provider) => Self::from_edges(keys, &provider.dependencies(keys)),
            None => Self::unconnected(keys),
        };
        if graph.dropped_edges > 0 {
            debug!(
                "dependency graph: dropped {} edges outside the batch of {} chunks",
                graph.dropped_edges,
                graph.node_count()
            );
        }
        graph
    }
}

/// Linear processing sequence for one batch. Every key appears exactly once;
/// members of one component are contiguous.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessingOrder<K> {
    keys: Vec<K>,
    /// Length of each component, in order.
    component_sizes: Vec<usize>,
}

impl<K> Default for ProcessingOrder<K> {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            component_sizes: Vec::new(),
        }
    }
}

impl<K: Copy + Eq> ProcessingOrder<K> {
    pub fn from_components(components: Vec<Component<K>>) -> Self {
        let mut keys = Vec::new();
        let mut component_sizes = Vec::with_capacity(components.len());
        for component in components {
            component_sizes.push(component.len());
            keys.extend(component.members);
        }
        Self {
            keys,
            component_sizes,
        }
    }

    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    pub fn into_keys(self) -> Vec<K> {
        self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn position(&self, key: &K) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    /// Keys grouped by component.
    pub fn components(&self) -> Vec<&[K]> {
        let mut out = Vec::with_capacity(self.component_sizes.len());
        let mut start = 0;
        for &size in &self.component_sizes {
            out.push(&self.keys[start..start + size]);
            start += size;
        }
        out
    }
}

/// Order a graph: collapse cycles, then sort components topologically.
pub fn order_graph<K: Copy + Eq + Hash>(graph: &DependencyGraph<K>) -> ProcessingOrder<K> {
    let components = tarjan_scc(graph);
    let condensed = CondensedGraph::build(graph, &components);
    let order = topological_order(&condensed);

    let mut slots: Vec<Option<Component<K>>> = components.into_iter().map(Some).collect();
    let ordered = order.into_iter().filter_map(|i| slots[i].take()).collect();
    ProcessingOrder::from_components(ordered)
}

/// Resolve dependencies for a batch and produce its processing order.
pub fn processing_order(
    keys: &[ChunkKey],
    provider: Option<&dyn DependencyProvider>,
) -> ProcessingOrder<ChunkKey> {
    let graph = DependencyGraph::resolve(keys, provider);
    order_graph(&graph)
}
