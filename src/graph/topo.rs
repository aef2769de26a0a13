//! Topological ordering of collapsed components (Kahn's algorithm)

use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;

use log::warn;

use super::{Component, DependencyGraph};

/// Meta-graph over strongly connected components. Component A depends on B
/// when any member of A depends on any member of B and A != B.
#[derive(Clone, Debug)]
pub struct CondensedGraph {
    /// Components each component depends on, sorted and unique.
    depends_on: Vec<Vec<usize>>,
}

impl CondensedGraph {
    pub fn build<K: Copy + Eq + Hash>(graph: &DependencyGraph<K>, components: &[Component<K>]) -> Self {
        let mut component_of: HashMap<K, usize> = HashMap::with_capacity(graph.node_count());
        for (i, component) in components.iter().enumerate() {
            for &key in &component.members {
                component_of.insert(key, i);
            }
        }

        let mut depends_on: Vec<HashSet<usize>> = vec![HashSet::new(); components.len()];
        for node in 0..graph.node_count() {
            let Some(&from) = component_of.get(&graph.key(node)) else {
                continue;
            };
            for &dep in graph.edges_of(node) {
                if let Some(&to) = component_of.get(&graph.key(dep)) {
                    if to != from {
                        depends_on[from].insert(to);
                    }
                }
            }
        }

        Self {
            depends_on: depends_on
                .into_iter()
                .map(|set| {
                    let mut v: Vec<usize> = set.into_iter().collect();
                    v.sort_unstable();
                    v
                })
                .collect(),
        }
    }

    /// Build directly from per-component dependency lists.
    pub fn from_lists(depends_on: Vec<Vec<usize>>) -> Self {
        Self { depends_on }
    }

    pub fn component_count(&self) -> usize {
        self.depends_on.len()
    }

    pub fn depends_on(&self, component: usize) -> &[usize] {
        &self.depends_on[component]
    }
}

/// Order components so each comes after everything it depends on.
///
/// Ready components are taken in index order. Should the sort ever fail to
/// place a component (the meta-graph is acyclic, so this means a bookkeeping
/// bug), the leftovers are appended rather than dropped.
pub fn topological_order(graph: &CondensedGraph) -> Vec<usize> {
    let n = graph.component_count();

    let mut in_degree = vec![0usize; n];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (component, deps) in graph.depends_on.iter().enumerate() {
        for &dep in deps {
            if dep < n {
                in_degree[component] += 1;
                dependents[dep].push(component);
            }
        }
    }

    let mut queue: VecDeque<usize> = (0..n).filter(|&c| in_degree[c] == 0).collect();
    let mut order = Vec::with_capacity(n);
    let mut placed = vec![false; n];

    while let Some(component) = queue.pop_front() {
        order.push(component);
        placed[component] = true;
        for &dependent in &dependents[component] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                queue.push_back(dependent);
            }
        }
    }

    if order.len() < n {
        let missing: Vec<usize> = (0..n).filter(|&c| !placed[c]).collect();
        warn!(
            "topological sort placed {}/{} components; appending {:?}",
            order.len(),
            n,
            missing
        );
        order.extend(missing);
    }

    order
}
