//! Strongly connected components (Tarjan, iterative)
//!
//! Recursion is replaced by an explicit frame stack so graph size is bounded
//! by heap, not call-stack depth.

use std::hash::Hash;

use super::DependencyGraph;

/// One strongly connected component. Members are listed in the order the
/// search discovered them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Component<K> {
    pub members: Vec<K>,
}

impl<K> Component<K> {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// True when the members depend on each other cyclically.
    pub fn is_cycle(&self) -> bool {
        self.members.len() > 1
    }
}

struct NodeState {
    index: Option<usize>,
    low_link: usize,
    on_stack: bool,
}

/// Partition the graph's nodes into strongly connected components.
///
/// Components come out in completion order: a component is emitted only after
/// every component it depends on.
pub fn tarjan_scc<K: Copy + Eq + Hash>(graph: &DependencyGraph<K>) -> Vec<Component<K>> {
    let n = graph.node_count();
    let mut state: Vec<NodeState> = (0..n)
        .map(|_| NodeState {
            index: None,
            low_link: 0,
            on_stack: false,
        })
        .collect();
    let mut next_index = 0usize;
    let mut stack: Vec<usize> = Vec::with_capacity(n);
    let mut components = Vec::new();

    // (node, next edge to explore)
    let mut work: Vec<(usize, usize)> = Vec::new();

    for root in 0..n {
        if state[root].index.is_some() {
            continue;
        }

        state[root].index = Some(next_index);
        state[root].low_link = next_index;
        state[root].on_stack = true;
        next_index += 1;
        stack.push(root);
        work.push((root, 0));

        while let Some(frame) = work.last_mut() {
            let v = frame.0;
            let edges = graph.edges_of(v);

            if frame.1 < edges.len() {
                let w = edges[frame.1];
                frame.1 += 1;

                match state[w].index {
                    None => {
                        state[w].index = Some(next_index);
                        state[w].low_link = next_index;
                        state[w].on_stack = true;
                        next_index += 1;
                        stack.push(w);
                        work.push((w, 0));
                    }
                    Some(w_index) if state[w].on_stack => {
                        state[v].low_link = state[v].low_link.min(w_index);
                    }
                    Some(_) => {}
                }
                continue;
            }

            work.pop();
            let v_low = state[v].low_link;
            if let Some(&(parent, _)) = work.last() {
                state[parent].low_link = state[parent].low_link.min(v_low);
            }

            if Some(v_low) == state[v].index {
                let mut members = Vec::new();
                while let Some(w) = stack.pop() {
                    state[w].on_stack = false;
                    members.push(graph.key(w));
                    if w == v {
                        break;
                    }
                }
                // Stack pops come out newest first
                members.reverse();
                components.push(Component { members });
            }
        }
    }

    components
}
