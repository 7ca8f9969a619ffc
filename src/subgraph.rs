//! Path search over an atom subset.
//!
//! Builds a dense local adjacency view restricted to a chosen node set, then
//! runs DFS with an explicit work stack (push on descend, pop on backtrack)
//! and a caller-supplied forbidden-edge set. Used by the repair engine to
//! stay out of bonds already committed to another rule.

use std::collections::HashSet;

use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::mol::MolGraph;

/// Union of atoms and bonds over a set of enumerated paths. Bonds are
/// deduplicated by edge identity, independent of traversal direction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathUnion {
    pub atoms: Vec<NodeIndex>,
    pub bonds: Vec<EdgeIndex>,
}

pub struct Subgraph {
    /// local index → original atom
    locals: Vec<NodeIndex>,
    /// original atom index → local index
    index_of: Vec<Option<usize>>,
    /// restricted adjacency: (local neighbor, original edge)
    adj: Vec<Vec<(usize, EdgeIndex)>>,
}

impl Subgraph {
    /// Restrict the molecule's adjacency to `nodes`. Duplicate entries in
    /// `nodes` are ignored.
    pub fn new(mol: &MolGraph, nodes: &[NodeIndex]) -> Self {
        let mut index_of: Vec<Option<usize>> = vec![None; mol.atom_count()];
        let mut locals = Vec::with_capacity(nodes.len());
        for &node in nodes {
            if index_of[node.index()].is_none() {
                index_of[node.index()] = Some(locals.len());
                locals.push(node);
            }
        }
        let mut adj: Vec<Vec<(usize, EdgeIndex)>> = vec![Vec::new(); locals.len()];
        for (li, &node) in locals.iter().enumerate() {
            for edge in mol.bonds_of(node) {
                let other = mol.other_endpoint(edge, node).expect("incident edge");
                if let Some(lo) = index_of[other.index()] {
                    adj[li].push((lo, edge));
                }
            }
        }
        Self {
            locals,
            index_of,
            adj,
        }
    }

    pub fn contains(&self, node: NodeIndex) -> bool {
        self.index_of
            .get(node.index())
            .is_some_and(|slot| slot.is_some())
    }

    fn local(&self, node: NodeIndex) -> Option<usize> {
        self.index_of.get(node.index()).copied().flatten()
    }

    /// Atoms and bonds lying on any simple path `from → to` that avoids the
    /// forbidden edges. Returns an empty union when no such path exists or
    /// either endpoint is outside the subset.
    pub fn path_union(
        &self,
        from: NodeIndex,
        to: NodeIndex,
        forbidden: &HashSet<EdgeIndex>,
    ) -> PathUnion {
        let (Some(start), Some(goal)) = (self.local(from), self.local(to)) else {
            return PathUnion::default();
        };
        let mut atom_set: HashSet<usize> = HashSet::new();
        let mut bond_set: HashSet<EdgeIndex> = HashSet::new();

        // Explicit DFS: the stack holds (node, next-neighbor cursor); a node
        // on the current path is never re-entered.
        let mut on_path = vec![false; self.locals.len()];
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        let mut path_edges: Vec<EdgeIndex> = Vec::new();
        on_path[start] = true;

        loop {
            let Some(&(v, cursor)) = stack.last() else {
                break;
            };
            if v == goal && stack.len() > 1 {
                // record the path, then backtrack
                atom_set.extend(stack.iter().map(|&(node, _)| node));
                bond_set.extend(path_edges.iter().copied());
                on_path[v] = false;
                stack.pop();
                path_edges.pop();
                continue;
            }
            if cursor < self.adj[v].len() {
                stack.last_mut().expect("non-empty stack").1 = cursor + 1;
                let (w, edge) = self.adj[v][cursor];
                if on_path[w] || forbidden.contains(&edge) {
                    continue;
                }
                on_path[w] = true;
                path_edges.push(edge);
                stack.push((w, 0));
            } else {
                on_path[v] = false;
                stack.pop();
                path_edges.pop();
            }
        }

        // trivial start == goal query
        if start == goal {
            atom_set.insert(start);
        }

        let mut atoms: Vec<NodeIndex> = atom_set.into_iter().map(|l| self.locals[l]).collect();
        atoms.sort();
        let mut bonds: Vec<EdgeIndex> = bond_set.into_iter().collect();
        bonds.sort();
        PathUnion { atoms, bonds }
    }

    /// All subset atoms reachable from `from` without crossing a forbidden
    /// edge, in ascending atom order. Includes `from` itself.
    pub fn reachable(&self, from: NodeIndex, forbidden: &HashSet<EdgeIndex>) -> Vec<NodeIndex> {
        let Some(start) = self.local(from) else {
            return Vec::new();
        };
        let mut seen = vec![false; self.locals.len()];
        seen[start] = true;
        let mut stack = vec![start];
        while let Some(v) = stack.pop() {
            for &(w, edge) in &self.adj[v] {
                if !seen[w] && !forbidden.contains(&edge) {
                    seen[w] = true;
                    stack.push(w);
                }
            }
        }
        let mut out: Vec<NodeIndex> = seen
            .iter()
            .enumerate()
            .filter(|&(_, &s)| s)
            .map(|(l, _)| self.locals[l])
            .collect();
        out.sort();
        out
    }
}
