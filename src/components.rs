//! Connected-component labeling.
//!
//! Components are numbered 1..K by descending atom count, with ties kept in
//! first-discovered order. The DFS is iterative — a per-atom "next neighbor"
//! cursor plus an ancestor stack — so stack depth is bounded by the
//! implementation, not by long chain molecules.

use petgraph::graph::NodeIndex;

use crate::mol::MolGraph;

/// Sentinel for a component with mixed provenance during reconciliation:
/// numerically one past the largest possible component id.
pub fn no_component(mol: &MolGraph) -> u32 {
    mol.atom_count() as u32 + 1
}

/// Assign every atom its component id and return the component count.
///
/// Two atoms share an id iff they are connected by a path of bonds.
pub fn label_components(mol: &mut MolGraph) -> usize {
    let n = mol.atom_count();
    let adj: Vec<Vec<NodeIndex>> = (0..n)
        .map(|i| mol.neighbors(NodeIndex::new(i)).collect())
        .collect();

    // Provisional ids in discovery order.
    let mut provisional = vec![0u32; n];
    let mut cursor = vec![0usize; n];
    let mut ancestors: Vec<usize> = Vec::new();
    let mut count = 0u32;

    for start in 0..n {
        if provisional[start] != 0 {
            continue;
        }
        count += 1;
        provisional[start] = count;
        ancestors.push(start);
        while let Some(&v) = ancestors.last() {
            if cursor[v] < adj[v].len() {
                let w = adj[v][cursor[v]].index();
                cursor[v] += 1;
                if provisional[w] == 0 {
                    provisional[w] = count;
                    ancestors.push(w);
                }
            } else {
                ancestors.pop();
            }
        }
    }

    // Renumber by descending size; stable sort keeps discovery order on ties.
    let k = count as usize;
    let mut sizes = vec![0usize; k + 1];
    for &c in &provisional {
        sizes[c as usize] += 1;
    }
    let mut order: Vec<usize> = (1..=k).collect();
    order.sort_by_key(|&c| std::cmp::Reverse(sizes[c]));
    let mut renumber = vec![0u32; k + 1];
    for (new_id, &old_id) in order.iter().enumerate() {
        renumber[old_id] = new_id as u32 + 1;
    }

    for i in 0..n {
        mol.atom_mut(NodeIndex::new(i)).component = renumber[provisional[i] as usize];
    }
    k
}

/// Reconcile the current labeling against a previous one.
///
/// `prev` holds the previous component id per atom (indexed by atom). The
/// result maps each current id (1-based; slot 0 unused) to the previous id
/// its atoms came from. A current component keeps a previous id only if all
/// its atoms shared that id before and the previous component did not split
/// across several current components; merged or split previous ids are
/// invalidated to 0 for every current component touching them.
pub fn reconcile_components(mol: &MolGraph, prev: &[u32]) -> Vec<u32> {
    let n = mol.atom_count();
    debug_assert_eq!(prev.len(), n);
    let sentinel = no_component(mol);

    let k = mol
        .atoms()
        .map(|a| mol.atom(a).component)
        .max()
        .unwrap_or(0) as usize;
    let mut map = vec![0u32; k + 1];

    // First pass: provenance of each current component; mixed provenance
    // collapses to the sentinel.
    for a in mol.atoms() {
        let cur = mol.atom(a).component as usize;
        let p = prev[a.index()];
        if map[cur] == 0 {
            map[cur] = p;
        } else if map[cur] != p {
            map[cur] = sentinel;
        }
    }

    // Second pass: a previous id claimed by more than one current component
    // has split; collect it for invalidation along with ids feeding a mixed
    // component.
    let mut claimed = vec![0u32; n + 2];
    for a in mol.atoms() {
        let cur = mol.atom(a).component;
        let p = prev[a.index()] as usize;
        if p == 0 || p > n {
            continue;
        }
        if claimed[p] == 0 {
            claimed[p] = cur;
        } else if claimed[p] != cur {
            claimed[p] = sentinel;
        }
    }
    let mut invalid = vec![false; n + 2];
    for p in 1..=n {
        if claimed[p] == sentinel {
            invalid[p] = true;
        }
    }
    for a in mol.atoms() {
        let cur = mol.atom(a).component as usize;
        if map[cur] == sentinel {
            let p = prev[a.index()] as usize;
            if p <= n {
                invalid[p] = true;
            }
        }
    }

    for entry in map.iter_mut() {
        let p = *entry as usize;
        if *entry == sentinel || p > n || invalid[p] {
            *entry = 0;
        }
    }
    map
}
