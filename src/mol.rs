use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use crate::atom::Atom;
use crate::bond::{Bond, BondOrder};
use crate::error::{NormError, Result};

/// Fixed per-atom neighbor capacity. Exceeding it is a hard
/// [`CapacityExceeded`](crate::NormError::CapacityExceeded) error at every
/// call site.
pub const MAX_NEIGHBORS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Parity {
    Odd,
    Even,
    #[default]
    Undefined,
}

/// A stereo neighbor slot: either a graph atom or the implicit hydrogen of
/// the named parent atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StereoRef {
    Atom(NodeIndex),
    ImplicitH(NodeIndex),
}

/// Tetrahedral stereocenter: parity of the neighbor ordering in `neighbors`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StereoCenter {
    pub center: NodeIndex,
    pub neighbors: [StereoRef; 4],
    pub parity: Parity,
}

/// Configured double bond: parity of `refs` relative to the bond axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StereoBond {
    pub atoms: (NodeIndex, NodeIndex),
    pub refs: [StereoRef; 2],
    pub parity: Parity,
}

impl StereoBond {
    fn is_between(&self, a: NodeIndex, b: NodeIndex) -> bool {
        self.atoms == (a, b) || self.atoms == (b, a)
    }
}

/// The molecular graph: atoms and bonds in a petgraph `UnGraph`, plus stereo
/// descriptor lists.
///
/// A bond is stored once as an undirected edge, so both endpoints observe
/// the same order by construction; every mutation goes through methods that
/// keep the neighbor-capacity and no-duplicate-bond invariants.
#[derive(Debug, Clone, Default)]
pub struct MolGraph {
    graph: UnGraph<Atom, Bond>,
    stereo_centers: Vec<StereoCenter>,
    stereo_bonds: Vec<StereoBond>,
}

impl MolGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn atom(&self, idx: NodeIndex) -> &Atom {
        &self.graph[idx]
    }

    pub fn atom_mut(&mut self, idx: NodeIndex) -> &mut Atom {
        &mut self.graph[idx]
    }

    pub fn bond(&self, idx: EdgeIndex) -> &Bond {
        &self.graph[idx]
    }

    pub fn bond_mut(&mut self, idx: EdgeIndex) -> &mut Bond {
        &mut self.graph[idx]
    }

    pub fn add_atom(&mut self, atom: Atom) -> NodeIndex {
        self.graph.add_node(atom)
    }

    /// Add a bond, enforcing the per-atom neighbor capacity and rejecting
    /// duplicate edges.
    pub fn add_bond(&mut self, a: NodeIndex, b: NodeIndex, bond: Bond) -> Result<EdgeIndex> {
        if a == b {
            return Err(NormError::inconsistent(format!(
                "self-bond on atom {}",
                a.index()
            )));
        }
        if self.graph.find_edge(a, b).is_some() {
            return Err(NormError::inconsistent(format!(
                "duplicate bond {}-{}",
                a.index(),
                b.index()
            )));
        }
        for end in [a, b] {
            if self.degree(end) >= MAX_NEIGHBORS {
                return Err(NormError::CapacityExceeded {
                    atom: end,
                    limit: MAX_NEIGHBORS,
                });
            }
        }
        Ok(self.graph.add_edge(a, b, bond))
    }

    /// Remove the bond between two atoms believed adjacent. Absence is a
    /// consistency violation, not a no-op.
    pub fn remove_bond_between(&mut self, a: NodeIndex, b: NodeIndex) -> Result<Bond> {
        let edge = self.graph.find_edge(a, b).ok_or_else(|| {
            NormError::inconsistent(format!(
                "bond between atoms {} and {} not found",
                a.index(),
                b.index()
            ))
        })?;
        let bond = self
            .graph
            .remove_edge(edge)
            .expect("edge index obtained from find_edge");
        self.stereo_bonds.retain(|s| !s.is_between(a, b));
        Ok(bond)
    }

    pub fn atom_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn bond_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn neighbors(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors(idx)
    }

    pub fn bonds_of(&self, idx: NodeIndex) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.graph.edges(idx).map(|e| e.id())
    }

    pub fn atoms(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    pub fn bonds(&self) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.graph.edge_indices()
    }

    pub fn bond_between(&self, a: NodeIndex, b: NodeIndex) -> Option<EdgeIndex> {
        self.graph.find_edge(a, b)
    }

    pub fn bond_endpoints(&self, idx: EdgeIndex) -> Option<(NodeIndex, NodeIndex)> {
        self.graph.edge_endpoints(idx)
    }

    pub fn other_endpoint(&self, edge: EdgeIndex, this: NodeIndex) -> Option<NodeIndex> {
        let (a, b) = self.graph.edge_endpoints(edge)?;
        if a == this {
            Some(b)
        } else if b == this {
            Some(a)
        } else {
            None
        }
    }

    /// Incident bond count (the neighbor-list length).
    pub fn degree(&self, idx: NodeIndex) -> usize {
        self.graph.edges(idx).count()
    }

    /// Sum of incident bond orders. Each pair of aromatic bonds contributes
    /// 3, an unpaired one contributes 1 (the 3k/2 rule), so a benzene carbon
    /// sums to 3 from its ring bonds.
    pub fn bond_order_sum(&self, idx: NodeIndex) -> u8 {
        let mut sum = 0u16;
        let mut aromatic = 0u16;
        for e in self.bonds_of(idx) {
            match self.bond(e).order {
                BondOrder::Aromatic => aromatic += 1,
                other => sum += u16::from(other.as_int().expect("non-aromatic order")),
            }
        }
        u8::try_from(sum + aromatic * 3 / 2).unwrap_or(u8::MAX)
    }

    /// Sigma skeleton valence: incident bonds plus implicit hydrogens.
    pub fn sigma_valence(&self, idx: NodeIndex) -> usize {
        self.degree(idx) + usize::from(self.atom(idx).total_h())
    }

    pub fn total_charge(&self) -> i32 {
        self.atoms().map(|a| i32::from(self.atom(a).charge)).sum()
    }

    pub fn stereo_centers(&self) -> &[StereoCenter] {
        &self.stereo_centers
    }

    pub fn stereo_bonds(&self) -> &[StereoBond] {
        &self.stereo_bonds
    }

    pub fn add_stereo_center(&mut self, stereo: StereoCenter) {
        self.stereo_centers.push(stereo);
    }

    pub fn add_stereo_bond(&mut self, stereo: StereoBond) {
        self.stereo_bonds.push(stereo);
    }

    pub fn stereo_bond_for(&self, a: NodeIndex, b: NodeIndex) -> Option<&StereoBond> {
        self.stereo_bonds.iter().find(|s| s.is_between(a, b))
    }

    pub fn remove_stereo_bond(&mut self, a: NodeIndex, b: NodeIndex) {
        self.stereo_bonds.retain(|s| !s.is_between(a, b));
    }

    pub fn remove_stereo_center(&mut self, center: NodeIndex) {
        self.stereo_centers.retain(|s| s.center != center);
    }

    /// Whether the atom satisfies the element's valence-charge equation,
    /// counting bonds, implicit hydrogens, and radical slots. Elements with
    /// no standard covalent valence always pass.
    pub fn valence_consistent(&self, idx: NodeIndex) -> bool {
        let atom = self.atom(idx);
        if atom.element.default_valences().is_empty() {
            return true;
        }
        let total = self
            .bond_order_sum(idx)
            .saturating_add(atom.total_h())
            .saturating_add(atom.radical.slots());
        atom.element.valence_allowed(atom.charge, total)
    }

    /// Rebuild the graph keeping only atoms accepted by `keep`, preserving
    /// relative order. Returns the old→new index map (`None` = dropped).
    /// Stereo descriptors referencing a dropped atom are discarded.
    pub(crate) fn retain_atoms<F>(&mut self, keep: F) -> Vec<Option<NodeIndex>>
    where
        F: Fn(&MolGraph, NodeIndex) -> bool,
    {
        let mut rebuilt = UnGraph::<Atom, Bond>::default();
        let mut index_map: Vec<Option<NodeIndex>> = vec![None; self.atom_count()];
        for idx in self.atoms() {
            if keep(self, idx) {
                index_map[idx.index()] = Some(rebuilt.add_node(self.atom(idx).clone()));
            }
        }
        for edge in self.bonds() {
            let (a, b) = self.bond_endpoints(edge).expect("live edge");
            if let (Some(na), Some(nb)) = (index_map[a.index()], index_map[b.index()]) {
                rebuilt.add_edge(na, nb, self.bond(edge).clone());
            }
        }

        let remap = |r: StereoRef| -> Option<StereoRef> {
            match r {
                StereoRef::Atom(i) => index_map[i.index()].map(StereoRef::Atom),
                StereoRef::ImplicitH(i) => index_map[i.index()].map(StereoRef::ImplicitH),
            }
        };
        let centers = std::mem::take(&mut self.stereo_centers);
        self.stereo_centers = centers
            .into_iter()
            .filter_map(|s| {
                let center = index_map[s.center.index()]?;
                let mut neighbors = [StereoRef::Atom(center); 4];
                for (slot, r) in s.neighbors.iter().enumerate() {
                    neighbors[slot] = remap(*r)?;
                }
                Some(StereoCenter {
                    center,
                    neighbors,
                    parity: s.parity,
                })
            })
            .collect();
        let bonds = std::mem::take(&mut self.stereo_bonds);
        self.stereo_bonds = bonds
            .into_iter()
            .filter_map(|s| {
                let a = index_map[s.atoms.0.index()]?;
                let b = index_map[s.atoms.1.index()]?;
                let refs = [remap(s.refs[0])?, remap(s.refs[1])?];
                Some(StereoBond {
                    atoms: (a, b),
                    refs,
                    parity: s.parity,
                })
            })
            .collect();

        self.graph = rebuilt;
        index_map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    #[test]
    fn add_atoms_and_bonds() {
        let mut mol = MolGraph::new();
        let c = mol.add_atom(Atom::new(Element::C));
        let o = mol.add_atom(Atom::new(Element::O));
        let e = mol.add_bond(c, o, Bond::new(BondOrder::Double)).unwrap();
        assert_eq!(mol.atom_count(), 2);
        assert_eq!(mol.bond_count(), 1);
        assert_eq!(mol.bond(e).order, BondOrder::Double);
        assert_eq!(mol.degree(c), 1);
        assert_eq!(mol.bond_order_sum(c), 2);
    }

    #[test]
    fn duplicate_bond_rejected() {
        let mut mol = MolGraph::new();
        let a = mol.add_atom(Atom::new(Element::C));
        let b = mol.add_atom(Atom::new(Element::C));
        mol.add_bond(a, b, Bond::default()).unwrap();
        let err = mol.add_bond(a, b, Bond::default()).unwrap_err();
        assert!(matches!(err, NormError::GraphInconsistency { .. }));
    }

    #[test]
    fn self_bond_rejected() {
        let mut mol = MolGraph::new();
        let a = mol.add_atom(Atom::new(Element::C));
        assert!(mol.add_bond(a, a, Bond::default()).is_err());
    }

    #[test]
    fn neighbor_capacity_enforced() {
        let mut mol = MolGraph::new();
        let hub = mol.add_atom(Atom::new(Element::C));
        for _ in 0..MAX_NEIGHBORS {
            let leaf = mol.add_atom(Atom::new(Element::H));
            mol.add_bond(hub, leaf, Bond::default()).unwrap();
        }
        let extra = mol.add_atom(Atom::new(Element::H));
        let err = mol.add_bond(hub, extra, Bond::default()).unwrap_err();
        assert_eq!(
            err,
            NormError::CapacityExceeded {
                atom: hub,
                limit: MAX_NEIGHBORS
            }
        );
    }

    #[test]
    fn remove_missing_bond_is_inconsistency() {
        let mut mol = MolGraph::new();
        let a = mol.add_atom(Atom::new(Element::C));
        let b = mol.add_atom(Atom::new(Element::C));
        assert!(mol.remove_bond_between(a, b).is_err());
    }

    #[test]
    fn aromatic_bond_order_sum() {
        // three fused-ring style carbons around a center with 2 aromatic bonds
        let mut mol = MolGraph::new();
        let c0 = mol.add_atom(Atom::new(Element::C));
        let c1 = mol.add_atom(Atom::new(Element::C));
        let c2 = mol.add_atom(Atom::new(Element::C));
        mol.add_bond(c0, c1, Bond::new(BondOrder::Aromatic)).unwrap();
        mol.add_bond(c0, c2, Bond::new(BondOrder::Aromatic)).unwrap();
        assert_eq!(mol.bond_order_sum(c0), 3);
        assert_eq!(mol.bond_order_sum(c1), 1);
    }

    #[test]
    fn valence_consistency_counts_h_and_radicals() {
        let mut mol = MolGraph::new();
        let c = mol.add_atom(Atom {
            num_h: 4,
            ..Atom::new(Element::C)
        });
        assert!(mol.valence_consistent(c));
        mol.atom_mut(c).num_h = 3;
        assert!(!mol.valence_consistent(c));
        mol.atom_mut(c).radical = crate::atom::Radical::Doublet;
        assert!(mol.valence_consistent(c));
    }

    #[test]
    fn retain_atoms_remaps_bonds_and_stereo() {
        let mut mol = MolGraph::new();
        let c0 = mol.add_atom(Atom::new(Element::C));
        let h = mol.add_atom(Atom::new(Element::H));
        let c1 = mol.add_atom(Atom::new(Element::C));
        mol.add_bond(c0, h, Bond::default()).unwrap();
        mol.add_bond(c0, c1, Bond::new(BondOrder::Double)).unwrap();
        mol.add_stereo_bond(StereoBond {
            atoms: (c0, c1),
            refs: [StereoRef::ImplicitH(c0), StereoRef::ImplicitH(c1)],
            parity: Parity::Even,
        });

        let map = mol.retain_atoms(|m, i| !m.atom(i).is_hydrogen());
        assert_eq!(mol.atom_count(), 2);
        assert_eq!(mol.bond_count(), 1);
        assert_eq!(map[1], None);
        // stereo bond survives with remapped endpoints
        assert_eq!(mol.stereo_bonds().len(), 1);
        assert_eq!(mol.stereo_bonds()[0].atoms, (n(0), n(1)));
    }

    #[test]
    fn removing_bond_drops_its_stereo_descriptor() {
        let mut mol = MolGraph::new();
        let a = mol.add_atom(Atom::new(Element::C));
        let b = mol.add_atom(Atom::new(Element::C));
        mol.add_bond(a, b, Bond::new(BondOrder::Double)).unwrap();
        mol.add_stereo_bond(StereoBond {
            atoms: (a, b),
            refs: [StereoRef::ImplicitH(a), StereoRef::ImplicitH(b)],
            parity: Parity::Odd,
        });
        mol.remove_bond_between(a, b).unwrap();
        assert!(mol.stereo_bonds().is_empty());
    }
}
