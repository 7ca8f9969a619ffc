//! The bond network: a flow/capacity view of the molecular graph.
//!
//! Every atom maps to a vertex carrying an `st` edge — a flow/capacity pair
//! whose flow counts the atom's free valence slots (radicals). Every bond
//! maps to a network edge whose flow is the bond order above single, so a
//! balanced vertex satisfies `incident edge flow + st flow = konst` for a
//! valence-derived constant. Alternate valence/charge/radical assignments
//! are probed as augmenting paths that alternately raise and lower edge
//! flows, exactly the scheme the aromatic matcher uses, generalized to
//! carry charge and mobile-hydrogen reservoirs as auxiliary "super"
//! vertices (a charge flower).
//!
//! All speculative mutation goes through a [`Txn`] that records every
//! (field, old value) pair it touches; rollback replays the records in
//! reverse, so a rejected probe restores the network bit for bit.

use std::collections::VecDeque;

use petgraph::graph::{EdgeIndex, NodeIndex};
use tracing::trace;

use crate::bond::BondOrder;
use crate::error::{NormError, Result};
use crate::mol::MolGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StEdge {
    pub flow: i32,
    pub cap: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// Mutually-exclusive charge placements across a delocalized group.
    Charge,
    /// Mobile-hydrogen donors of a tautomeric group.
    MobileH,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexKind {
    Atom(NodeIndex),
    Super(GroupKind),
}

#[derive(Debug, Clone)]
pub struct NetVertex {
    pub kind: VertexKind,
    pub st: StEdge,
}

#[derive(Debug, Clone)]
pub struct NetEdge {
    pub ends: (usize, usize),
    pub flow: i32,
    pub cap: i32,
    pub forbidden: bool,
    /// Frozen edges (aromatic bonds) never change and are skipped on
    /// write-back.
    pub frozen: bool,
    pub bond: Option<EdgeIndex>,
}

/// How an augmenting path terminated, and the bookkeeping it implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    /// Consumed a free valence slot (radical) on this atom.
    Radical(NodeIndex),
    /// Routed into a mobile-hydrogen reservoir through this donor atom.
    MobileH { donor: NodeIndex },
    /// Routed into a charge reservoir through this member atom.
    Charge { member: NodeIndex },
}

impl Terminal {
    pub fn atom(self) -> NodeIndex {
        match self {
            Terminal::Radical(a) => a,
            Terminal::MobileH { donor } => donor,
            Terminal::Charge { member } => member,
        }
    }
}

/// Result of one augmenting-path probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReport {
    /// Seed-bond endpoint the path departed from.
    pub start: NodeIndex,
    pub terminal: Terminal,
    /// Implicit-hydrogen delta at the terminal: +1 for a proton transfer,
    /// 0 otherwise.
    pub delta_h: i32,
    /// Net charge delta: 0 for a pure relocation within a charge flower.
    pub delta_charge: i32,
}

impl ProbeReport {
    fn from_terminal(start: NodeIndex, terminal: Terminal) -> Self {
        let delta_h = match terminal {
            Terminal::MobileH { .. } => 1,
            _ => 0,
        };
        ProbeReport {
            start,
            terminal,
            delta_h,
            delta_charge: 0,
        }
    }
}

#[derive(Debug)]
enum Undo {
    EdgeFlow { e: usize, old: i32 },
    EdgeForbidden { e: usize, old: bool },
    StFlow { v: usize, old: i32, old_tot: i32 },
    StCap { v: usize, old: i32, old_tot: i32 },
}

/// Recorded patch over a [`BondNetwork`]. Dropping a `Txn` commits it; see
/// [`BondNetwork::rollback`].
#[derive(Debug, Default)]
pub struct Txn {
    undo: Vec<Undo>,
}

impl Txn {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dir {
    Raise,
    Lower,
}

#[derive(Debug, Clone)]
pub struct BondNetwork {
    verts: Vec<NetVertex>,
    edges: Vec<NetEdge>,
    adj: Vec<Vec<usize>>,
    /// atom index → vertex id (vertices 0..atom_count are atoms, in order)
    pub tot_st_cap: i32,
    pub tot_st_flow: i32,
}

impl BondNetwork {
    /// Derive the network from the current molecule state. The network is
    /// balanced by construction; aromatic bonds enter as frozen edges.
    pub fn from_mol(mol: &MolGraph) -> Self {
        let n = mol.atom_count();
        let mut verts = Vec::with_capacity(n);
        for idx in mol.atoms() {
            let atom = mol.atom(idx);
            let slots = i32::from(atom.radical.slots());
            let spare = match atom
                .element
                .default_valences()
                .last()
                .copied()
                .map(i32::from)
            {
                Some(max_v) => {
                    let used = i32::from(mol.bond_order_sum(idx))
                        + i32::from(atom.total_h())
                        + slots
                        - i32::from(atom.charge);
                    (max_v - used).clamp(0, 2)
                }
                None => 0,
            };
            verts.push(NetVertex {
                kind: VertexKind::Atom(idx),
                st: StEdge {
                    flow: slots,
                    cap: slots + spare,
                },
            });
        }

        let mut edges = Vec::with_capacity(mol.bond_count());
        let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];
        for bond in mol.bonds() {
            let (a, b) = mol.bond_endpoints(bond).expect("live edge");
            let (flow, cap, frozen) = match mol.bond(bond).order {
                BondOrder::Single => (0, 2, false),
                BondOrder::Double => (1, 2, false),
                BondOrder::Triple => (2, 2, false),
                BondOrder::Aromatic => (1, 1, true),
            };
            let e = edges.len();
            edges.push(NetEdge {
                ends: (a.index(), b.index()),
                flow,
                cap,
                forbidden: frozen,
                frozen,
                bond: Some(bond),
            });
            adj[a.index()].push(e);
            adj[b.index()].push(e);
        }

        let tot_st_cap = verts.iter().map(|v| v.st.cap).sum();
        let tot_st_flow = verts.iter().map(|v| v.st.flow).sum();
        BondNetwork {
            verts,
            edges,
            adj,
            tot_st_cap,
            tot_st_flow,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.verts.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn st(&self, v: usize) -> StEdge {
        self.verts[v].st
    }

    pub fn edge(&self, e: usize) -> &NetEdge {
        &self.edges[e]
    }

    fn net_edge_of(&self, bond: EdgeIndex) -> Result<usize> {
        self.edges
            .iter()
            .position(|e| e.bond == Some(bond))
            .ok_or_else(|| NormError::inconsistent(format!("bond {bond:?} not in network")))
    }

    /// Attach a super vertex aggregating a charge flower or mobile-hydrogen
    /// reservoir over `members`. Returns the super vertex id.
    pub fn add_group(&mut self, kind: GroupKind, members: &[NodeIndex]) -> usize {
        let v = self.verts.len();
        self.verts.push(NetVertex {
            kind: VertexKind::Super(kind),
            st: StEdge { flow: 0, cap: 1 },
        });
        self.adj.push(Vec::new());
        self.tot_st_cap += 1;
        for &m in members {
            let e = self.edges.len();
            self.edges.push(NetEdge {
                ends: (m.index(), v),
                flow: 1,
                cap: 1,
                forbidden: false,
                frozen: false,
                bond: None,
            });
            self.adj[m.index()].push(e);
            self.adj[v].push(e);
        }
        v
    }

    // -- transactional field access -------------------------------------

    fn add_edge_flow(&mut self, txn: &mut Txn, e: usize, d: i32) {
        txn.undo.push(Undo::EdgeFlow {
            e,
            old: self.edges[e].flow,
        });
        self.edges[e].flow += d;
    }

    pub fn set_forbidden(&mut self, txn: &mut Txn, bond: EdgeIndex, val: bool) -> Result<()> {
        let e = self.net_edge_of(bond)?;
        txn.undo.push(Undo::EdgeForbidden {
            e,
            old: self.edges[e].forbidden,
        });
        self.edges[e].forbidden = val;
        Ok(())
    }

    fn forbid_raw(&mut self, txn: &mut Txn, e: usize) {
        txn.undo.push(Undo::EdgeForbidden {
            e,
            old: self.edges[e].forbidden,
        });
        self.edges[e].forbidden = true;
    }

    fn add_st_flow(&mut self, txn: &mut Txn, v: usize, d: i32) {
        txn.undo.push(Undo::StFlow {
            v,
            old: self.verts[v].st.flow,
            old_tot: self.tot_st_flow,
        });
        self.verts[v].st.flow += d;
        self.tot_st_flow += d;
    }

    fn add_st_cap(&mut self, txn: &mut Txn, v: usize, d: i32) {
        txn.undo.push(Undo::StCap {
            v,
            old: self.verts[v].st.cap,
            old_tot: self.tot_st_cap,
        });
        self.verts[v].st.cap += d;
        self.tot_st_cap += d;
    }

    /// Replay the recorded patch in reverse, restoring every touched field
    /// and both running totals bit for bit.
    pub fn rollback(&mut self, txn: Txn) {
        for undo in txn.undo.into_iter().rev() {
            match undo {
                Undo::EdgeFlow { e, old } => self.edges[e].flow = old,
                Undo::EdgeForbidden { e, old } => self.edges[e].forbidden = old,
                Undo::StFlow { v, old, old_tot } => {
                    self.verts[v].st.flow = old;
                    self.tot_st_flow = old_tot;
                }
                Undo::StCap { v, old, old_tot } => {
                    self.verts[v].st.cap = old;
                    self.tot_st_cap = old_tot;
                }
            }
        }
    }

    // -- augmenting-path search -----------------------------------------

    /// Breadth-first alternating path from `start`, first step in `dir`.
    /// Returns the edge/direction sequence and the terminal.
    fn find_alternating(&self, start: usize, dir: Dir) -> Option<(Vec<(usize, Dir)>, Terminal)> {
        let nv = self.verts.len();
        // one search state per (vertex, incoming direction)
        let idx = |v: usize, d: Dir| v * 2 + if d == Dir::Raise { 0 } else { 1 };
        let mut prev: Vec<Option<(usize, Dir, usize)>> = vec![None; nv * 2];
        let mut visited = vec![false; nv * 2];
        visited[idx(start, Dir::Raise)] = true;
        visited[idx(start, Dir::Lower)] = true;
        let mut queue: VecDeque<(usize, Dir)> = VecDeque::new();
        queue.push_back((start, dir));

        while let Some((v, want)) = queue.pop_front() {
            for &e in &self.adj[v] {
                let edge = &self.edges[e];
                if edge.forbidden {
                    continue;
                }
                match want {
                    Dir::Raise if edge.flow >= edge.cap => continue,
                    Dir::Lower if edge.flow <= 0 => continue,
                    _ => {}
                }
                let w = if edge.ends.0 == v {
                    edge.ends.1
                } else {
                    edge.ends.0
                };
                let slot = idx(w, want);
                if visited[slot] {
                    continue;
                }
                visited[slot] = true;
                prev[slot] = Some((v, want, e));

                let vert = &self.verts[w];
                let terminal = match (want, vert.kind) {
                    // a raised edge into a vertex with free slots consumes one
                    (Dir::Raise, VertexKind::Atom(a)) if vert.st.flow > 0 => {
                        Some(Terminal::Radical(a))
                    }
                    // a lowered member edge deposits into the reservoir
                    (Dir::Lower, VertexKind::Super(kind)) if vert.st.flow < vert.st.cap => {
                        if let VertexKind::Atom(member) = self.verts[v].kind {
                            Some(match kind {
                                GroupKind::Charge => Terminal::Charge { member },
                                GroupKind::MobileH => Terminal::MobileH { donor: member },
                            })
                        } else {
                            None
                        }
                    }
                    _ => None,
                };
                if let Some(term) = terminal {
                    // walk the predecessor chain back to the start
                    let mut path = Vec::new();
                    let (mut cur_v, mut cur_in) = (w, want);
                    loop {
                        let (pv, pd, pe) =
                            prev[idx(cur_v, cur_in)].expect("reached state has predecessor");
                        path.push((pe, pd));
                        if pv == start {
                            break;
                        }
                        cur_v = pv;
                        cur_in = match pd {
                            Dir::Raise => Dir::Lower,
                            Dir::Lower => Dir::Raise,
                        };
                    }
                    path.reverse();
                    return Some((path, term));
                }

                let next = match want {
                    Dir::Raise => Dir::Lower,
                    Dir::Lower => Dir::Raise,
                };
                queue.push_back((w, next));
            }
        }
        None
    }

    fn apply_path(&mut self, txn: &mut Txn, path: &[(usize, Dir)]) {
        for &(e, d) in path {
            match d {
                Dir::Raise => self.add_edge_flow(txn, e, 1),
                Dir::Lower => self.add_edge_flow(txn, e, -1),
            }
        }
    }

    /// Probe: make the seed bond one order lower and search for an alternate
    /// assignment absorbing the freed valence. On success the network holds
    /// the new flows (recorded in `txn`); on `None` the caller must roll the
    /// transaction back.
    pub fn probe_lower(
        &mut self,
        txn: &mut Txn,
        seed: EdgeIndex,
        forbidden: &[EdgeIndex],
    ) -> Result<Option<ProbeReport>> {
        for &b in forbidden {
            self.set_forbidden(txn, b, true)?;
        }
        let e = self.net_edge_of(seed)?;
        if self.edges[e].frozen || self.edges[e].flow == 0 {
            return Ok(None);
        }
        let (ua, va) = self.edges[e].ends;
        self.add_edge_flow(txn, e, -1);
        self.forbid_raw(txn, e);
        for v in [ua, va] {
            self.add_st_flow(txn, v, 1);
            if self.verts[v].st.flow > self.verts[v].st.cap {
                self.add_st_cap(txn, v, self.verts[v].st.flow - self.verts[v].st.cap);
            }
        }

        for start in [ua, va] {
            if let Some((path, term)) = self.find_alternating(start, Dir::Raise) {
                self.apply_path(txn, &path);
                self.add_st_flow(txn, start, -1);
                match term {
                    Terminal::Radical(a) => {
                        let tv = a.index();
                        self.add_st_flow(txn, tv, -1);
                    }
                    Terminal::MobileH { .. } | Terminal::Charge { .. } => {
                        let sv = self.super_of(term);
                        self.add_st_flow(txn, sv, 1);
                    }
                }
                let start_atom = match self.verts[start].kind {
                    VertexKind::Atom(a) => a,
                    VertexKind::Super(_) => unreachable!("seed endpoints are atoms"),
                };
                trace!(?term, "probe found alternate assignment");
                return Ok(Some(ProbeReport::from_terminal(start_atom, term)));
            }
        }
        Ok(None)
    }

    /// Probe: raise the seed bond one order, pulling the two required
    /// valence slots from free slots elsewhere. Both endpoint deficits must
    /// be resolved; the two reports name the slots consumed.
    pub fn probe_raise(
        &mut self,
        txn: &mut Txn,
        seed: EdgeIndex,
        forbidden: &[EdgeIndex],
    ) -> Result<Option<(ProbeReport, ProbeReport)>> {
        for &b in forbidden {
            self.set_forbidden(txn, b, true)?;
        }
        let e = self.net_edge_of(seed)?;
        if self.edges[e].frozen || self.edges[e].flow >= self.edges[e].cap {
            return Ok(None);
        }
        let (ua, va) = self.edges[e].ends;
        self.add_edge_flow(txn, e, 1);
        self.forbid_raw(txn, e);
        // both endpoints go into deficit before either is resolved, so one
        // endpoint's search cannot consume the slot the other needs
        for v in [ua, va] {
            self.add_st_flow(txn, v, -1);
        }

        let mut reports = Vec::with_capacity(2);
        for v in [ua, va] {
            let atom = match self.verts[v].kind {
                VertexKind::Atom(a) => a,
                VertexKind::Super(_) => unreachable!("seed endpoints are atoms"),
            };
            if self.verts[v].st.flow >= 0 {
                // the endpoint's own free slot covers the promotion
                reports.push(ProbeReport::from_terminal(atom, Terminal::Radical(atom)));
                continue;
            }
            match self.find_alternating(v, Dir::Lower) {
                Some((path, term)) => {
                    self.apply_path(txn, &path);
                    self.add_st_flow(txn, v, 1);
                    match term {
                        Terminal::Radical(a) => self.add_st_flow(txn, a.index(), -1),
                        Terminal::MobileH { .. } | Terminal::Charge { .. } => {
                            let sv = self.super_of(term);
                            self.add_st_flow(txn, sv, 1);
                        }
                    }
                    reports.push(ProbeReport::from_terminal(atom, term));
                }
                None => return Ok(None),
            }
        }
        let second = reports.pop().expect("two endpoint reports");
        let first = reports.pop().expect("two endpoint reports");
        Ok(Some((first, second)))
    }

    fn super_of(&self, term: Terminal) -> usize {
        let member = term.atom().index();
        let want = match term {
            Terminal::MobileH { .. } => GroupKind::MobileH,
            Terminal::Charge { .. } => GroupKind::Charge,
            Terminal::Radical(_) => unreachable!("radical terminals have no super"),
        };
        for &e in &self.adj[member] {
            let edge = &self.edges[e];
            let other = if edge.ends.0 == member {
                edge.ends.1
            } else {
                edge.ends.0
            };
            if let VertexKind::Super(kind) = self.verts[other].kind {
                if kind == want {
                    return other;
                }
            }
        }
        unreachable!("terminal produced by a member edge")
    }

    /// Full rebalance: repeatedly pair up free valence slots through
    /// alternating paths, honoring the current forbidden mask. Returns the
    /// number of augmentations performed.
    pub fn rebalance(&mut self) -> usize {
        let mut runs = 0;
        let mut txn = Txn::new();
        let mut stale = vec![false; self.verts.len()];
        loop {
            let Some(start) = self
                .verts
                .iter()
                .enumerate()
                .position(|(i, v)| {
                    !stale[i] && v.st.flow > 0 && matches!(v.kind, VertexKind::Atom(_))
                })
            else {
                break;
            };
            match self.find_alternating(start, Dir::Raise) {
                Some((path, term)) => {
                    self.apply_path(&mut txn, &path);
                    self.add_st_flow(&mut txn, start, -1);
                    match term {
                        Terminal::Radical(a) => self.add_st_flow(&mut txn, a.index(), -1),
                        other => {
                            let sv = self.super_of(other);
                            self.add_st_flow(&mut txn, sv, 1);
                        }
                    }
                    runs += 1;
                }
                None => stale[start] = true,
            }
        }
        // permanent: the recorded patch is committed by dropping it
        drop(txn);
        runs
    }

    /// Write the network's bond flows back into the molecule. Frozen
    /// (aromatic) edges are skipped.
    pub fn write_back(&self, mol: &mut MolGraph) {
        for edge in &self.edges {
            let Some(bond) = edge.bond else { continue };
            if edge.frozen {
                continue;
            }
            let order = match edge.flow {
                0 => BondOrder::Single,
                1 => BondOrder::Double,
                _ => BondOrder::Triple,
            };
            mol.bond_mut(bond).order = order;
        }
    }

    /// Flow-conservation check used by tests: every atom vertex's incident
    /// flow plus st flow must match its value at build time.
    pub fn is_balanced_against(&self, other: &BondNetwork) -> bool {
        if self.verts.len() != other.verts.len() || self.edges.len() != other.edges.len() {
            return false;
        }
        let sum = |net: &BondNetwork, v: usize| -> i32 {
            net.adj[v].iter().map(|&e| net.edges[e].flow).sum::<i32>() + net.verts[v].st.flow
        };
        (0..self.verts.len()).all(|v| sum(self, v) == sum(other, v))
    }
}
