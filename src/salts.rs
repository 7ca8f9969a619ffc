//! Metal/coordination-bond and salt disconnection.
//!
//! Metal atoms in abnormal bonding states are cut loose from their ligands:
//! each severed bond becomes a formal positive charge increment on the metal
//! and a matching negative charge on the ligand. Metal–metal bonds go in a
//! second pass, so a bridging M–L–M motif disconnects its ligand bonds
//! first. Aromatic ligand bonds need multiplicity splitting: the ligand's
//! remaining aromatic system is re-assigned to alternating single/double
//! orders by the same augmenting-path matching the aromatic perception
//! uses, so the ring's total bond order stays consistent.

use std::collections::VecDeque;

use petgraph::graph::{EdgeIndex, NodeIndex};
use tracing::debug;

use crate::atom::Radical;
use crate::bond::{Bond, BondOrder};
use crate::element::Element;
use crate::error::{NormError, Result};
use crate::hydrogens::move_implicit_h;
use crate::mol::MolGraph;

/// A metal qualifies for disconnection when its bonding state has no ionic
/// reading: any covalent engagement at charge zero, a charge magnitude
/// above one, or a unit charge that is not a recognized bond-free
/// oxidation state.
pub fn is_disconnectable_metal(mol: &MolGraph, idx: NodeIndex) -> bool {
    let atom = mol.atom(idx);
    if !atom.element.is_metal() {
        return false;
    }
    let engaged = usize::from(mol.bond_order_sum(idx)) + usize::from(atom.total_h());
    if atom.charge == 0 {
        return engaged > 0;
    }
    if atom.charge.unsigned_abs() > 1 {
        return true;
    }
    let recognized = atom.element.oxidation_states().contains(&atom.charge);
    !(recognized && engaged == 0)
}

/// Sever every qualifying metal's bonds. Returns the number of bonds cut.
pub fn disconnect_metal_salts(mol: &mut MolGraph) -> Result<usize> {
    let metals: Vec<NodeIndex> = mol
        .atoms()
        .filter(|&a| is_disconnectable_metal(mol, a))
        .collect();
    let mut severed = 0;

    // ligand bonds first
    for &m in &metals {
        let ligands: Vec<NodeIndex> = mol
            .neighbors(m)
            .filter(|&l| !mol.atom(l).element.is_metal())
            .collect();
        for l in ligands {
            sever_ligand_bond(mol, m, l)?;
            severed += 1;
        }
    }

    // then metal–metal bonds, with no charge transfer
    for &m in &metals {
        let partners: Vec<NodeIndex> = mol
            .neighbors(m)
            .filter(|&p| mol.atom(p).element.is_metal())
            .collect();
        for p in partners {
            if mol.bond_between(m, p).is_some() {
                mol.remove_bond_between(m, p)?;
                severed += 1;
            }
        }
    }

    if severed > 0 {
        debug!(severed, metals = metals.len(), "disconnected metal salts");
    }
    Ok(severed)
}

fn shift_charge(mol: &mut MolGraph, idx: NodeIndex, delta: i8) {
    let atom = mol.atom_mut(idx);
    atom.charge = atom.charge.saturating_add(delta);
}

fn sever_ligand_bond(mol: &mut MolGraph, metal: NodeIndex, ligand: NodeIndex) -> Result<()> {
    let edge = mol.bond_between(metal, ligand).ok_or_else(|| {
        NormError::inconsistent(format!(
            "metal {} and ligand {} not adjacent",
            metal.index(),
            ligand.index()
        ))
    })?;
    let order = mol.bond(edge).order;
    mol.remove_bond_between(metal, ligand)?;
    match order.as_int() {
        Some(k) => {
            shift_charge(mol, metal, k as i8);
            shift_charge(mol, ligand, -(k as i8));
        }
        None => {
            // aromatic: one unit of charge transfer, then re-assign the
            // ligand's remaining aromatic system
            shift_charge(mol, metal, 1);
            shift_charge(mol, ligand, -1);
            split_aromatic_system(mol, ligand)?;
        }
    }
    Ok(())
}

/// Re-assign an aromatic system to alternating single/double bonds after a
/// member lost its metal bond. Augmenting-path matching over the aromatic
/// edges; every atom whose valence gap demands a double bond must receive
/// exactly one.
fn split_aromatic_system(mol: &mut MolGraph, seed: NodeIndex) -> Result<()> {
    // collect the aromatic component around the seed
    let mut members: Vec<NodeIndex> = Vec::new();
    let mut seen = vec![false; mol.atom_count()];
    let mut stack = vec![seed];
    seen[seed.index()] = true;
    while let Some(v) = stack.pop() {
        members.push(v);
        for e in mol.bonds_of(v).collect::<Vec<_>>() {
            if mol.bond(e).order != BondOrder::Aromatic {
                continue;
            }
            let w = mol.other_endpoint(e, v).expect("incident edge");
            if !seen[w.index()] {
                seen[w.index()] = true;
                stack.push(w);
            }
        }
    }
    let aromatic_edges: Vec<EdgeIndex> = {
        let mut out = Vec::new();
        for &v in &members {
            for e in mol.bonds_of(v) {
                if mol.bond(e).order == BondOrder::Aromatic && !out.contains(&e) {
                    out.push(e);
                }
            }
        }
        out
    };
    if aromatic_edges.is_empty() {
        return Ok(());
    }

    // which members still need a double bond once aromatic counts as single
    let mut needs_double = vec![false; mol.atom_count()];
    for &v in &members {
        let atom = mol.atom(v);
        let mut used = u16::from(atom.total_h()) + u16::from(atom.radical.slots());
        for e in mol.bonds_of(v) {
            used += match mol.bond(e).order {
                BondOrder::Aromatic => 1,
                other => u16::from(other.as_int().expect("non-aromatic")),
            };
        }
        let gap_one = atom.element.default_valences().iter().any(|&base| {
            let target = i32::from(base)
                + match atom.element {
                    Element::C => -i32::from(atom.charge.abs()),
                    _ => i32::from(atom.charge),
                };
            target == i32::from(used) + 1
        });
        needs_double[v.index()] = gap_one;
    }

    // matching: candidates needing a double bond paired along aromatic edges
    let mut matched: Vec<Option<EdgeIndex>> = vec![None; mol.atom_count()];
    for &v in &members {
        if !needs_double[v.index()] || matched[v.index()].is_some() {
            continue;
        }
        if !augment_match(mol, &aromatic_edges, &needs_double, &mut matched, v) {
            return Err(NormError::inconsistent(format!(
                "aromatic system at atom {} cannot be split after disconnection",
                v.index()
            )));
        }
    }

    for e in aromatic_edges {
        let (a, b) = mol.bond_endpoints(e).expect("live edge");
        let is_matched = matched[a.index()] == Some(e) && matched[b.index()] == Some(e);
        mol.bond_mut(e).order = if is_matched {
            BondOrder::Double
        } else {
            BondOrder::Single
        };
    }
    Ok(())
}

fn augment_match(
    mol: &MolGraph,
    aromatic_edges: &[EdgeIndex],
    needs_double: &[bool],
    matched: &mut [Option<EdgeIndex>],
    start: NodeIndex,
) -> bool {
    let n = mol.atom_count();
    let mut prev: Vec<Option<(NodeIndex, EdgeIndex)>> = vec![None; n];
    let mut visited = vec![false; n];
    let mut queue = VecDeque::new();
    visited[start.index()] = true;
    queue.push_back(start);

    while let Some(u) = queue.pop_front() {
        for &e in aromatic_edges {
            let Some((a, b)) = mol.bond_endpoints(e) else {
                continue;
            };
            let v = if a == u {
                b
            } else if b == u {
                a
            } else {
                continue;
            };
            if !needs_double[v.index()] || visited[v.index()] || Some(e) == matched[u.index()] {
                continue;
            }
            visited[v.index()] = true;
            prev[v.index()] = Some((u, e));

            if matched[v.index()].is_none() {
                // flip alternate edges along the path
                let mut cur = v;
                let mut take = true;
                while let Some((p, pe)) = prev[cur.index()] {
                    if take {
                        matched[cur.index()] = Some(pe);
                        matched[p.index()] = Some(pe);
                    }
                    take = !take;
                    cur = p;
                }
                return true;
            }
            let me = matched[v.index()].expect("checked above");
            let (ma, mb) = mol.bond_endpoints(me).expect("live edge");
            let w = if ma == v { mb } else { ma };
            if !visited[w.index()] {
                visited[w.index()] = true;
                prev[w.index()] = Some((v, me));
                queue.push_back(w);
            }
        }
    }
    false
}

/// The ammonium/monatomic-anion special case: a σ-pentavalent neutral
/// nitrogen singly bonded to a terminal electronegative atom. The bond is
/// severed and one hydrogen relocates from the cation side to the newly
/// anionic atom; with no hydrogen available the fragments stay
/// charge-separated. Returns the number of salts disconnected.
pub fn disconnect_ammonium_salts(mol: &mut MolGraph) -> Result<usize> {
    let candidates: Vec<NodeIndex> = mol
        .atoms()
        .filter(|&a| {
            let atom = mol.atom(a);
            atom.element == Element::N
                && atom.charge == 0
                && atom.radical == Radical::None
                && mol.sigma_valence(a) == 5
                && mol
                    .bonds_of(a)
                    .all(|e| mol.bond(e).order == BondOrder::Single)
        })
        .collect();

    let mut count = 0;
    for n in candidates {
        let Some(x) = mol
            .neighbors(n)
            .filter(|&x| {
                let atom = mol.atom(x);
                mol.degree(x) == 1
                    && atom.charge == 0
                    && !atom.is_hydrogen()
                    && atom.element.is_electronegative()
            })
            .min_by_key(|&x| x.index())
        else {
            continue;
        };

        mol.remove_bond_between(n, x)?;
        count += 1;

        let explicit_hs: Vec<NodeIndex> = mol
            .neighbors(n)
            .filter(|&h| mol.atom(h).is_hydrogen() && mol.degree(h) == 1)
            .collect();
        if !explicit_hs.is_empty() {
            let h = pick_hydrogen(mol, &explicit_hs, x);
            mol.remove_bond_between(n, h)?;
            mol.add_bond(h, x, Bond::default())?;
        } else if mol.atom(n).total_h() > 0 {
            move_implicit_h(mol, n, x)?;
        } else {
            shift_charge(mol, n, 1);
            shift_charge(mol, x, -1);
        }
        debug!(n = n.index(), x = x.index(), "disconnected ammonium salt");
    }
    Ok(count)
}

/// Choose which explicit hydrogen to relocate: the geometrically closest to
/// the destination when 3-D coordinates are available, else a non-isotopic
/// hydrogen, else the lightest isotope present.
fn pick_hydrogen(mol: &MolGraph, hs: &[NodeIndex], dest: NodeIndex) -> NodeIndex {
    if let Some(dc) = mol.atom(dest).coords {
        if hs.iter().all(|&h| mol.atom(h).coords.is_some()) {
            let dist2 = |h: NodeIndex| -> f64 {
                let hc = mol.atom(h).coords.expect("checked above");
                (0..3).map(|i| (hc[i] - dc[i]).powi(2)).sum()
            };
            return *hs
                .iter()
                .min_by(|&&a, &&b| {
                    dist2(a)
                        .partial_cmp(&dist2(b))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .expect("non-empty candidate list");
        }
    }
    *hs.iter()
        .min_by_key(|&&h| (mol.atom(h).effective_mass(), h.index()))
        .expect("non-empty candidate list")
}
