//! Hydrogen normalization.
//!
//! Explicit hydrogen atoms are folded into isotope-split implicit counts on
//! their heavy neighbor, and the degenerate all-hydrogen two-atom molecule
//! is collapsed onto its heavier isotope. Hydrogens referenced by a stereo
//! descriptor are kept as graph atoms — they carry parity slots.

use petgraph::graph::NodeIndex;
use tracing::debug;

use crate::bond::BondOrder;
use crate::error::{NormError, Result};
use crate::mol::{MolGraph, StereoRef};

/// Implicit-count slot for a hydrogen isotope: `None` routes to `num_h`,
/// `Some(i)` to `num_iso_h[i]`.
fn iso_slot(isotope: u16) -> Option<usize> {
    match isotope {
        0 => None,
        1 => Some(0),
        2 => Some(1),
        _ => Some(2),
    }
}

fn bump_h(mol: &mut MolGraph, heavy: NodeIndex, isotope: u16) -> Result<()> {
    let atom = mol.atom_mut(heavy);
    let slot = match iso_slot(isotope) {
        None => &mut atom.num_h,
        Some(i) => &mut atom.num_iso_h[i],
    };
    *slot = slot.checked_add(1).ok_or(NormError::CapacityExceeded {
        atom: heavy,
        limit: u8::MAX as usize,
    })?;
    Ok(())
}

/// Move one implicit hydrogen between atoms, non-isotopic first, else the
/// lightest isotope present. The source must hold at least one.
pub(crate) fn move_implicit_h(mol: &mut MolGraph, from: NodeIndex, to: NodeIndex) -> Result<()> {
    let slot = {
        let a = mol.atom(from);
        if a.num_h > 0 {
            None
        } else if a.num_iso_h[0] > 0 {
            Some(0)
        } else if a.num_iso_h[1] > 0 {
            Some(1)
        } else {
            Some(2)
        }
    };
    {
        let a = mol.atom_mut(from);
        match slot {
            None => a.num_h -= 1,
            Some(i) => a.num_iso_h[i] -= 1,
        }
    }
    let b = mol.atom_mut(to);
    let target = match slot {
        None => &mut b.num_h,
        Some(i) => &mut b.num_iso_h[i],
    };
    *target = target.checked_add(1).ok_or(NormError::CapacityExceeded {
        atom: to,
        limit: u8::MAX as usize,
    })?;
    Ok(())
}

fn stereo_referenced(mol: &MolGraph) -> Vec<bool> {
    let mut referenced = vec![false; mol.atom_count()];
    let mut mark = |r: &StereoRef| {
        if let StereoRef::Atom(idx) = r {
            if idx.index() < referenced.len() {
                referenced[idx.index()] = true;
            }
        }
    };
    for s in mol.stereo_centers() {
        for r in &s.neighbors {
            mark(r);
        }
    }
    for s in mol.stereo_bonds() {
        for r in &s.refs {
            mark(r);
        }
    }
    referenced
}

/// Fold removable explicit hydrogens into implicit counts on their heavy
/// neighbor. Removable: element H, charge 0, no radical, exactly one single
/// bond to a non-hydrogen atom, and not referenced by any stereo descriptor.
/// Returns the number folded.
pub fn fold_explicit_hydrogens(mol: &mut MolGraph) -> Result<usize> {
    let referenced = stereo_referenced(mol);
    let mut fold: Vec<(NodeIndex, NodeIndex)> = Vec::new();
    for idx in mol.atoms() {
        let atom = mol.atom(idx);
        if !atom.is_hydrogen()
            || atom.charge != 0
            || atom.radical != crate::atom::Radical::None
            || atom.total_h() != 0
            || referenced[idx.index()]
        {
            continue;
        }
        let mut bonds = mol.bonds_of(idx);
        let (Some(edge), None) = (bonds.next(), bonds.next()) else {
            continue;
        };
        if mol.bond(edge).order != BondOrder::Single {
            continue;
        }
        let heavy = mol.other_endpoint(edge, idx).expect("incident edge");
        if mol.atom(heavy).is_hydrogen() {
            continue;
        }
        fold.push((idx, heavy));
    }

    for &(h, heavy) in &fold {
        let isotope = mol.atom(h).isotope;
        bump_h(mol, heavy, isotope)?;
    }
    if !fold.is_empty() {
        let drop: Vec<bool> = {
            let mut d = vec![false; mol.atom_count()];
            for &(h, _) in &fold {
                d[h.index()] = true;
            }
            d
        };
        mol.retain_atoms(|_, i| !drop[i.index()]);
        debug!(folded = fold.len(), "folded explicit hydrogens");
    }
    Ok(fold.len())
}

/// Collapse two-atom all-hydrogen molecules (H–H, H–D, D–T …) onto the
/// heavier isotope: the lighter atom becomes an implicit count on the
/// retained one and any charge moves onto it. Returns the number of
/// molecules collapsed.
pub fn normalize_hydrogen_molecules(mol: &mut MolGraph) -> Result<usize> {
    let mut collapse: Vec<(NodeIndex, NodeIndex)> = Vec::new();
    for idx in mol.atoms() {
        let atom = mol.atom(idx);
        if !atom.is_hydrogen() || mol.degree(idx) != 1 {
            continue;
        }
        let edge = mol.bonds_of(idx).next().expect("degree checked");
        let other = mol.other_endpoint(edge, idx).expect("incident edge");
        if !mol.atom(other).is_hydrogen()
            || mol.degree(other) != 1
            || mol.bond(edge).order != BondOrder::Single
        {
            continue;
        }
        // visit each pair once, orienting (kept, folded): heavier isotope
        // retained, ties broken toward the lower index
        let (a, b) = (idx, other);
        if a.index() > b.index() {
            continue;
        }
        let (ma, mb) = (mol.atom(a).effective_mass(), mol.atom(b).effective_mass());
        let (kept, folded) = if mb > ma { (b, a) } else { (a, b) };
        collapse.push((kept, folded));
    }

    for &(kept, folded) in &collapse {
        let isotope = mol.atom(folded).isotope;
        let charge = mol.atom(folded).charge;
        mol.remove_bond_between(kept, folded)?;
        bump_h(mol, kept, isotope)?;
        let kept_atom = mol.atom_mut(kept);
        kept_atom.charge = kept_atom.charge.saturating_add(charge);
    }
    if !collapse.is_empty() {
        let drop: Vec<bool> = {
            let mut d = vec![false; mol.atom_count()];
            for &(_, folded) in &collapse {
                d[folded.index()] = true;
            }
            d
        };
        mol.retain_atoms(|_, i| !drop[i.index()]);
        debug!(collapsed = collapse.len(), "collapsed hydrogen molecules");
    }
    Ok(collapse.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::Atom;
    use crate::bond::Bond;
    use crate::element::Element;
    use crate::mol::{Parity, StereoCenter};

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    #[test]
    fn folds_plain_hydrogens() {
        let mut mol = MolGraph::new();
        let c = mol.add_atom(Atom::new(Element::C));
        for _ in 0..4 {
            let h = mol.add_atom(Atom::new(Element::H));
            mol.add_bond(c, h, Bond::default()).unwrap();
        }
        let folded = fold_explicit_hydrogens(&mut mol).unwrap();
        assert_eq!(folded, 4);
        assert_eq!(mol.atom_count(), 1);
        assert_eq!(mol.atom(n(0)).num_h, 4);
    }

    #[test]
    fn folds_isotopes_into_split_counts() {
        let mut mol = MolGraph::new();
        let c = mol.add_atom(Atom::new(Element::C));
        let d = mol.add_atom(Atom {
            isotope: 2,
            ..Atom::new(Element::H)
        });
        let t = mol.add_atom(Atom {
            isotope: 3,
            ..Atom::new(Element::H)
        });
        mol.add_bond(c, d, Bond::default()).unwrap();
        mol.add_bond(c, t, Bond::default()).unwrap();
        fold_explicit_hydrogens(&mut mol).unwrap();
        assert_eq!(mol.atom_count(), 1);
        assert_eq!(mol.atom(n(0)).num_h, 0);
        assert_eq!(mol.atom(n(0)).num_iso_h, [0, 1, 1]);
    }

    #[test]
    fn charged_or_bridging_hydrogens_stay() {
        let mut mol = MolGraph::new();
        let c = mol.add_atom(Atom::new(Element::C));
        let h_minus = mol.add_atom(Atom {
            charge: -1,
            ..Atom::new(Element::H)
        });
        mol.add_bond(c, h_minus, Bond::default()).unwrap();
        assert_eq!(fold_explicit_hydrogens(&mut mol).unwrap(), 0);
        assert_eq!(mol.atom_count(), 2);
    }

    #[test]
    fn stereo_referenced_hydrogen_stays() {
        let mut mol = MolGraph::new();
        let c = mol.add_atom(Atom::new(Element::C));
        let h = mol.add_atom(Atom::new(Element::H));
        let f = mol.add_atom(Atom::new(Element::F));
        let cl = mol.add_atom(Atom::new(Element::Cl));
        let br = mol.add_atom(Atom::new(Element::Br));
        for x in [h, f, cl, br] {
            mol.add_bond(c, x, Bond::default()).unwrap();
        }
        mol.add_stereo_center(StereoCenter {
            center: c,
            neighbors: [
                StereoRef::Atom(h),
                StereoRef::Atom(f),
                StereoRef::Atom(cl),
                StereoRef::Atom(br),
            ],
            parity: Parity::Even,
        });
        assert_eq!(fold_explicit_hydrogens(&mut mol).unwrap(), 0);
        assert_eq!(mol.atom_count(), 5);
    }

    #[test]
    fn hd_molecule_keeps_deuterium() {
        let mut mol = MolGraph::new();
        let h = mol.add_atom(Atom::new(Element::H));
        let d = mol.add_atom(Atom {
            isotope: 2,
            ..Atom::new(Element::H)
        });
        mol.add_bond(h, d, Bond::default()).unwrap();
        let collapsed = normalize_hydrogen_molecules(&mut mol).unwrap();
        assert_eq!(collapsed, 1);
        assert_eq!(mol.atom_count(), 1);
        let kept = mol.atom(n(0));
        assert_eq!(kept.isotope, 2);
        assert_eq!(kept.num_h, 1);
        assert_eq!(kept.total_h(), 1);
    }

    #[test]
    fn hd_charge_moves_to_retained_atom() {
        let mut mol = MolGraph::new();
        let h = mol.add_atom(Atom {
            charge: 1,
            ..Atom::new(Element::H)
        });
        let d = mol.add_atom(Atom {
            isotope: 2,
            ..Atom::new(Element::H)
        });
        mol.add_bond(h, d, Bond::default()).unwrap();
        normalize_hydrogen_molecules(&mut mol).unwrap();
        assert_eq!(mol.atom(n(0)).isotope, 2);
        assert_eq!(mol.atom(n(0)).charge, 1);
    }

    #[test]
    fn plain_h2_collapses_to_one_center() {
        let mut mol = MolGraph::new();
        let a = mol.add_atom(Atom::new(Element::H));
        let b = mol.add_atom(Atom::new(Element::H));
        mol.add_bond(a, b, Bond::default()).unwrap();
        assert_eq!(normalize_hydrogen_molecules(&mut mol).unwrap(), 1);
        assert_eq!(mol.atom_count(), 1);
        assert_eq!(mol.atom(n(0)).num_h, 1);
    }

    #[test]
    fn bonded_heavy_hydrogen_not_a_molecule() {
        let mut mol = MolGraph::new();
        let c = mol.add_atom(Atom::new(Element::C));
        let h = mol.add_atom(Atom::new(Element::H));
        mol.add_bond(c, h, Bond::default()).unwrap();
        assert_eq!(normalize_hydrogen_molecules(&mut mol).unwrap(), 0);
    }
}
