//! Ion-pair normalization.
//!
//! A fixed-priority catalog of 18 local rewrite rules collapses equivalent
//! ionic/mesomeric charge placements into one canonical form. Rules 1–6
//! match terminal ion pairs, 7–12 the same motifs between interior atoms,
//! 13–18 relocate a charge across a three-atom chain toward a preferred
//! atom. Every rewrite conserves the match's total charge and total
//! valence; the pass loops to a fixed point under a global candidate
//! budget, because one rewrite can make a previously-ineligible atom
//! eligible.

use petgraph::graph::NodeIndex;
use tracing::{debug, trace};

use crate::bond::BondOrder;
use crate::element::Element;
use crate::mol::MolGraph;

/// Element classes the rule patterns select on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Carbon,
    Pnictogen,
    Chalcogen,
    Halogen,
    CarbonOrPnictogen,
    /// Any group-15/16 heteroatom.
    Heteroatom,
}

impl Class {
    fn contains(self, el: Element) -> bool {
        match self {
            Class::Carbon => el == Element::C,
            Class::Pnictogen => el.is_pnictogen(),
            Class::Chalcogen => el.is_chalcogen(),
            Class::Halogen => el.is_halogen(),
            Class::CarbonOrPnictogen => el == Element::C || el.is_pnictogen(),
            Class::Heteroatom => el.is_pnictogen() || el.is_chalcogen(),
        }
    }
}

/// The rule catalog, in application priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IonPairRule {
    /// 1: `N⁺(–O⁻)` and congeners → `N=O`, both neutral (nitro form).
    TerminalPnictogenOxide,
    /// 2: `S⁺(–O⁻)` and congeners → `S=O`.
    TerminalChalconiumOxide,
    /// 3: `C⁺(–O⁻)` → `C=O` (acylium alkoxide collapse).
    TerminalCarbeniumOxide,
    /// 4: `C⁺(=N⁻)` / `N⁺(=N⁻)` → triple bond (nitrilium collapse).
    TerminalNitrilium,
    /// 5: hypervalent halogen center: `I⁺(–O⁻)` → `I=O`.
    TerminalHalogenOxide,
    /// 6: `P⁺(–C⁻)` ylide → `P=C`.
    TerminalYlide,
    /// 7–12: the interior counterparts of 1–6.
    InnerPnictogenOxide,
    InnerChalconiumOxide,
    InnerCarbeniumOxide,
    InnerNitrilium,
    InnerAminimide,
    InnerYlide,
    /// 13–15: anion relocation `X=Y–Z⁻ → X⁻–Y=Z` toward the preferred atom.
    AnionShiftChalcogen,
    AnionShiftPnictogen,
    AnionShiftCarbon,
    /// 16–17: cation relocation `X–Y=Z⁺ → X⁺=Y–Z`.
    CationShiftChalcogen,
    CationShiftPnictogen,
    /// 18: anion relocation between unlike group-15/16 heteroatoms.
    AnionShiftHeteroatom,
}

pub const RULES: [IonPairRule; 18] = [
    IonPairRule::TerminalPnictogenOxide,
    IonPairRule::TerminalChalconiumOxide,
    IonPairRule::TerminalCarbeniumOxide,
    IonPairRule::TerminalNitrilium,
    IonPairRule::TerminalHalogenOxide,
    IonPairRule::TerminalYlide,
    IonPairRule::InnerPnictogenOxide,
    IonPairRule::InnerChalconiumOxide,
    IonPairRule::InnerCarbeniumOxide,
    IonPairRule::InnerNitrilium,
    IonPairRule::InnerAminimide,
    IonPairRule::InnerYlide,
    IonPairRule::AnionShiftChalcogen,
    IonPairRule::AnionShiftPnictogen,
    IonPairRule::AnionShiftCarbon,
    IonPairRule::CationShiftChalcogen,
    IonPairRule::CationShiftPnictogen,
    IonPairRule::AnionShiftHeteroatom,
];

/// Pair-collapse pattern: a +1 center bonded to a −1 partner; the rewrite
/// raises the bond order and neutralizes both.
struct PairPattern {
    center: Class,
    partner: Class,
    order: BondOrder,
    terminal: bool,
}

/// Charge-relocation pattern across `source – pivot – dest`; the rewrite
/// swaps the two bond orders and moves the charge to the preferred atom.
struct ShiftPattern {
    charge: i8,
    members: Class,
    /// require source and dest to be the same element (unlike rule 18)
    same_element: bool,
}

enum Pattern {
    Pair(PairPattern),
    Shift(ShiftPattern),
}

fn pattern(rule: IonPairRule) -> Pattern {
    use BondOrder::{Double, Single};
    use IonPairRule::*;
    match rule {
        TerminalPnictogenOxide => Pattern::Pair(PairPattern {
            center: Class::Pnictogen,
            partner: Class::Chalcogen,
            order: Single,
            terminal: true,
        }),
        TerminalChalconiumOxide => Pattern::Pair(PairPattern {
            center: Class::Chalcogen,
            partner: Class::Chalcogen,
            order: Single,
            terminal: true,
        }),
        TerminalCarbeniumOxide => Pattern::Pair(PairPattern {
            center: Class::Carbon,
            partner: Class::Chalcogen,
            order: Single,
            terminal: true,
        }),
        TerminalNitrilium => Pattern::Pair(PairPattern {
            center: Class::CarbonOrPnictogen,
            partner: Class::Pnictogen,
            order: Double,
            terminal: true,
        }),
        TerminalHalogenOxide => Pattern::Pair(PairPattern {
            center: Class::Halogen,
            partner: Class::Chalcogen,
            order: Single,
            terminal: true,
        }),
        TerminalYlide => Pattern::Pair(PairPattern {
            center: Class::Pnictogen,
            partner: Class::Carbon,
            order: Single,
            terminal: true,
        }),
        InnerPnictogenOxide => Pattern::Pair(PairPattern {
            center: Class::Pnictogen,
            partner: Class::Chalcogen,
            order: Single,
            terminal: false,
        }),
        InnerChalconiumOxide => Pattern::Pair(PairPattern {
            center: Class::Chalcogen,
            partner: Class::Chalcogen,
            order: Single,
            terminal: false,
        }),
        InnerCarbeniumOxide => Pattern::Pair(PairPattern {
            center: Class::Carbon,
            partner: Class::Chalcogen,
            order: Single,
            terminal: false,
        }),
        InnerNitrilium => Pattern::Pair(PairPattern {
            center: Class::CarbonOrPnictogen,
            partner: Class::Pnictogen,
            order: Double,
            terminal: false,
        }),
        InnerAminimide => Pattern::Pair(PairPattern {
            center: Class::Pnictogen,
            partner: Class::Pnictogen,
            order: Single,
            terminal: false,
        }),
        InnerYlide => Pattern::Pair(PairPattern {
            center: Class::Pnictogen,
            partner: Class::Carbon,
            order: Single,
            terminal: false,
        }),
        AnionShiftChalcogen => Pattern::Shift(ShiftPattern {
            charge: -1,
            members: Class::Chalcogen,
            same_element: true,
        }),
        AnionShiftPnictogen => Pattern::Shift(ShiftPattern {
            charge: -1,
            members: Class::Pnictogen,
            same_element: true,
        }),
        AnionShiftCarbon => Pattern::Shift(ShiftPattern {
            charge: -1,
            members: Class::Carbon,
            same_element: true,
        }),
        CationShiftChalcogen => Pattern::Shift(ShiftPattern {
            charge: 1,
            members: Class::Chalcogen,
            same_element: true,
        }),
        CationShiftPnictogen => Pattern::Shift(ShiftPattern {
            charge: 1,
            members: Class::Pnictogen,
            same_element: true,
        }),
        AnionShiftHeteroatom => Pattern::Shift(ShiftPattern {
            charge: -1,
            members: Class::Heteroatom,
            same_element: false,
        }),
    }
}

/// Bond orders, hydrogens, and radical slots an atom currently accounts for.
fn totals(mol: &MolGraph, idx: NodeIndex) -> u8 {
    mol.bond_order_sum(idx) + mol.atom(idx).total_h() + mol.atom(idx).radical.slots()
}

/// Candidate ordering: lower atomic number wins, then lighter isotope, then
/// scan order. The index fallback keeps the choice deterministic when the
/// chemical keys tie.
fn candidate_key(mol: &MolGraph, idx: NodeIndex) -> (u8, u16, usize) {
    let atom = mol.atom(idx);
    (
        atom.element.atomic_num(),
        atom.effective_mass(),
        idx.index(),
    )
}

/// Relocation preference: atomic number and isotope only. Scan order picks
/// among equally-preferred candidates but never justifies a relocation on
/// its own, so chemically symmetric placements stay put.
fn shift_key(mol: &MolGraph, idx: NodeIndex) -> (u8, u16) {
    let atom = mol.atom(idx);
    (atom.element.atomic_num(), atom.effective_mass())
}

fn apply_pair(mol: &mut MolGraph, rule: IonPairRule, pat: &PairPattern, budget: &mut u32) -> usize {
    let mut changes = 0;
    let n = mol.atom_count();
    for ci in 0..n {
        if *budget == 0 {
            break;
        }
        let center = NodeIndex::new(ci);
        let c = mol.atom(center);
        if c.charge != 1 || !c.rule_eligible() || !pat.center.contains(c.element) {
            continue;
        }
        // all structurally valid partners, best candidate first
        let mut partners: Vec<NodeIndex> = mol
            .neighbors(center)
            .filter(|&p| {
                let a = mol.atom(p);
                let edge = mol.bond_between(center, p).expect("neighbor");
                a.charge == -1
                    && a.rule_eligible()
                    && pat.partner.contains(a.element)
                    && mol.bond(edge).order == pat.order
                    && (mol.degree(p) == 1) == pat.terminal
            })
            .collect();
        partners.sort_by_key(|&p| candidate_key(mol, p));

        for partner in partners {
            let raised = pat.order.raised().expect("single or double pattern");
            let center_ok = mol
                .atom(center)
                .element
                .valence_allowed(0, totals(mol, center).saturating_add(1));
            let partner_ok = mol
                .atom(partner)
                .element
                .valence_allowed(0, totals(mol, partner).saturating_add(1));
            if !center_ok || !partner_ok {
                trace!(rule = ?rule, center = ci, "candidate rejected by valence check");
                continue;
            }
            let edge = mol.bond_between(center, partner).expect("neighbor");
            mol.bond_mut(edge).order = raised;
            mol.atom_mut(center).charge = 0;
            mol.atom_mut(partner).charge = 0;
            changes += 1;
            *budget = budget.saturating_sub(1);
            debug!(rule = ?rule, center = ci, partner = partner.index(), "collapsed ion pair");
            break; // center neutralized; later rules rescan
        }
    }
    changes
}

fn apply_shift(
    mol: &mut MolGraph,
    rule: IonPairRule,
    pat: &ShiftPattern,
    budget: &mut u32,
) -> usize {
    // bond orders on the (pivot, source) and (pivot, dest) sides
    let (src_order, dst_order) = if pat.charge < 0 {
        (BondOrder::Single, BondOrder::Double)
    } else {
        (BondOrder::Double, BondOrder::Single)
    };

    let mut changes = 0;
    let n = mol.atom_count();
    for pi in 0..n {
        if *budget == 0 {
            break;
        }
        let pivot = NodeIndex::new(pi);
        if !mol.atom(pivot).rule_eligible() {
            continue;
        }
        let sources: Vec<NodeIndex> = mol
            .neighbors(pivot)
            .filter(|&s| {
                let a = mol.atom(s);
                let edge = mol.bond_between(pivot, s).expect("neighbor");
                a.charge == pat.charge
                    && a.rule_eligible()
                    && pat.members.contains(a.element)
                    && mol.bond(edge).order == src_order
            })
            .collect();

        for source in sources {
            let src_el = mol.atom(source).element;
            let mut dests: Vec<NodeIndex> = mol
                .neighbors(pivot)
                .filter(|&d| {
                    let a = mol.atom(d);
                    let edge = mol.bond_between(pivot, d).expect("neighbor");
                    d != source
                        && a.charge == 0
                        && a.rule_eligible()
                        && pat.members.contains(a.element)
                        && (!pat.same_element || a.element == src_el)
                        && mol.bond(edge).order == dst_order
                })
                .collect();
            dests.sort_by_key(|&d| candidate_key(mol, d));

            // relocation only fires toward a strictly preferred destination,
            // which makes the pass idempotent
            let Some(&dest) = dests
                .first()
                .filter(|&&d| shift_key(mol, d) < shift_key(mol, source))
            else {
                continue;
            };

            let delta = pat.charge;
            let source_after =
                totals(mol, source).wrapping_add_signed(if delta < 0 { 1 } else { -1 });
            let source_ok = mol.atom(source).element.valence_allowed(0, source_after);
            let dest_after = totals(mol, dest).wrapping_add_signed(if delta < 0 { -1 } else { 1 });
            let dest_ok = mol.atom(dest).element.valence_allowed(delta, dest_after);
            if !source_ok || !dest_ok {
                trace!(rule = ?rule, pivot = pi, "shift rejected by valence check");
                continue;
            }

            let src_edge = mol.bond_between(pivot, source).expect("neighbor");
            let dst_edge = mol.bond_between(pivot, dest).expect("neighbor");
            if pat.charge < 0 {
                mol.bond_mut(src_edge).order = BondOrder::Double;
                mol.bond_mut(dst_edge).order = BondOrder::Single;
            } else {
                mol.bond_mut(src_edge).order = BondOrder::Single;
                mol.bond_mut(dst_edge).order = BondOrder::Double;
            }
            mol.atom_mut(source).charge = 0;
            mol.atom_mut(dest).charge = pat.charge;
            changes += 1;
            *budget = budget.saturating_sub(1);
            debug!(
                rule = ?rule,
                pivot = pi,
                source = source.index(),
                dest = dest.index(),
                "relocated charge"
            );
            break;
        }
    }
    changes
}

/// Rewrite locally-equivalent charge/bond-order motifs to canonical form.
/// Returns the number of rewrites applied; a second call on the output
/// returns zero.
pub fn normalize_ion_pairs(mol: &mut MolGraph) -> usize {
    let charged = mol.atoms().filter(|&a| mol.atom(a).charge != 0).count() as u32;
    let mut budget = charged * 2 + 2;
    let mut total = 0;
    loop {
        let mut changed = 0;
        for rule in RULES {
            changed += match pattern(rule) {
                Pattern::Pair(p) => apply_pair(mol, rule, &p, &mut budget),
                Pattern::Shift(p) => apply_shift(mol, rule, &p, &mut budget),
            };
        }
        total += changed;
        if changed == 0 || budget == 0 {
            break;
        }
    }
    total
}
