//! The full structural pre-normalization pass.
//!
//! Hydrogen folding, ion-pair normalization, and salt disconnection run in
//! sequence, then components are relabeled and reconciled against the
//! labeling that preceded the disconnections so fragment identity can be
//! tracked through the edits.

use tracing::debug;

use crate::charges::normalize_ion_pairs;
use crate::components::{label_components, reconcile_components};
use crate::error::Result;
use crate::hydrogens::{fold_explicit_hydrogens, normalize_hydrogen_molecules};
use crate::mol::MolGraph;
use crate::salts::{disconnect_ammonium_salts, disconnect_metal_salts};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeSummary {
    pub hydrogens_folded: usize,
    pub hydrogen_molecules: usize,
    pub ion_pair_rewrites: usize,
    pub ammonium_salts: usize,
    pub metal_bonds_severed: usize,
    pub num_components: usize,
    /// current component id → component id before disconnection (0 where
    /// provenance was lost to a merge or split)
    pub component_map: Vec<u32>,
}

impl NormalizeSummary {
    pub fn changed(&self) -> bool {
        self.hydrogens_folded
            + self.hydrogen_molecules
            + self.ion_pair_rewrites
            + self.ammonium_salts
            + self.metal_bonds_severed
            > 0
    }
}

/// Normalize the structure in place. Each stage commits only pre-validated
/// edits, so an error from a later stage leaves the earlier stages' work
/// intact and the failing stage's candidate untouched.
pub fn normalize(mol: &mut MolGraph) -> Result<NormalizeSummary> {
    let hydrogens_folded = fold_explicit_hydrogens(mol)?;
    let hydrogen_molecules = normalize_hydrogen_molecules(mol)?;

    label_components(mol);
    let prev: Vec<u32> = mol.atoms().map(|a| mol.atom(a).component).collect();

    let ion_pair_rewrites = normalize_ion_pairs(mol);
    let ammonium_salts = disconnect_ammonium_salts(mol)?;
    let metal_bonds_severed = disconnect_metal_salts(mol)?;

    let num_components = label_components(mol);
    let component_map = reconcile_components(mol, &prev);

    let summary = NormalizeSummary {
        hydrogens_folded,
        hydrogen_molecules,
        ion_pair_rewrites,
        ammonium_salts,
        metal_bonds_severed,
        num_components,
        component_map,
    };
    debug!(?summary, "normalization pass complete");
    Ok(summary)
}
