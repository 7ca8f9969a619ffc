//! Normalization-and-repair core for canonical molecular structure
//! identifiers.
//!
//! The crate takes an in-memory molecular graph and collapses chemically
//! equivalent input renditions — mesomeric charge placements, coordination
//! and salt bonds, explicit-hydrogen variants — into one standard form, and
//! during round-trip validation repairs small stereochemistry/charge
//! discrepancies against a reference by probing alternate valence
//! assignments on a flow-network view of the bonding graph.
//!
//! The canonical-ranking stage that turns a normalized graph into an
//! identifier string is a consumer of this crate, not part of it.

pub mod atom;
pub mod bns;
pub mod bond;
pub mod charges;
pub mod components;
pub mod element;
pub mod error;
pub mod hydrogens;
pub mod mol;
pub mod normalize;
pub mod repair;
pub mod salts;
pub mod subgraph;

pub use atom::{Atom, Radical};
pub use bns::{BondNetwork, GroupKind, ProbeReport, Terminal, Txn};
pub use bond::{Bond, BondOrder};
pub use charges::{normalize_ion_pairs, IonPairRule, RULES};
pub use components::{label_components, no_component, reconcile_components};
pub use element::Element;
pub use error::{NormError, Result};
pub use hydrogens::{fold_explicit_hydrogens, normalize_hydrogen_molecules};
pub use mol::{MolGraph, Parity, StereoBond, StereoCenter, StereoRef, MAX_NEIGHBORS};
pub use normalize::{normalize, NormalizeSummary};
pub use repair::{
    Comparison, Diff, DiffKind, Layer, RepairCase, RepairEngine, RepairOutcome, RepairStatus,
    StructureComparator, REPAIR_CASES,
};
pub use salts::{disconnect_ammonium_salts, disconnect_metal_salts, is_disconnectable_metal};
pub use subgraph::{PathUnion, Subgraph};
