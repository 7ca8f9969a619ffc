use petgraph::graph::NodeIndex;
use thiserror::Error;

pub type Result<T, E = NormError> = std::result::Result<T, E>;

/// Crate-wide error taxonomy.
///
/// "No applicable rule" is deliberately absent: normalization and repair
/// entry points report zero changes instead, so passes can be retried to a
/// fixed point. Allocation failure aborts the process under this crate's
/// owned-`Vec` storage model and has no recoverable representation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormError {
    /// An expected edge/atom relationship is absent. Programmer-error class:
    /// aborts the enclosing normalization pass or repair attempt.
    #[error("graph consistency violation: {detail}")]
    GraphInconsistency { detail: String },

    /// A fixed-size per-atom slot (neighbor list, stereo neighbors, hydrogen
    /// counts) would overflow. The specific operation is refused; siblings
    /// already processed stand.
    #[error("atom {atom:?} would exceed its fixed capacity of {limit}")]
    CapacityExceeded { atom: NodeIndex, limit: usize },
}

impl NormError {
    pub(crate) fn inconsistent(detail: impl Into<String>) -> Self {
        NormError::GraphInconsistency {
            detail: detail.into(),
        }
    }
}
