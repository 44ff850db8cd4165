//! Error taxonomy for the CSG orchestration layer.
//!
//! All of these are recoverable: the orchestrator catches every variant
//! and answers with the documented fallback policy instead of letting an
//! error cross the crate boundary.

use thiserror::Error;

/// Reasons a boolean attempt can fail internally.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CsgError {
    /// An operand was missing or had no faces at all.
    #[error("operand is empty or missing")]
    EmptyOperand,

    /// An operand exceeds the vertex cap and is not worth attempting.
    #[error("operand has {count} vertices, cap is {cap}")]
    OperandTooLarge { count: usize, cap: usize },

    /// Operand bounding boxes are separated by more than epsilon
    /// (only fatal for non-union operations).
    #[error("operand bounding boxes do not intersect")]
    DisjointOperands,

    /// An operand failed validation and could not be repaired.
    #[error("operand invalid: {0}")]
    InvalidOperand(String),

    /// The boolean kernel returned nothing usable.
    #[error("boolean kernel failed: {0}")]
    KernelFailed(String),

    /// The kernel produced a result but it failed post-checks
    /// (open edges, volume band, bounding-box agreement).
    #[error("result rejected: {0}")]
    ResultRejected(String),

    /// A bounded repair step was skipped because the mesh exceeds its
    /// size cap.
    #[error("{what} count {count} exceeds cap {cap}")]
    CapExceeded {
        what: &'static str,
        count: usize,
        cap: usize,
    },
}
