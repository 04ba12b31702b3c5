use alloc::string::String;
use alloc::vec::Vec;

use crate::sharding::{NdSbp, Sbp};

/// Errors reported while building a slice operation, before any data moves.
///
/// These are the recoverable failures: a graph builder receiving one of them can report a
/// diagnostic and reject the operator. Contract violations detected while a kernel runs are
/// not represented here, they panic.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SliceError {
    /// The number of `start`/`stop`/`step` entries does not match the tensor rank.
    #[error("{attr} has {got} entries but the tensor has rank {rank}")]
    RankMismatch {
        /// Name of the offending attribute.
        attr: &'static str,
        /// Number of entries supplied.
        got: usize,
        /// Rank of the tensor.
        rank: usize,
    },

    /// The tensor rank exceeds [`MAX_DIMS`](crate::MAX_DIMS).
    #[error("rank {rank} exceeds the supported maximum of {max}")]
    TooManyDims {
        /// Rank of the tensor.
        rank: usize,
        /// Supported maximum.
        max: usize,
    },

    /// Rank-0 tensors have no axis to slice.
    #[error("cannot slice a rank-0 tensor")]
    ScalarInput,

    /// A step of zero was supplied.
    #[error("step on axis {axis} must not be zero")]
    ZeroStep {
        /// Offending axis.
        axis: usize,
    },

    /// Distribution-aware slices only walk forward.
    #[error("step on axis {axis} must be positive for a logical slice, got {step}")]
    NonPositiveStep {
        /// Offending axis.
        axis: usize,
        /// Supplied step.
        step: i64,
    },

    /// Two shapes that must agree do not.
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape.
        expected: Vec<usize>,
        /// Shape found.
        got: Vec<usize>,
    },

    /// The distribution annotation cannot be resolved to a single split axis.
    #[error("unsupported distribution {nd_sbp} for `{arg}`: {reason}")]
    UnsupportedDistribution {
        /// Argument name.
        arg: &'static str,
        /// Annotation found.
        nd_sbp: NdSbp,
        /// Why it is rejected.
        reason: String,
    },

    /// The input and output distributions of a logical slice do not pair up.
    #[error("`{input}` distributed as {input_sbp} requires `{output}` to be {expected}, got {output_sbp}")]
    IncompatibleDistribution {
        /// Input argument name.
        input: &'static str,
        /// Input annotation.
        input_sbp: Sbp,
        /// Output argument name.
        output: &'static str,
        /// Output annotation.
        output_sbp: Sbp,
        /// Annotation the output must carry.
        expected: Sbp,
    },

    /// Split axis lies outside the logical tensor.
    #[error("split axis {axis} is out of range for a tensor of rank {rank}")]
    SplitAxisOutOfRange {
        /// Split axis.
        axis: usize,
        /// Rank of the tensor.
        rank: usize,
    },

    /// Worker rank outside the parallel group.
    #[error("rank {rank} is out of range for a parallel group of {parallel_num}")]
    RankOutOfRange {
        /// Worker rank.
        rank: usize,
        /// Group size.
        parallel_num: usize,
    },

    /// An invalid mesh dimension was specified.
    #[error("invalid mesh dimension: {0}")]
    InvalidDimension(String),

    /// The mesh configuration is invalid.
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),
}
