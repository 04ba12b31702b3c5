use alloc::format;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use super::{BalancedSplitter, NdSbp, ParallelContext, Sbp};
use crate::SliceError;

/// How the logical tensor behind one kernel argument is partitioned.
///
/// The logical tensor is split on `split_axis`, and the shard resident on this worker covers
/// `[lower, upper)` of the `logical_length` elements on that axis. With no split axis every
/// worker holds the full logical extent and the bounds are unused.
///
/// For example a `(8, 7, 6, 5)` variable distributed as `S(0)` over 4 workers gives the
/// first worker `split_axis = Some(0)`, `lower = 0`, `upper = 2` and `logical_length = 8`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SliceContext {
    /// Partitioned axis, if any.
    pub split_axis: Option<usize>,
    /// First logical index held locally on the split axis.
    pub lower: i64,
    /// One past the last logical index held locally on the split axis.
    pub upper: i64,
    /// Logical extent of the split axis.
    pub logical_length: i64,
}

impl SliceContext {
    /// Context of a tensor every worker holds whole.
    pub const fn non_split() -> Self {
        Self {
            split_axis: None,
            lower: 0,
            upper: 0,
            logical_length: 0,
        }
    }

    /// Context of a tensor split on `axis`, holding `[lower, upper)` locally.
    ///
    /// # Panics
    /// Panics unless `0 <= lower <= upper <= logical_length`.
    pub fn split(axis: usize, lower: i64, upper: i64, logical_length: i64) -> Self {
        assert!(
            0 <= lower && lower <= upper && upper <= logical_length,
            "shard [{lower}, {upper}) does not fit an axis of length {logical_length}"
        );
        Self {
            split_axis: Some(axis),
            lower,
            upper,
            logical_length,
        }
    }

    /// Local extent of the split axis.
    pub fn local_length(&self) -> Option<i64> {
        self.split_axis.map(|_| self.upper - self.lower)
    }
}

/// Everything the resolution of a [`SliceContext`] depends on.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DistributionSignature {
    /// Position of this worker in its group.
    pub parallel: ParallelContext,
    /// Distribution of the sliced tensor.
    pub nd_sbp: NdSbp,
    /// Logical shape of the sliced tensor.
    pub logical_shape: Vec<usize>,
}

impl DistributionSignature {
    /// Creates a signature.
    pub fn new<S: Into<Vec<usize>>>(parallel: ParallelContext, nd_sbp: NdSbp, logical_shape: S) -> Self {
        Self {
            parallel,
            nd_sbp,
            logical_shape: logical_shape.into(),
        }
    }
}

/// Resolves the partition of argument `arg` described by `signature`.
///
/// A single worker, or an annotation that is broadcast or partial-sum on every mesh axis,
/// yields a context without split axis. A one-axis mesh split on a tensor axis yields this
/// worker's range of a balanced partition of that axis. Anything else is unsupported.
pub fn resolve_slice_context(
    arg: &'static str,
    signature: &DistributionSignature,
) -> Result<SliceContext, SliceError> {
    let ParallelContext {
        parallel_id,
        parallel_num,
    } = signature.parallel;
    if parallel_id >= parallel_num {
        return Err(SliceError::RankOutOfRange {
            rank: parallel_id,
            parallel_num,
        });
    }
    if parallel_num == 1 {
        return Ok(SliceContext::non_split());
    }

    let nd_sbp = &signature.nd_sbp;
    let unsupported = |reason: alloc::string::String| SliceError::UnsupportedDistribution {
        arg,
        nd_sbp: nd_sbp.clone(),
        reason,
    };
    match nd_sbp.as_slice() {
        [] => Err(unsupported(format!("no annotation for a group of {parallel_num}"))),
        [Sbp::Split(axis)] => {
            let rank = signature.logical_shape.len();
            let Some(&length) = signature.logical_shape.get(*axis) else {
                return Err(SliceError::SplitAxisOutOfRange { axis: *axis, rank });
            };
            let range = BalancedSplitter::new(length, parallel_num).at(parallel_id);
            Ok(SliceContext::split(
                *axis,
                range.start as i64,
                range.end as i64,
                length as i64,
            ))
        }
        [_] => Ok(SliceContext::non_split()),
        _ if nd_sbp.is_whole() => Ok(SliceContext::non_split()),
        _ => Err(unsupported(format!(
            "a {}-axis mesh must be broadcast or partial-sum on every axis",
            nd_sbp.len()
        ))),
    }
}

/// Per-kernel cache of the resolved [`SliceContext`].
///
/// Resolution happens on first use and again only when the distribution signature
/// changes; the cache never returns to the uninitialized state.
#[derive(Clone, Debug, Default)]
pub enum SliceCache {
    /// Nothing resolved yet.
    #[default]
    Uninitialized,
    /// Context resolved for `signature`.
    Resolved {
        /// Signature the context was resolved for.
        signature: DistributionSignature,
        /// The resolved context.
        context: SliceContext,
    },
}

impl SliceCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::Uninitialized
    }

    /// Context resolved so far, if any.
    pub fn get(&self) -> Option<&SliceContext> {
        match self {
            Self::Uninitialized => None,
            Self::Resolved { context, .. } => Some(context),
        }
    }

    /// Returns the context for `signature`, resolving it if the signature differs from the
    /// last one seen.
    pub fn try_resolve(
        &mut self,
        arg: &'static str,
        signature: &DistributionSignature,
    ) -> Result<&SliceContext, SliceError> {
        let stale = match &*self {
            Self::Uninitialized => true,
            Self::Resolved { signature: cached, .. } => cached != signature,
        };
        if stale {
            let context = resolve_slice_context(arg, signature)?;
            log::debug!(
                "resolved slice context for `{arg}` {} on rank {}/{}: {context:?}",
                signature.nd_sbp,
                signature.parallel.parallel_id,
                signature.parallel.parallel_num
            );
            *self = Self::Resolved {
                signature: signature.clone(),
                context,
            };
        }
        match self {
            Self::Resolved { context, .. } => Ok(context),
            Self::Uninitialized => unreachable!("slice cache resolved above"),
        }
    }

    /// Like [`try_resolve`](Self::try_resolve), treating an unsupported distribution as a
    /// fatal error.
    ///
    /// # Panics
    /// Panics when the signature cannot be resolved.
    pub fn resolve(&mut self, arg: &'static str, signature: &DistributionSignature) -> &SliceContext {
        match self.try_resolve(arg, signature) {
            Ok(context) => context,
            Err(err) => panic!("{err}"),
        }
    }
}
