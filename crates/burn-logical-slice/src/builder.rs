//! Construction of [`SliceParams`] from user attributes.
//!
//! Three builders live here. [`construct_slice_params`] serves the plain slice kernels and
//! understands negative indices and negative steps. [`construct_slice_params_large`] and
//! [`construct_slice_params_small`] serve the distribution-aware kernels: the first maps a
//! logical slice onto the shard one worker holds, the second computes where that shard's
//! contribution lands in a tensor every worker holds whole.

use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use crate::params::{MAX_DIMS, SliceParams};
use crate::sharding::SliceContext;
use crate::SliceError;

/// Per-axis `start`, `stop` and `step` attributes of a slice, in Python semantics.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SliceAttrs {
    /// First index on each axis; negative values count from the end.
    pub start: Vec<i64>,
    /// Exclusive bound on each axis; negative values count from the end.
    pub stop: Vec<i64>,
    /// Stride on each axis; must not be zero.
    pub step: Vec<i64>,
}

impl SliceAttrs {
    /// Creates attributes from one entry per axis.
    pub fn new<S: Into<Vec<i64>>>(start: S, stop: S, step: S) -> Self {
        Self {
            start: start.into(),
            stop: stop.into(),
            step: step.into(),
        }
    }

    /// Checks that each attribute has one entry per axis of a rank-`rank` tensor and that no
    /// step is zero.
    pub fn check(&self, rank: usize) -> Result<(), SliceError> {
        if rank > MAX_DIMS {
            return Err(SliceError::TooManyDims {
                rank,
                max: MAX_DIMS,
            });
        }
        for (attr, got) in [
            ("start", self.start.len()),
            ("stop", self.stop.len()),
            ("step", self.step.len()),
        ] {
            if got != rank {
                return Err(SliceError::RankMismatch { attr, got, rank });
            }
        }
        match self.step.iter().position(|&step| step == 0) {
            Some(axis) => Err(SliceError::ZeroStep { axis }),
            None => Ok(()),
        }
    }

    fn assert_valid(&self, rank: usize) {
        if let Err(err) = self.check(rank) {
            panic!("invalid slice attributes: {err}");
        }
    }
}

/// Normalizes a `start` attribute against an axis of length `dim`.
///
/// Negative values count from the end. The result is clamped to `[0, dim]` for a forward
/// walk and to `[-1, dim - 1]` for a backward one, where `-1` means "before the first
/// element".
pub fn regulate_slice_start(start: i64, dim: i64, step: i64) -> i64 {
    regulate(start, dim, step)
}

/// Normalizes a `stop` attribute against an axis of length `dim`, as
/// [`regulate_slice_start`] does.
pub fn regulate_slice_stop(stop: i64, dim: i64, step: i64) -> i64 {
    regulate(stop, dim, step)
}

fn regulate(index: i64, dim: i64, step: i64) -> i64 {
    let index = if index < 0 { index + dim } else { index };
    if step > 0 {
        index.clamp(0, dim)
    } else {
        index.clamp(-1, dim - 1)
    }
}

/// Number of indices in `start, start + step, ...` that stay strictly before `stop` (for a
/// positive step) or strictly after it (for a negative one).
pub fn slice_len(start: i64, stop: i64, step: i64) -> i64 {
    if step > 0 {
        if stop <= start { 0 } else { (stop - start - 1) / step + 1 }
    } else if stop >= start {
        0
    } else {
        (stop - start + 1) / step + 1
    }
}

/// Builds the parameters of a plain slice of `entire` whose result has shape `sliced`.
///
/// A rank-1 input may be sliced down to a rank-0 output, which picks the single element at
/// `start[0]`.
///
/// # Panics
/// Panics when the attributes do not match the rank, when a step is zero, or when the
/// number of selected elements on an axis disagrees with `sliced`.
pub fn construct_slice_params(attrs: &SliceAttrs, entire: &[usize], sliced: &[usize]) -> SliceParams {
    let ndim = entire.len();
    attrs.assert_valid(ndim);
    if ndim == 1 {
        assert!(
            sliced.len() <= 1,
            "slicing a rank-1 tensor yields rank 0 or 1, got rank {}",
            sliced.len()
        );
    } else {
        assert_eq!(
            sliced.len(),
            ndim,
            "sliced rank {} differs from entire rank {ndim}",
            sliced.len()
        );
    }

    let mut params = SliceParams::zeroed(ndim);
    if ndim == 1 && sliced.is_empty() {
        let dim = entire[0] as i64;
        let start = if attrs.start[0] < 0 {
            attrs.start[0] + dim
        } else {
            attrs.start[0]
        };
        assert!(
            (0..dim).contains(&start),
            "scalar pick at {} is out of range for an axis of length {dim}",
            attrs.start[0]
        );
        params.dims[0] = dim;
        params.start[0] = start;
        params.step[0] = attrs.step[0];
        params.size[0] = 1;
        return params;
    }

    for i in 0..ndim {
        let dim = entire[i] as i64;
        let step = attrs.step[i];
        let start = regulate_slice_start(attrs.start[i], dim, step);
        let stop = regulate_slice_stop(attrs.stop[i], dim, step);
        let size = slice_len(start, stop, step);
        assert_eq!(
            size, sliced[i] as i64,
            "axis {i}: [{start}:{stop}:{step}] selects {size} elements but the sliced extent is {}",
            sliced[i]
        );
        params.dims[i] = dim;
        params.start[i] = start;
        params.step[i] = step;
        params.size[i] = size;
    }
    params.assert_in_bounds();
    params
}

/// Logical `start`/`stop` of a distribution-aware slice, regulated to non-negative values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogicalBounds {
    /// Rank.
    pub ndim: usize,
    /// Non-negative logical start per axis.
    pub start: [i64; MAX_DIMS],
    /// Non-negative logical stop per axis.
    pub stop: [i64; MAX_DIMS],
    /// Positive step per axis.
    pub step: [i64; MAX_DIMS],
}

impl LogicalBounds {
    /// Regulates `attrs` against the logical extent of the sliced tensor.
    ///
    /// On the split axis the extent is the context's logical length; every other axis uses
    /// the local extent in `large_shape`, which equals the logical one there.
    ///
    /// # Panics
    /// Panics when the attributes do not match the rank or a step is not positive.
    pub fn new(ctx: &SliceContext, attrs: &SliceAttrs, large_shape: &[usize]) -> Self {
        let ndim = large_shape.len();
        attrs.assert_valid(ndim);
        let mut bounds = Self {
            ndim,
            start: [0; MAX_DIMS],
            stop: [0; MAX_DIMS],
            step: [0; MAX_DIMS],
        };
        for i in 0..ndim {
            let step = attrs.step[i];
            assert!(step > 0, "step on axis {i} must be positive, got {step}");
            let dim = if ctx.split_axis == Some(i) {
                ctx.logical_length
            } else {
                large_shape[i] as i64
            };
            bounds.start[i] = regulate_slice_start(attrs.start[i], dim, step);
            bounds.stop[i] = regulate_slice_stop(attrs.stop[i], dim, step);
            bounds.step[i] = step;
        }
        bounds
    }
}

/// Builds the parameters of a logical slice over the shard held in `shape`, in local
/// coordinates.
///
/// On the split axis the logical range is clipped to `[lower, upper)`; a start below
/// `lower` advances to the first index of the progression inside the shard. Other axes are
/// taken as they are.
pub fn construct_slice_params_large(
    ctx: &SliceContext,
    bounds: &LogicalBounds,
    shape: &[usize],
) -> SliceParams {
    assert_eq!(
        bounds.ndim,
        shape.len(),
        "bounds of rank {} applied to a shard of rank {}",
        bounds.ndim,
        shape.len()
    );
    let mut params = SliceParams::zeroed(shape.len());
    for (i, &dim) in shape.iter().enumerate() {
        let step = bounds.step[i];
        let mut start = bounds.start[i];
        let mut stop = bounds.stop[i];
        if ctx.split_axis == Some(i) {
            if start < ctx.lower {
                // first index of the progression at or past `lower`
                let r = (ctx.lower - start) % step;
                start = if r == 0 {
                    ctx.lower
                } else {
                    ctx.lower.saturating_add(step - r)
                };
            }
            start = start.clamp(ctx.lower, ctx.upper) - ctx.lower;
            stop = stop.clamp(ctx.lower, ctx.upper) - ctx.lower;
        }
        params.dims[i] = dim as i64;
        params.start[i] = start;
        params.step[i] = step;
        params.size[i] = slice_len(start, stop, step);
    }
    params
}

/// Builds the parameters locating one worker's contribution inside a tensor of shape
/// `shape` that holds the whole logical slice result.
///
/// On the split axis the selected range counts the progression's indices falling below
/// `lower` and below `upper`. Every axis walks with step 1, since the result is already
/// dense.
pub fn construct_slice_params_small(
    ctx: &SliceContext,
    bounds: &LogicalBounds,
    shape: &[usize],
) -> SliceParams {
    assert_eq!(
        bounds.ndim,
        shape.len(),
        "bounds of rank {} applied to a tensor of rank {}",
        bounds.ndim,
        shape.len()
    );
    let mut params = SliceParams::zeroed(shape.len());
    for (i, &dim) in shape.iter().enumerate() {
        let dim = dim as i64;
        let (mut start, mut stop) = (0, dim);
        if ctx.split_axis == Some(i) {
            let step = bounds.step[i];
            start = slice_len(bounds.start[i], ctx.lower, step).clamp(0, dim);
            stop = slice_len(bounds.start[i], ctx.upper, step).clamp(0, dim);
        }
        params.dims[i] = dim;
        params.start[i] = start;
        params.step[i] = 1;
        params.size[i] = stop - start;
    }
    params
}
