//! The slice kernels.
//!
//! [`slice`], [`slice_grad`] and [`slice_update`] work on tensors held whole by one worker.
//! [`LogicalSliceKernel`] and [`LogicalSliceAssignKernel`] read and write a slice of a
//! logical tensor that may be split across a parallel group, each worker touching only the
//! part its shard holds. All of them panic on a contract violation.

use crate::builder::{
    LogicalBounds, SliceAttrs, construct_slice_params, construct_slice_params_large,
    construct_slice_params_small,
};
use crate::engine::{Direction, SliceCopyEngine};
use crate::memory::Stream;
use crate::params::SliceParams;
use crate::sharding::{DistributionSignature, ParallelContext, SliceCache, SliceContext};
use crate::tensor::{LocalTensor, ShardedTensor};
use crate::validate::{check_logical_slice, check_logical_slice_assign};
use crate::SliceElement;

/// Where the untouched part of an output comes from.
#[derive(Debug)]
pub enum Base<'a, T> {
    /// The output already holds it: it shares storage with the input.
    InPlace,
    /// Copy it from this tensor first.
    Tensor(&'a T),
}

/// Writes the elements of `x` selected by `attrs` into `y`.
pub fn slice<E: SliceElement>(
    stream: &mut Stream,
    attrs: &SliceAttrs,
    x: &LocalTensor<E>,
    y: &mut LocalTensor<E>,
) {
    log::debug!("slice {:?} -> {:?}", x.shape(), y.shape());
    let params = construct_slice_params(attrs, x.shape(), y.shape());
    let dense = dense_result(&params);
    SliceCopyEngine::new(&SliceContext::non_split(), &params, &dense).copy(
        stream,
        x.buffer(),
        y.buffer_mut(),
        Direction::LargeToSmall,
    );
}

/// Scatters the gradient `dy` of a slice back into `dx`, zeroing every position the slice
/// did not read.
///
/// A slice reads each input position at most once, so positions are overwritten rather
/// than accumulated.
pub fn slice_grad<E: SliceElement>(
    stream: &mut Stream,
    attrs: &SliceAttrs,
    dy: &LocalTensor<E>,
    dx: &mut LocalTensor<E>,
) {
    log::debug!("slice_grad {:?} -> {:?}", dy.shape(), dx.shape());
    let space = dx.space();
    stream.memset_zero(dx.as_mut_slice(), space);
    if dy.numel() == 0 {
        return;
    }
    scatter(stream, attrs, dy, dx);
}

/// Writes `base` into `y`, then overwrites the region selected by `attrs` with `update`.
///
/// # Panics
/// Panics if `base` and `y` differ in shape.
pub fn slice_update<E: SliceElement>(
    stream: &mut Stream,
    attrs: &SliceAttrs,
    base: Base<'_, LocalTensor<E>>,
    update: &LocalTensor<E>,
    y: &mut LocalTensor<E>,
) {
    log::debug!("slice_update {:?} into {:?}", update.shape(), y.shape());
    if let Base::Tensor(x) = base {
        assert_eq!(x.shape(), y.shape(), "slice_update base and output shapes differ");
        let space = y.space();
        stream.memcpy(y.as_mut_slice(), space, x.as_slice(), x.space());
    }
    scatter(stream, attrs, update, y);
}

fn scatter<E: SliceElement>(
    stream: &mut Stream,
    attrs: &SliceAttrs,
    src: &LocalTensor<E>,
    dst: &mut LocalTensor<E>,
) {
    let params = construct_slice_params(attrs, dst.shape(), src.shape());
    let dense = dense_result(&params);
    SliceCopyEngine::new(&SliceContext::non_split(), &params, &dense).copy(
        stream,
        src.buffer(),
        dst.buffer_mut(),
        Direction::SmallToLarge,
    );
}

/// Dense view of the elements `params` selects, as the sliced tensor stores them.
fn dense_result(params: &SliceParams) -> SliceParams {
    let mut dense = *params;
    for i in 0..params.ndim {
        dense.dims[i] = params.size[i];
        dense.start[i] = 0;
        dense.step[i] = 1;
    }
    dense
}

/// Copies between the shard of a possibly split logical tensor (`large`) and a tensor that
/// holds the whole slice result (`small`).
fn write_slice<E: SliceElement>(
    stream: &mut Stream,
    ctx: &SliceContext,
    attrs: &SliceAttrs,
    src: &LocalTensor<E>,
    dst: &mut LocalTensor<E>,
    direction: Direction,
) {
    let (large_shape, small_shape) = match direction {
        Direction::LargeToSmall => (src.shape(), dst.shape()),
        Direction::SmallToLarge => (dst.shape(), src.shape()),
    };
    let bounds = LogicalBounds::new(ctx, attrs, large_shape);
    let large = construct_slice_params_large(ctx, &bounds, large_shape);
    let small = construct_slice_params_small(ctx, &bounds, small_shape);
    SliceCopyEngine::new(ctx, &large, &small).copy(stream, src.buffer(), dst.buffer_mut(), direction);
}

/// Reads a slice of a logical tensor `x` into `y`.
///
/// Each worker writes the part of the result its shard of `x` holds and zeros elsewhere,
/// so for a split `x` the `y` of all workers sum to the result (`y` is partial-sum); for a
/// broadcast or partial-sum `x`, `y` carries the same annotation.
#[derive(Debug, Default)]
pub struct LogicalSliceKernel {
    cache: SliceCache,
}

impl LogicalSliceKernel {
    /// Creates a kernel with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached distribution of `x`.
    pub fn cache(&self) -> &SliceCache {
        &self.cache
    }

    /// Runs the kernel on the worker described by `parallel`.
    ///
    /// # Panics
    /// Panics when the annotations of `x` and `y` do not pair up, when the distribution of
    /// `x` is unsupported, or when the attributes do not describe a forward slice of `x`.
    pub fn compute<E: SliceElement>(
        &mut self,
        stream: &mut Stream,
        parallel: ParallelContext,
        attrs: &SliceAttrs,
        x: &ShardedTensor<E>,
        y: &mut ShardedTensor<E>,
    ) {
        if let Err(err) = check_logical_slice(parallel, x.nd_sbp(), y.nd_sbp()) {
            panic!("logical_slice: {err}");
        }
        let signature = DistributionSignature::new(parallel, x.nd_sbp().clone(), x.global_shape());
        let ctx = *self.cache.resolve("x", &signature);
        log::debug!(
            "logical_slice on rank {}: {:?} -> {:?}",
            parallel.parallel_id,
            x.local().shape(),
            y.local().shape()
        );

        let y = y.local_mut();
        let space = y.space();
        stream.memset_zero(y.as_mut_slice(), space);
        write_slice(stream, &ctx, attrs, x.local(), y, Direction::LargeToSmall);
    }
}

/// Overwrites a slice of a logical tensor `ref` with `value`, producing `y`.
///
/// `value` is held whole by every worker; each worker writes only the part that lands in
/// its shard of `ref`.
#[derive(Debug, Default)]
pub struct LogicalSliceAssignKernel {
    cache: SliceCache,
}

impl LogicalSliceAssignKernel {
    /// Creates a kernel with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached distribution of `ref`.
    pub fn cache(&self) -> &SliceCache {
        &self.cache
    }

    /// Runs the kernel on the worker described by `parallel`.
    ///
    /// With [`Base::InPlace`], `y` is `ref` itself and its contents are kept; otherwise
    /// `ref` is copied into `y` first.
    ///
    /// # Panics
    /// Panics when `value` is split, when the distribution of `ref` is unsupported, or when
    /// the attributes do not describe a forward slice of `ref`.
    pub fn compute<E: SliceElement>(
        &mut self,
        stream: &mut Stream,
        parallel: ParallelContext,
        attrs: &SliceAttrs,
        reference: Base<'_, ShardedTensor<E>>,
        value: &ShardedTensor<E>,
        y: &mut ShardedTensor<E>,
    ) {
        if let Err(err) = check_logical_slice_assign(parallel, value.nd_sbp()) {
            panic!("logical_slice_assign: {err}");
        }
        let signature = match &reference {
            Base::InPlace => DistributionSignature::new(parallel, y.nd_sbp().clone(), y.global_shape()),
            Base::Tensor(r) => DistributionSignature::new(parallel, r.nd_sbp().clone(), r.global_shape()),
        };
        let ctx = *self.cache.resolve("ref", &signature);
        log::debug!(
            "logical_slice_assign on rank {}: {:?} into {:?}",
            parallel.parallel_id,
            value.local().shape(),
            y.local().shape()
        );

        let y = y.local_mut();
        if let Base::Tensor(r) = &reference {
            let r = r.local();
            assert_eq!(r.shape(), y.shape(), "logical_slice_assign ref and output shapes differ");
            let space = y.space();
            stream.memcpy(y.as_mut_slice(), space, r.as_slice(), r.space());
        }
        write_slice(stream, &ctx, attrs, value.local(), y, Direction::SmallToLarge);
    }
}
