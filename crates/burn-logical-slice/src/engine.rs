//! Strided copies between a "large" tensor and a "small" one.
//!
//! The large side is the tensor being sliced (possibly a shard of a split logical tensor);
//! the small side holds the slice result densely. Both are described by [`SliceParams`]
//! selecting the same number of elements, and the copy walks the slice in its row-major
//! order, batching the longest run of elements that is contiguous on both sides into one
//! bulk copy.

use crate::index::NdIndexOffsetHelper;
use crate::memory::{MemorySpace, Stream};
use crate::params::SliceParams;
use crate::sharding::SliceContext;
use crate::SliceElement;

/// Read-only buffer and the memory space it lives in.
#[derive(Debug)]
pub struct BufferRef<'a, E> {
    /// Elements, row-major.
    pub data: &'a [E],
    /// Memory space of `data`.
    pub space: MemorySpace,
}

/// Writable buffer and the memory space it lives in.
#[derive(Debug)]
pub struct BufferMut<'a, E> {
    /// Elements, row-major.
    pub data: &'a mut [E],
    /// Memory space of `data`.
    pub space: MemorySpace,
}

/// Which side of the copy is read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Gather the slice out of the large tensor into the small one.
    LargeToSmall,
    /// Scatter the small tensor into the slice of the large one.
    SmallToLarge,
}

/// Copies the elements selected by a (large, small) pair of [`SliceParams`].
#[derive(Clone, Copy, Debug)]
pub struct SliceCopyEngine<'a> {
    ctx: &'a SliceContext,
    large: &'a SliceParams,
    small: &'a SliceParams,
}

impl<'a> SliceCopyEngine<'a> {
    /// Pairs the two views.
    ///
    /// # Panics
    /// Panics when the ranks differ, when both sides select a different number of
    /// elements, or when the large side's extent on the split axis is not the shard length.
    pub fn new(ctx: &'a SliceContext, large: &'a SliceParams, small: &'a SliceParams) -> Self {
        assert_eq!(
            large.ndim, small.ndim,
            "large view has rank {} but small view has rank {}",
            large.ndim, small.ndim
        );
        assert_eq!(
            large.elem_cnt(),
            small.elem_cnt(),
            "large view selects {} elements but small view selects {}",
            large.elem_cnt(),
            small.elem_cnt()
        );
        if let (Some(axis), Some(len)) = (ctx.split_axis, ctx.local_length()) {
            assert_eq!(
                large.dims[axis], len,
                "shard extent {} on split axis {axis} differs from [{}, {})",
                large.dims[axis], ctx.lower, ctx.upper
            );
        }
        Self { ctx, large, small }
    }

    /// Length of the runs the copy is batched into.
    ///
    /// Scanning from the innermost axis outwards, a run absorbs each axis both sides walk
    /// with step 1, and stops growing at the first axis that is not a full slice on both
    /// sides.
    pub fn run_len(&self) -> i64 {
        let (large, small) = (self.large, self.small);
        let mut run = 1;
        for i in (0..large.ndim).rev() {
            if large.step[i] == 1 && small.step[i] == 1 {
                run *= large.size[i];
            }
            if !large.is_full_slice(i) || !small.is_full_slice(i) {
                break;
            }
        }
        run
    }

    /// Copies every selected element from `src` to `dst`.
    ///
    /// `src` is the large tensor for [`Direction::LargeToSmall`] and the small one
    /// otherwise.
    ///
    /// # Panics
    /// Panics when a buffer does not hold exactly the elements its view describes.
    pub fn copy<E: SliceElement>(
        &self,
        stream: &mut Stream,
        src: BufferRef<'_, E>,
        dst: BufferMut<'_, E>,
        direction: Direction,
    ) {
        let (large_len, small_len) = match direction {
            Direction::LargeToSmall => (src.data.len(), dst.data.len()),
            Direction::SmallToLarge => (dst.data.len(), src.data.len()),
        };
        check_buffer("large", self.large, large_len);
        check_buffer("small", self.small, small_len);

        macro_rules! dispatch {
            ($($n:literal),*) => {
                match self.large.ndim {
                    $($n => self.copy_nd::<$n, E>(stream, src, dst, direction),)*
                    ndim => unreachable!("slice rank {ndim} is validated on construction"),
                }
            };
        }
        dispatch!(1, 2, 3, 4, 5, 6, 7, 8)
    }

    fn copy_nd<const N: usize, E: SliceElement>(
        &self,
        stream: &mut Stream,
        src: BufferRef<'_, E>,
        mut dst: BufferMut<'_, E>,
        direction: Direction,
    ) {
        let elem_cnt = self.large.elem_cnt();
        if elem_cnt == 0 {
            return;
        }
        let entire_large = NdIndexOffsetHelper::<i64, N>::new(&self.large.dims);
        let sliced_large = NdIndexOffsetHelper::<i64, N>::new(&self.large.size);
        let entire_small = NdIndexOffsetHelper::<i64, N>::new(&self.small.dims);
        let sliced_small = NdIndexOffsetHelper::<i64, N>::new(&self.small.size);
        let run = self.run_len();

        let mut offset = 0;
        while offset < elem_cnt {
            let large_offset =
                self.large
                    .slice_offset_to_entire_offset(offset, &entire_large, &sliced_large) as usize;
            let small_offset =
                self.small
                    .slice_offset_to_entire_offset(offset, &entire_small, &sliced_small) as usize;
            let (src_offset, dst_offset) = match direction {
                Direction::LargeToSmall => (large_offset, small_offset),
                Direction::SmallToLarge => (small_offset, large_offset),
            };
            let len = run as usize;
            stream.memcpy(
                &mut dst.data[dst_offset..dst_offset + len],
                dst.space,
                &src.data[src_offset..src_offset + len],
                src.space,
            );
            offset += run;
        }
        log::trace!(
            "copied {elem_cnt} elements in {} runs of {run} ({direction:?}, split axis {:?})",
            elem_cnt / run,
            self.ctx.split_axis
        );
    }
}

fn check_buffer(side: &str, params: &SliceParams, len: usize) {
    let numel: i64 = params.dims[..params.ndim].iter().product();
    assert_eq!(
        numel as usize, len,
        "{side} buffer holds {len} elements but its view spans {numel}"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn params(dims: &[i64], start: &[i64], step: &[i64], size: &[i64]) -> SliceParams {
        let mut params = SliceParams::zeroed(dims.len());
        params.dims[..dims.len()].copy_from_slice(dims);
        params.start[..dims.len()].copy_from_slice(start);
        params.step[..dims.len()].copy_from_slice(step);
        params.size[..dims.len()].copy_from_slice(size);
        params
    }

    fn gather(large: &SliceParams, small: &SliceParams, src: &[i32]) -> (Vec<i32>, Stream) {
        let ctx = SliceContext::non_split();
        let engine = SliceCopyEngine::new(&ctx, large, small);
        let mut dst = alloc::vec![0; small.dims[..small.ndim].iter().product::<i64>() as usize];
        let mut stream = Stream::new();
        engine.copy(
            &mut stream,
            BufferRef { data: src, space: MemorySpace::Host },
            BufferMut { data: &mut dst, space: MemorySpace::Host },
            Direction::LargeToSmall,
        );
        (dst, stream)
    }

    #[test]
    fn test_run_len_full_rows() {
        // rows 1..3 of a 4x5 matrix
        let large = params(&[4, 5], &[1, 0], &[1, 1], &[2, 5]);
        let small = SliceParams::dense(&[2, 5]);
        let ctx = SliceContext::non_split();
        assert_eq!(SliceCopyEngine::new(&ctx, &large, &small).run_len(), 10);

        let src: Vec<i32> = (0..20).collect();
        let (dst, stream) = gather(&large, &small, &src);
        assert_eq!(dst, (5..15).collect::<Vec<_>>());
        assert_eq!(stream.stats().total_copies(), 1);
    }

    #[test]
    fn test_run_len_partial_inner_axis() {
        // columns 1..4 of a 3x5 matrix
        let large = params(&[3, 5], &[0, 1], &[1, 1], &[3, 3]);
        let small = SliceParams::dense(&[3, 3]);
        let src: Vec<i32> = (0..15).collect();
        let (dst, stream) = gather(&large, &small, &src);
        assert_eq!(dst, [1, 2, 3, 6, 7, 8, 11, 12, 13]);
        assert_eq!(stream.stats().total_copies(), 3);
    }

    #[test]
    fn test_strided_inner_axis_copies_elementwise() {
        let large = params(&[2, 6], &[0, 5], &[1, -2], &[2, 3]);
        let small = SliceParams::dense(&[2, 3]);
        let src: Vec<i32> = (0..12).collect();
        let (dst, stream) = gather(&large, &small, &src);
        assert_eq!(dst, [5, 3, 1, 11, 9, 7]);
        assert_eq!(stream.stats().total_copies(), 6);
    }

    #[test]
    fn test_scatter_into_small_window() {
        // the small side holds the whole result; the large side is a shard
        let ctx = SliceContext::split(0, 2, 4, 6);
        let large = params(&[2, 2], &[0, 0], &[1, 1], &[2, 2]);
        let small = params(&[6, 2], &[2, 0], &[1, 1], &[2, 2]);
        let engine = SliceCopyEngine::new(&ctx, &large, &small);
        assert_eq!(engine.run_len(), 4);

        let src = [7, 8, 9, 10];
        let mut dst = [0; 12];
        let mut stream = Stream::new();
        engine.copy(
            &mut stream,
            BufferRef { data: &src, space: MemorySpace::Device(0) },
            BufferMut { data: &mut dst, space: MemorySpace::Host },
            Direction::LargeToSmall,
        );
        assert_eq!(dst, [0, 0, 0, 0, 7, 8, 9, 10, 0, 0, 0, 0]);
        assert_eq!(stream.stats().copies(crate::CopyKind::DeviceToHost), 1);
    }

    #[test]
    fn test_empty_selection_copies_nothing() {
        let large = params(&[4], &[0], &[1], &[0]);
        let small = SliceParams::dense(&[0]);
        let (dst, stream) = gather(&large, &small, &[1, 2, 3, 4]);
        assert!(dst.is_empty());
        assert_eq!(stream.stats().total_copies(), 0);
    }

    #[test]
    #[should_panic = "large view selects 4 elements but small view selects 3"]
    fn test_element_counts_should_match() {
        let ctx = SliceContext::non_split();
        let large = params(&[4], &[0], &[1], &[4]);
        let small = SliceParams::dense(&[3]);
        let _ = SliceCopyEngine::new(&ctx, &large, &small);
    }

    #[test]
    #[should_panic = "shard extent 3 on split axis 0 differs from [0, 2)"]
    fn test_shard_extent_should_match_context() {
        let ctx = SliceContext::split(0, 0, 2, 4);
        let large = params(&[3], &[0], &[1], &[2]);
        let small = SliceParams::dense(&[2]);
        let _ = SliceCopyEngine::new(&ctx, &large, &small);
    }
}
