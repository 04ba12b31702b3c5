use crate::index::NdIndexOffsetHelper;

/// Largest tensor rank the slice kernels accept.
pub const MAX_DIMS: usize = 8;

/// Describes the elements one slice selects out of a dense row-major buffer.
///
/// On every axis the slice selects `size[i]` elements starting at `start[i]` and walking
/// `step[i]` at a time, inside a buffer whose extent on that axis is `dims[i]`. Entries
/// past `ndim` are zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SliceParams {
    /// Rank of the view.
    pub ndim: usize,
    /// Extent of the underlying buffer on each axis.
    pub dims: [i64; MAX_DIMS],
    /// First selected index on each axis.
    pub start: [i64; MAX_DIMS],
    /// Signed, non-zero stride on each axis.
    pub step: [i64; MAX_DIMS],
    /// Number of selected elements on each axis.
    pub size: [i64; MAX_DIMS],
}

impl SliceParams {
    /// Empty parameters of rank `ndim`.
    ///
    /// # Panics
    /// Panics if `ndim` is zero or exceeds [`MAX_DIMS`].
    pub fn zeroed(ndim: usize) -> Self {
        assert!(
            (1..=MAX_DIMS).contains(&ndim),
            "slice rank {ndim} must lie in [1, {MAX_DIMS}]"
        );
        Self {
            ndim,
            dims: [0; MAX_DIMS],
            start: [0; MAX_DIMS],
            step: [0; MAX_DIMS],
            size: [0; MAX_DIMS],
        }
    }

    /// Parameters selecting the whole of a dense buffer of the given shape.
    pub fn dense(shape: &[usize]) -> Self {
        let mut params = Self::zeroed(shape.len());
        for (i, &dim) in shape.iter().enumerate() {
            params.dims[i] = dim as i64;
            params.step[i] = 1;
            params.size[i] = dim as i64;
        }
        params
    }

    /// Number of selected elements.
    pub fn elem_cnt(&self) -> i64 {
        self.size[..self.ndim].iter().product()
    }

    /// True when axis `i` selects the whole extent, in order.
    pub fn is_full_slice(&self, i: usize) -> bool {
        self.start[i] == 0 && self.step[i] == 1 && self.size[i] == self.dims[i]
    }

    /// Checks that every selected index lies inside the buffer, which also makes the
    /// selection injective since no step is zero.
    ///
    /// # Panics
    /// Panics naming the first axis that selects outside `[0, dims)`.
    pub fn assert_in_bounds(&self) {
        for i in 0..self.ndim {
            let (start, step, size, dim) = (self.start[i], self.step[i], self.size[i], self.dims[i]);
            assert_ne!(step, 0, "step on axis {i} must not be zero");
            if size == 0 {
                continue;
            }
            let last = start + step * (size - 1);
            assert!(
                (0..dim).contains(&start) && (0..dim).contains(&last),
                "axis {i} selects [{start}, {last}] by {step}, outside [0, {dim})"
            );
        }
    }

    /// Offset, inside the whole buffer, of the element at position `offset` of the slice.
    #[inline]
    pub fn slice_offset_to_entire_offset<const N: usize>(
        &self,
        offset: i64,
        entire: &NdIndexOffsetHelper<i64, N>,
        sliced: &NdIndexOffsetHelper<i64, N>,
    ) -> i64 {
        let mut nd_index = sliced.offset_to_nd_index(offset);
        for (i, index) in nd_index.iter_mut().enumerate() {
            *index = self.start[i] + self.step[i] * *index;
        }
        entire.nd_index_to_offset(&nd_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params_2d() -> SliceParams {
        let mut params = SliceParams::zeroed(2);
        params.dims[..2].copy_from_slice(&[4, 6]);
        params.start[..2].copy_from_slice(&[1, 5]);
        params.step[..2].copy_from_slice(&[2, -2]);
        params.size[..2].copy_from_slice(&[2, 3]);
        params
    }

    #[test]
    fn test_elem_cnt() {
        assert_eq!(params_2d().elem_cnt(), 6);
        assert_eq!(SliceParams::dense(&[3, 0, 2]).elem_cnt(), 0);
    }

    #[test]
    fn test_is_full_slice() {
        let dense = SliceParams::dense(&[3, 4]);
        assert!(dense.is_full_slice(0));
        assert!(dense.is_full_slice(1));
        let params = params_2d();
        assert!(!params.is_full_slice(0));
        assert!(!params.is_full_slice(1));
    }

    #[test]
    fn test_slice_offset_to_entire_offset() {
        let params = params_2d();
        let entire = NdIndexOffsetHelper::<i64, 2>::new(&params.dims);
        let sliced = NdIndexOffsetHelper::<i64, 2>::new(&params.size);
        // rows {1, 3}, columns {5, 3, 1}
        let offsets: [i64; 6] =
            core::array::from_fn(|i| params.slice_offset_to_entire_offset(i as i64, &entire, &sliced));
        assert_eq!(offsets, [11, 9, 7, 23, 21, 19]);
    }

    #[test]
    fn test_in_bounds() {
        params_2d().assert_in_bounds();
    }

    #[test]
    #[should_panic = "axis 1 selects [5, -1] by -2, outside [0, 6)"]
    fn test_out_of_bounds_should_panic() {
        let mut params = params_2d();
        params.size[1] = 4;
        params.assert_in_bounds();
    }

    #[test]
    #[should_panic = "slice rank 9 must lie in [1, 8]"]
    fn test_rank_should_not_exceed_max() {
        let _ = SliceParams::zeroed(9);
    }
}
