//! Conversion between n-dimensional coordinates and linear offsets.

use num_traits::PrimInt;

/// Maps row-major coordinates of an `N`-dimensional box to linear offsets and back.
///
/// The box is described by its extent on each axis. For a whole buffer that is its shape;
/// for a slice it is the number of selected elements per axis. `I` is the index width.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NdIndexOffsetHelper<I, const N: usize> {
    strides: [I; N],
}

impl<I: PrimInt, const N: usize> NdIndexOffsetHelper<I, N> {
    /// Builds the helper from the first `N` entries of `dims`.
    ///
    /// # Panics
    /// Panics if `dims` holds fewer than `N` entries.
    pub fn new(dims: &[I]) -> Self {
        assert!(
            dims.len() >= N,
            "expected at least {N} dims, got {}",
            dims.len()
        );
        let mut strides = [I::one(); N];
        for i in (0..N.saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * dims[i + 1];
        }
        Self { strides }
    }

    /// Linear offset of `index`.
    #[inline]
    pub fn nd_index_to_offset(&self, index: &[I; N]) -> I {
        let mut offset = I::zero();
        for i in 0..N {
            offset = offset + index[i] * self.strides[i];
        }
        offset
    }

    /// Coordinates of `offset`.
    #[inline]
    pub fn offset_to_nd_index(&self, offset: I) -> [I; N] {
        let mut index = [I::zero(); N];
        let mut remaining = offset;
        for i in 0..N {
            index[i] = remaining / self.strides[i];
            remaining = remaining - index[i] * self.strides[i];
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_3d() {
        let helper = NdIndexOffsetHelper::<i64, 3>::new(&[2, 3, 4]);
        assert_eq!(helper.nd_index_to_offset(&[0, 0, 0]), 0);
        assert_eq!(helper.nd_index_to_offset(&[1, 2, 3]), 23);
        assert_eq!(helper.nd_index_to_offset(&[1, 0, 1]), 13);
        assert_eq!(helper.offset_to_nd_index(13), [1, 0, 1]);
        assert_eq!(helper.offset_to_nd_index(23), [1, 2, 3]);
    }

    #[test]
    fn test_narrow_index_width() {
        let helper = NdIndexOffsetHelper::<i32, 2>::new(&[5, 7]);
        for offset in 0..35 {
            let index = helper.offset_to_nd_index(offset);
            assert_eq!(helper.nd_index_to_offset(&index), offset);
        }
    }

    #[test]
    fn test_uses_leading_dims_only() {
        let dims = [4_i64, 6, 0, 0, 0, 0, 0, 0];
        let helper = NdIndexOffsetHelper::<i64, 2>::new(&dims);
        assert_eq!(helper.offset_to_nd_index(11), [1, 5]);
    }

    #[test]
    #[should_panic = "expected at least 3 dims, got 2"]
    fn test_dims_should_cover_rank() {
        let _ = NdIndexOffsetHelper::<i64, 3>::new(&[2, 2]);
    }
}
