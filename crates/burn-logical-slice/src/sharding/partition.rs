use core::ops::Range;

/// Splits `[0, total)` into `parts` contiguous ranges whose lengths differ by at most one.
///
/// The first `total % parts` ranges receive the extra element, so ranges are ordered by
/// rank and never overlap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BalancedSplitter {
    total: usize,
    parts: usize,
}

impl BalancedSplitter {
    /// Creates a splitter.
    ///
    /// # Panics
    /// Panics if `parts` is zero.
    pub fn new(total: usize, parts: usize) -> Self {
        assert!(parts > 0, "cannot split {total} elements into 0 parts");
        Self { total, parts }
    }

    /// Number of ranges.
    pub fn parts(&self) -> usize {
        self.parts
    }

    /// Range owned by part `idx`.
    ///
    /// # Panics
    /// Panics if `idx >= parts`.
    pub fn at(&self, idx: usize) -> Range<usize> {
        assert!(
            idx < self.parts,
            "part {idx} is out of range for {} parts",
            self.parts
        );
        let base = self.total / self.parts;
        let remainder = self.total % self.parts;
        let start = idx * base + idx.min(remainder);
        let len = base + usize::from(idx < remainder);
        start..start + len
    }

    /// All ranges in rank order.
    pub fn ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.parts).map(|idx| self.at(idx))
    }
}
