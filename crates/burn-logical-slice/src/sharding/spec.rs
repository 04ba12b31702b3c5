use alloc::vec::Vec;
use core::fmt;

use serde::{Deserialize, Serialize};

/// Specifies how a tensor is held along one axis of the device mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sbp {
    /// The given tensor axis is partitioned into contiguous ranges, one per worker.
    Split(usize),
    /// Every worker holds the whole tensor.
    Broadcast,
    /// Every worker holds a partial value; the logical tensor is their sum.
    PartialSum,
}

impl Sbp {
    /// Returns the split axis, if this annotation splits the tensor.
    pub fn split_axis(&self) -> Option<usize> {
        match self {
            Sbp::Split(axis) => Some(*axis),
            Sbp::Broadcast | Sbp::PartialSum => None,
        }
    }

    /// True for broadcast and partial-sum, the annotations under which every worker holds
    /// the full logical extent.
    pub fn is_whole(&self) -> bool {
        matches!(self, Sbp::Broadcast | Sbp::PartialSum)
    }
}

impl fmt::Display for Sbp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sbp::Split(axis) => write!(f, "S({axis})"),
            Sbp::Broadcast => f.write_str("B"),
            Sbp::PartialSum => f.write_str("P"),
        }
    }
}

/// Describes how a tensor is distributed across a device mesh, one [`Sbp`] per mesh axis.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NdSbp {
    /// Distribution pattern for each mesh dimension
    sbp: Vec<Sbp>,
}

impl NdSbp {
    /// Creates an annotation from one entry per mesh axis.
    pub fn new<S: Into<Vec<Sbp>>>(sbp: S) -> Self {
        Self { sbp: sbp.into() }
    }

    /// Annotation for a one-dimensional mesh.
    pub fn single(sbp: Sbp) -> Self {
        Self { sbp: alloc::vec![sbp] }
    }

    /// Entries, one per mesh axis.
    pub fn as_slice(&self) -> &[Sbp] {
        &self.sbp
    }

    /// Number of mesh axes described.
    pub fn len(&self) -> usize {
        self.sbp.len()
    }

    /// True when no mesh axis is described.
    pub fn is_empty(&self) -> bool {
        self.sbp.is_empty()
    }

    /// True when every mesh axis is broadcast or partial-sum.
    pub fn is_whole(&self) -> bool {
        self.sbp.iter().all(Sbp::is_whole)
    }
}

impl fmt::Display for NdSbp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, sbp) in self.sbp.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{sbp}")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_display() {
        let nd_sbp = NdSbp::new([Sbp::Split(1), Sbp::Broadcast, Sbp::PartialSum]);
        assert_eq!(nd_sbp.to_string(), "(S(1), B, P)");
    }

    #[test]
    fn test_is_whole() {
        assert!(NdSbp::new([Sbp::Broadcast, Sbp::PartialSum]).is_whole());
        assert!(!NdSbp::new([Sbp::Broadcast, Sbp::Split(0)]).is_whole());
        assert_eq!(Sbp::Split(2).split_axis(), Some(2));
        assert_eq!(Sbp::PartialSum.split_axis(), None);
    }

    #[test]
    fn test_serde_form() {
        let nd_sbp = NdSbp::single(Sbp::Split(0));
        let json = serde_json::to_string(&nd_sbp).unwrap();
        assert_eq!(json, r#"{"sbp":[{"Split":0}]}"#);
        let back: NdSbp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, nd_sbp);
    }
}
