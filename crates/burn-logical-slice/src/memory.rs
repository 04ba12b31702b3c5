//! Memory spaces and the stream that issues bulk copies between them.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::SliceElement;

/// Where a buffer lives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemorySpace {
    /// Pageable host memory.
    #[default]
    Host,
    /// Page-locked host memory.
    PinnedHost,
    /// Memory of the accelerator with the given ordinal.
    Device(usize),
}

impl MemorySpace {
    /// True for host memory, pinned or not.
    pub fn is_host(&self) -> bool {
        matches!(self, MemorySpace::Host | MemorySpace::PinnedHost)
    }
}

/// Route a bulk copy takes, chosen from the memory spaces of its endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CopyKind {
    /// Host to host.
    HostToHost,
    /// Host to accelerator.
    HostToDevice,
    /// Accelerator to host.
    DeviceToHost,
    /// Within one accelerator.
    DeviceToDevice,
    /// Between two accelerators.
    PeerToPeer,
}

impl CopyKind {
    /// Number of routes.
    pub const COUNT: usize = 5;

    /// Route of a copy from `src` to `dst`.
    pub fn route(src: MemorySpace, dst: MemorySpace) -> Self {
        match (src, dst) {
            (MemorySpace::Device(a), MemorySpace::Device(b)) if a == b => CopyKind::DeviceToDevice,
            (MemorySpace::Device(_), MemorySpace::Device(_)) => CopyKind::PeerToPeer,
            (MemorySpace::Device(_), _) => CopyKind::DeviceToHost,
            (_, MemorySpace::Device(_)) => CopyKind::HostToDevice,
            _ => CopyKind::HostToHost,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Counters of the work a [`Stream`] has issued.
///
/// Copies are counted per [`CopyKind`], memsets per [`MemorySpace`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CopyStats {
    copies: [usize; CopyKind::COUNT],
    bytes: [usize; CopyKind::COUNT],
    memsets: HashMap<MemorySpace, (usize, usize)>,
}

impl CopyStats {
    /// Copies issued along `kind`.
    pub fn copies(&self, kind: CopyKind) -> usize {
        self.copies[kind.index()]
    }

    /// Bytes moved along `kind`.
    pub fn bytes(&self, kind: CopyKind) -> usize {
        self.bytes[kind.index()]
    }

    /// Copies issued along every route.
    pub fn total_copies(&self) -> usize {
        self.copies.iter().sum()
    }

    /// Bytes moved along every route.
    pub fn total_bytes(&self) -> usize {
        self.bytes.iter().sum()
    }

    /// Memsets issued on `space`.
    pub fn memsets(&self, space: MemorySpace) -> usize {
        self.memsets.get(&space).map_or(0, |(count, _)| *count)
    }

    /// Bytes cleared on `space`.
    pub fn memset_bytes(&self, space: MemorySpace) -> usize {
        self.memsets.get(&space).map_or(0, |(_, bytes)| *bytes)
    }

    /// Memsets issued on every space.
    pub fn total_memsets(&self) -> usize {
        self.memsets.values().map(|(count, _)| count).sum()
    }
}

/// Ordered queue the kernels issue their copies and memsets on.
///
/// Operations run in issue order. The stream does not synchronize with anything else; the
/// caller owns ordering against other streams.
#[derive(Debug, Default)]
pub struct Stream {
    stats: CopyStats,
}

impl Stream {
    /// Creates a stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Work issued so far.
    pub fn stats(&self) -> &CopyStats {
        &self.stats
    }

    /// Copies `src` into `dst`, routed by the memory spaces of both buffers.
    ///
    /// # Panics
    /// Panics if the lengths differ.
    #[inline]
    pub fn memcpy<E: SliceElement>(
        &mut self,
        dst: &mut [E],
        dst_space: MemorySpace,
        src: &[E],
        src_space: MemorySpace,
    ) {
        let kind = CopyKind::route(src_space, dst_space);
        dst.copy_from_slice(src);
        self.stats.copies[kind.index()] += 1;
        self.stats.bytes[kind.index()] += core::mem::size_of_val(src);
    }

    /// Fills `dst`, which lives on `space`, with zeros.
    pub fn memset_zero<E: SliceElement>(&mut self, dst: &mut [E], space: MemorySpace) {
        dst.fill(E::default());
        let (count, bytes) = self.stats.memsets.entry(space).or_default();
        *count += 1;
        *bytes += core::mem::size_of_val(&*dst);
    }
}
