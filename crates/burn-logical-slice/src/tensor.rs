use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::engine::{BufferMut, BufferRef};
use crate::memory::MemorySpace;
use crate::sharding::{BalancedSplitter, NdSbp, ParallelContext, Sbp};
use crate::{SliceElement, SliceError};

/// Dense row-major buffer resident on one worker.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalTensor<E> {
    data: Vec<E>,
    shape: Vec<usize>,
    space: MemorySpace,
}

impl<E: SliceElement> LocalTensor<E> {
    /// Wraps `data` as a host tensor of the given shape.
    ///
    /// # Panics
    /// Panics if the element count does not match the shape.
    pub fn new<S: Into<Vec<usize>>>(data: Vec<E>, shape: S) -> Self {
        let shape = shape.into();
        let numel = shape.iter().product::<usize>();
        assert_eq!(
            data.len(),
            numel,
            "{} elements do not fill shape {shape:?}",
            data.len()
        );
        Self {
            data,
            shape,
            space: MemorySpace::Host,
        }
    }

    /// Host tensor filled with zeros.
    pub fn zeros<S: Into<Vec<usize>>>(shape: S) -> Self {
        let shape = shape.into();
        let numel = shape.iter().product::<usize>();
        Self::new(vec![E::default(); numel], shape)
    }

    /// Moves the tensor's tag to another memory space.
    pub fn with_space(mut self, space: MemorySpace) -> Self {
        self.space = space;
        self
    }

    /// Shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of elements.
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Memory space the buffer lives in.
    pub fn space(&self) -> MemorySpace {
        self.space
    }

    /// Elements in row-major order.
    pub fn as_slice(&self) -> &[E] {
        &self.data
    }

    /// Mutable elements in row-major order.
    pub fn as_mut_slice(&mut self) -> &mut [E] {
        &mut self.data
    }

    /// Borrows the buffer for reading.
    pub fn buffer(&self) -> BufferRef<'_, E> {
        BufferRef {
            data: &self.data,
            space: self.space,
        }
    }

    /// Borrows the buffer for writing.
    pub fn buffer_mut(&mut self) -> BufferMut<'_, E> {
        BufferMut {
            data: &mut self.data,
            space: self.space,
        }
    }

    /// Consumes the tensor, returning its elements.
    pub fn into_vec(self) -> Vec<E> {
        self.data
    }

    /// Copies `[start, end)` of `axis` into a new tensor.
    pub fn narrow(&self, axis: usize, start: usize, end: usize) -> Self {
        let outer: usize = self.shape[..axis].iter().product();
        let inner: usize = self.shape[axis + 1..].iter().product();
        let dim = self.shape[axis];
        let mut data = Vec::with_capacity(outer * (end - start) * inner);
        for o in 0..outer {
            let base = o * dim * inner;
            data.extend_from_slice(&self.data[base + start * inner..base + end * inner]);
        }
        let mut shape = self.shape.clone();
        shape[axis] = end - start;
        Self::new(data, shape).with_space(self.space)
    }

    /// Concatenates tensors along `axis`.
    ///
    /// # Panics
    /// Panics if `parts` is empty or the shapes disagree off `axis`.
    pub fn concat(parts: &[&Self], axis: usize) -> Self {
        assert!(!parts.is_empty(), "concat needs at least one tensor");
        let first = parts[0];
        let mut shape = first.shape.clone();
        shape[axis] = 0;
        for part in parts {
            assert!(
                part.shape.len() == shape.len()
                    && part
                        .shape
                        .iter()
                        .zip(&first.shape)
                        .enumerate()
                        .all(|(i, (a, b))| i == axis || a == b),
                "cannot concat shape {:?} with {:?} on axis {axis}",
                part.shape,
                first.shape
            );
            shape[axis] += part.shape[axis];
        }
        let outer: usize = shape[..axis].iter().product();
        let inner: usize = shape[axis + 1..].iter().product();
        let mut data = Vec::with_capacity(shape.iter().product());
        for o in 0..outer {
            for part in parts {
                let chunk = part.shape[axis] * inner;
                data.extend_from_slice(&part.data[o * chunk..(o + 1) * chunk]);
            }
        }
        Self::new(data, shape).with_space(first.space)
    }
}

/// Represents a tensor that is distributed (split, broadcast or partial-sum) across a
/// parallel group.
///
/// A `ShardedTensor` holds the local shard of a logical tensor along with the annotation
/// describing how the logical tensor is partitioned and the logical shape itself.
#[derive(Clone, Debug, PartialEq)]
pub struct ShardedTensor<E> {
    /// Local shard of the tensor
    local_shard: LocalTensor<E>,
    /// Distribution of the tensor across the group
    nd_sbp: NdSbp,
    /// Global shape of the tensor (across all devices)
    global_shape: Vec<usize>,
}

impl<E: SliceElement> ShardedTensor<E> {
    /// Wraps an existing shard.
    pub fn new<S: Into<Vec<usize>>>(local_shard: LocalTensor<E>, nd_sbp: NdSbp, global_shape: S) -> Self {
        Self {
            local_shard,
            nd_sbp,
            global_shape: global_shape.into(),
        }
    }

    /// Tensor held whole by a single worker.
    pub fn whole(tensor: LocalTensor<E>) -> Self {
        let global_shape = tensor.shape().to_vec();
        Self::new(tensor, NdSbp::single(Sbp::Broadcast), global_shape)
    }

    /// Builds the shard the worker at `parallel` holds of `global` under a one-axis
    /// annotation.
    ///
    /// A split hands out this worker's range of a balanced partition, a broadcast copies
    /// the tensor, and a partial sum gives the values to rank 0 and zeros to everyone else.
    pub fn distribute(
        global: &LocalTensor<E>,
        sbp: Sbp,
        parallel: ParallelContext,
    ) -> Result<Self, SliceError> {
        let parallel = ParallelContext::new(parallel.parallel_id, parallel.parallel_num)?;
        let local_shard = match sbp {
            Sbp::Split(axis) => {
                let rank = global.shape().len();
                if axis >= rank {
                    return Err(SliceError::SplitAxisOutOfRange { axis, rank });
                }
                let range = BalancedSplitter::new(global.shape()[axis], parallel.parallel_num)
                    .at(parallel.parallel_id);
                global.narrow(axis, range.start, range.end)
            }
            Sbp::Broadcast => global.clone(),
            Sbp::PartialSum if parallel.parallel_id == 0 => global.clone(),
            Sbp::PartialSum => {
                LocalTensor::zeros(global.shape().to_vec()).with_space(global.space())
            }
        };
        Ok(Self::new(
            local_shard,
            NdSbp::single(sbp),
            global.shape().to_vec(),
        ))
    }

    /// Rebuilds the logical tensor from every worker's shard, given in rank order.
    ///
    /// Split shards are concatenated on the split axis, broadcast shards yield the first
    /// replica, and partial-sum shards are accumulated element-wise. Every shard must carry
    /// the first shard's annotation and logical shape, and hold exactly the extent
    /// [`distribute`](Self::distribute) would have handed its rank.
    pub fn assemble(shards: &[Self]) -> Result<LocalTensor<E>, SliceError> {
        let Some(first) = shards.first() else {
            return Err(SliceError::InvalidMesh(String::from("no shards to assemble")));
        };
        let sbp = match first.nd_sbp.as_slice() {
            [sbp] => *sbp,
            _ => {
                return Err(SliceError::UnsupportedDistribution {
                    arg: "shards",
                    nd_sbp: first.nd_sbp.clone(),
                    reason: String::from("only one-axis annotations assemble"),
                });
            }
        };
        let global_shape = first.global_shape.as_slice();
        let splitter = match sbp {
            Sbp::Split(axis) if axis >= global_shape.len() => {
                return Err(SliceError::SplitAxisOutOfRange {
                    axis,
                    rank: global_shape.len(),
                });
            }
            Sbp::Split(axis) => Some((axis, BalancedSplitter::new(global_shape[axis], shards.len()))),
            Sbp::Broadcast | Sbp::PartialSum => None,
        };

        for (rank, shard) in shards.iter().enumerate() {
            if shard.nd_sbp != first.nd_sbp {
                return Err(SliceError::UnsupportedDistribution {
                    arg: "shards",
                    nd_sbp: shard.nd_sbp.clone(),
                    reason: format!("shard {rank} disagrees with the first shard's {}", first.nd_sbp),
                });
            }
            if shard.global_shape != first.global_shape {
                return Err(SliceError::ShapeMismatch {
                    expected: first.global_shape.clone(),
                    got: shard.global_shape.clone(),
                });
            }
            let mut expected = first.global_shape.clone();
            if let Some((axis, splitter)) = &splitter {
                expected[*axis] = splitter.at(rank).len();
            }
            if shard.local_shard.shape() != expected.as_slice() {
                return Err(SliceError::ShapeMismatch {
                    expected,
                    got: shard.local_shard.shape().to_vec(),
                });
            }
        }

        let tensor = match (sbp, splitter) {
            (_, Some((axis, _))) => {
                let parts: Vec<_> = shards.iter().map(|s| &s.local_shard).collect();
                LocalTensor::concat(&parts, axis)
            }
            (Sbp::PartialSum, None) => {
                let mut sum = first.local_shard.clone();
                for shard in &shards[1..] {
                    for (acc, v) in sum.as_mut_slice().iter_mut().zip(shard.local_shard.as_slice()) {
                        *acc = acc.accumulate(*v);
                    }
                }
                sum
            }
            (_, None) => first.local_shard.clone(),
        };
        Ok(tensor)
    }

    /// The shard resident on this worker.
    pub fn local(&self) -> &LocalTensor<E> {
        &self.local_shard
    }

    /// Mutable access to the shard resident on this worker.
    pub fn local_mut(&mut self) -> &mut LocalTensor<E> {
        &mut self.local_shard
    }

    /// Distribution of the tensor.
    pub fn nd_sbp(&self) -> &NdSbp {
        &self.nd_sbp
    }

    /// Logical shape of the tensor.
    pub fn global_shape(&self) -> &[usize] {
        &self.global_shape
    }
}
