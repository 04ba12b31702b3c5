use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::SliceError;

/// Represents a logical mesh dimension, identified by a unique name.
///
/// Mesh dimensions name the axes of a device mesh (data, tensor or pipeline parallelism).
/// Each entry of an [`NdSbp`](super::NdSbp) refers to one of them by position.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct MeshDim {
    /// A name that uniquely identifies the mesh dimension.
    name: String,
}

impl MeshDim {
    /// Constructs a new [`MeshDim`] with the given name.
    pub fn new<S: Into<String>>(name: S) -> Self {
        MeshDim { name: name.into() }
    }

    /// Name of the dimension.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Position of one worker inside its parallel group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParallelContext {
    /// This worker's rank (`0..parallel_num`).
    pub parallel_id: usize,
    /// Number of workers in the group.
    pub parallel_num: usize,
}

impl ParallelContext {
    /// Creates a context, checking that the rank lies inside the group.
    pub fn new(parallel_id: usize, parallel_num: usize) -> Result<Self, SliceError> {
        if parallel_id >= parallel_num {
            return Err(SliceError::RankOutOfRange {
                rank: parallel_id,
                parallel_num,
            });
        }
        Ok(Self {
            parallel_id,
            parallel_num,
        })
    }

    /// Context of a group with a single worker.
    pub fn single() -> Self {
        Self {
            parallel_id: 0,
            parallel_num: 1,
        }
    }
}

/// Represents a logical arrangement of devices used for parallel computation.
///
/// A `DeviceMesh` defines an N-dimensional topology over a set of devices, where each
/// dimension is given a unique name (e.g., `"data"`, `"model"`). Devices are stored in
/// row-major order of the mesh shape, so a device's position in `devices` is its rank in
/// the flattened parallel group.
#[derive(Clone, Debug)]
pub struct DeviceMesh<T> {
    /// Physical devices in an n-dimensional logical arrangement
    devices: Vec<T>,
    /// Shape of the logical mesh
    shape: Vec<usize>,
    /// Maps dimension names to their indices in the mesh
    dims: HashMap<MeshDim, usize>,
}

impl<T: PartialEq> DeviceMesh<T> {
    /// Shape of the mesh.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of mesh axes.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total number of workers.
    pub fn parallel_num(&self) -> usize {
        self.devices.len()
    }

    /// Index of a named mesh dimension.
    pub fn dim_index(&self, dim: &MeshDim) -> Option<usize> {
        self.dims.get(dim).copied()
    }

    /// Rank of `device` in the flattened group.
    pub fn rank_of(&self, device: &T) -> Option<usize> {
        self.devices.iter().position(|d| d == device)
    }

    /// Parallel context of the worker with the given rank.
    pub fn parallel_context(&self, rank: usize) -> Result<ParallelContext, SliceError> {
        ParallelContext::new(rank, self.parallel_num())
    }
}

/// A builder for constructing a [`DeviceMesh`].
///
/// Once every axis of the mesh shape has been given a name, the builder validates the
/// configuration and constructs the [`DeviceMesh`].
#[derive(Clone, Debug)]
pub struct DeviceMeshBuilder<T> {
    /// Physical devices in an n-dimensional logical arrangement.
    devices: Vec<T>,
    /// Shape of the logical mesh.
    shape: Vec<usize>,
    /// Maps dimension names to their indices in the mesh.
    dims: HashMap<MeshDim, usize>,
}

impl<T> DeviceMeshBuilder<T> {
    /// Creates a new [`DeviceMeshBuilder`] with the given devices and shape.
    ///
    /// # Arguments
    /// * `devices` - Devices in row-major order of the mesh.
    /// * `shape` - Extent of each mesh axis.
    pub fn new<S: Into<Vec<usize>>>(devices: Vec<T>, shape: S) -> Self {
        Self {
            devices,
            shape: shape.into(),
            dims: HashMap::new(),
        }
    }

    /// Names the mesh axis at `idx`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use burn_logical_slice::sharding::{DeviceMeshBuilder, MeshDim};
    ///
    /// let mesh = DeviceMeshBuilder::new(vec![0, 1, 2, 3], [2, 2])
    ///     .with_dim(0, MeshDim::new("data_parallel"))
    ///     .with_dim(1, MeshDim::new("tensor_parallel"))
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(mesh.parallel_num(), 4);
    /// ```
    pub fn with_dim(mut self, idx: usize, dim: MeshDim) -> Self {
        self.dims.insert(dim, idx);
        self
    }

    /// Builds a [`DeviceMesh`] from the current configuration.
    ///
    /// Fails when a name points past the mesh rank, when an axis is named twice or left
    /// unnamed, or when the device count does not fill the mesh shape.
    pub fn build(self) -> Result<DeviceMesh<T>, SliceError> {
        let ndim = self.shape.len();
        let mut names: Vec<Option<&MeshDim>> = vec![None; ndim];
        for (dim, &idx) in &self.dims {
            let Some(slot) = names.get_mut(idx) else {
                return Err(SliceError::InvalidDimension(format!(
                    "`{}` names axis {idx} of a rank-{ndim} mesh",
                    dim.name()
                )));
            };
            if let Some(other) = slot.replace(dim) {
                return Err(SliceError::InvalidDimension(format!(
                    "axis {idx} is named both `{}` and `{}`",
                    other.name(),
                    dim.name()
                )));
            }
        }
        if let Some(idx) = names.iter().position(Option::is_none) {
            return Err(SliceError::InvalidMesh(format!("mesh axis {idx} has no name")));
        }

        let capacity = self.shape.iter().product::<usize>();
        if self.devices.len() != capacity {
            return Err(SliceError::InvalidMesh(format!(
                "{} devices cannot fill a mesh of shape {:?}",
                self.devices.len(),
                self.shape
            )));
        }

        Ok(DeviceMesh {
            devices: self.devices,
            shape: self.shape,
            dims: self.dims,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_device_mesh_1d() {
        let mesh = DeviceMeshBuilder::new(vec!["gpu:0", "gpu:1", "gpu:2"], [3])
            .with_dim(0, MeshDim::new("tp"))
            .build()
            .unwrap();

        assert_eq!(mesh.parallel_num(), 3);
        assert_eq!(mesh.dim_index(&MeshDim::new("tp")), Some(0));
        assert_eq!(mesh.rank_of(&"gpu:2"), Some(2));
        assert_eq!(
            mesh.parallel_context(1).unwrap(),
            ParallelContext {
                parallel_id: 1,
                parallel_num: 3
            }
        );
        assert_eq!(
            mesh.parallel_context(3),
            Err(SliceError::RankOutOfRange {
                rank: 3,
                parallel_num: 3
            })
        );
    }

    #[test]
    #[should_panic = "InvalidDimension(\"`y` names axis 2 of a rank-2 mesh\")"]
    fn test_device_mesh_dim_should_be_in_bound() {
        let _mesh = DeviceMeshBuilder::new(vec![0, 1, 2, 3], [2, 2])
            .with_dim(0, MeshDim::new("x"))
            .with_dim(2, MeshDim::new("y")) // out of bounds
            .build()
            .unwrap();
    }

    #[test]
    #[should_panic = "InvalidDimension(\"axis 0 is named both"]
    fn test_device_mesh_dim_should_be_unique() {
        let _mesh = DeviceMeshBuilder::new(vec![0, 1, 2, 3], [2, 2])
            .with_dim(0, MeshDim::new("x"))
            .with_dim(0, MeshDim::new("y")) // already mapped
            .build()
            .unwrap();
    }

    #[test]
    #[should_panic = "InvalidMesh(\"mesh axis 0 has no name\")"]
    fn test_device_mesh_dim_name_should_be_unique() {
        let _mesh = DeviceMeshBuilder::new(vec![0, 1, 2, 3], [2, 2])
            .with_dim(0, MeshDim::new("x"))
            .with_dim(1, MeshDim::new("x")) // same name is invalid
            .build()
            .unwrap();
    }

    #[test]
    #[should_panic = "InvalidMesh(\"4 devices cannot fill a mesh of shape [3, 2]\")"]
    fn test_device_mesh_devices_should_match_shape() {
        let _mesh = DeviceMeshBuilder::new(vec![0, 1, 2, 3], [3, 2])
            .with_dim(0, MeshDim::new("x"))
            .with_dim(1, MeshDim::new("y"))
            .build()
            .unwrap();
    }
}
