//! Distribution annotations, device meshes and the partition of sharded tensors.

mod context;
mod mesh;
mod partition;
mod spec;

pub use context::*;
pub use mesh::*;
pub use partition::*;
pub use spec::*;
