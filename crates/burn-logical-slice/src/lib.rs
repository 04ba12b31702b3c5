#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Slice kernels for Burn tensors, including tensors distributed across a parallel group.
//!
//! The plain kernels ([`slice`], [`slice_grad`], [`slice_update`]) work on a tensor a single
//! worker holds whole. [`LogicalSliceKernel`] and [`LogicalSliceAssignKernel`] address a
//! slice of the *logical* tensor while every worker only holds its shard, as described by
//! the [`sharding`] annotations.

extern crate alloc;

mod builder;
mod element;
mod engine;
mod error;
mod index;
mod kernels;
mod memory;
mod params;
mod tensor;
mod validate;

pub mod sharding;

pub use builder::*;
pub use element::*;
pub use engine::*;
pub use error::*;
pub use index::*;
pub use kernels::*;
pub use memory::*;
pub use params::*;
pub use tensor::*;
pub use validate::*;
