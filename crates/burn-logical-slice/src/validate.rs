//! Checks run while the operator graph is built, before any kernel executes.
//!
//! Everything here returns a [`SliceError`] instead of panicking so a graph builder can
//! reject the operator with a diagnostic. The kernels run the same checks and treat a
//! failure as fatal.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::builder::{SliceAttrs, regulate_slice_start, regulate_slice_stop, slice_len};
use crate::sharding::{DeviceMesh, NdSbp, ParallelContext, Sbp};
use crate::SliceError;

/// Output shape of a plain slice of a tensor of shape `shape`.
pub fn infer_slice_shape(shape: &[usize], attrs: &SliceAttrs) -> Result<Vec<usize>, SliceError> {
    if shape.is_empty() {
        return Err(SliceError::ScalarInput);
    }
    attrs.check(shape.len())?;
    Ok(shape
        .iter()
        .enumerate()
        .map(|(i, &dim)| {
            let dim = dim as i64;
            let step = attrs.step[i];
            let start = regulate_slice_start(attrs.start[i], dim, step);
            let stop = regulate_slice_stop(attrs.stop[i], dim, step);
            slice_len(start, stop, step) as usize
        })
        .collect())
}

/// Checks the attributes of a distribution-aware slice: one entry per axis and strictly
/// positive steps.
pub fn check_distributed_attrs(attrs: &SliceAttrs, rank: usize) -> Result<(), SliceError> {
    if rank == 0 {
        return Err(SliceError::ScalarInput);
    }
    attrs.check(rank)?;
    match attrs.step.iter().enumerate().find(|(_, step)| **step < 0) {
        Some((axis, &step)) => Err(SliceError::NonPositiveStep { axis, step }),
        None => Ok(()),
    }
}

/// Output shape of a logical slice of a tensor whose logical shape is `logical_shape`.
///
/// Every worker's `y` has this shape, whatever the distribution of `x`.
pub fn infer_logical_slice_shape(
    logical_shape: &[usize],
    attrs: &SliceAttrs,
) -> Result<Vec<usize>, SliceError> {
    check_distributed_attrs(attrs, logical_shape.len())?;
    infer_slice_shape(logical_shape, attrs)
}

/// Checks that the distributions of `x` and `y` of a logical slice pair up.
///
/// With more than one worker, on every mesh axis a split `x` needs a partial-sum `y` (each
/// worker contributes only its shard's part of the result), a broadcast `x` a broadcast `y`,
/// and a partial-sum `x` a partial-sum `y`.
pub fn check_logical_slice(
    parallel: ParallelContext,
    x_sbp: &NdSbp,
    y_sbp: &NdSbp,
) -> Result<(), SliceError> {
    if parallel.parallel_num <= 1 {
        return Ok(());
    }
    if x_sbp.len() != y_sbp.len() {
        return Err(SliceError::UnsupportedDistribution {
            arg: "y",
            nd_sbp: y_sbp.clone(),
            reason: format!("expected {} mesh axes to match `x` {x_sbp}", x_sbp.len()),
        });
    }
    for (&x, &y) in x_sbp.as_slice().iter().zip(y_sbp.as_slice()) {
        let expected = match x {
            Sbp::Split(_) | Sbp::PartialSum => Sbp::PartialSum,
            Sbp::Broadcast => Sbp::Broadcast,
        };
        if y != expected {
            return Err(SliceError::IncompatibleDistribution {
                input: "x",
                input_sbp: x,
                output: "y",
                output_sbp: y,
                expected,
            });
        }
    }
    Ok(())
}

/// Checks that `value` of a logical slice assignment is held whole by every worker.
pub fn check_logical_slice_assign(
    parallel: ParallelContext,
    value_sbp: &NdSbp,
) -> Result<(), SliceError> {
    if parallel.parallel_num > 1 && !value_sbp.is_whole() {
        return Err(SliceError::UnsupportedDistribution {
            arg: "value",
            nd_sbp: value_sbp.clone(),
            reason: String::from("value must be broadcast or partial-sum on every mesh axis"),
        });
    }
    Ok(())
}

/// Checks that `nd_sbp` describes argument `arg` with one entry per axis of `mesh`.
pub fn check_mesh_annotation<T: PartialEq>(
    mesh: &DeviceMesh<T>,
    arg: &'static str,
    nd_sbp: &NdSbp,
) -> Result<(), SliceError> {
    if nd_sbp.len() != mesh.ndim() {
        return Err(SliceError::UnsupportedDistribution {
            arg,
            nd_sbp: nd_sbp.clone(),
            reason: format!("a mesh of shape {:?} needs {} entries", mesh.shape(), mesh.ndim()),
        });
    }
    Ok(())
}

/// Checks a logical slice run by the worker of rank `rank` on `mesh`, returning its
/// [`ParallelContext`].
///
/// Both annotations must cover every mesh axis, and pair up as
/// [`check_logical_slice`] requires.
pub fn check_logical_slice_on_mesh<T: PartialEq>(
    mesh: &DeviceMesh<T>,
    rank: usize,
    x_sbp: &NdSbp,
    y_sbp: &NdSbp,
) -> Result<ParallelContext, SliceError> {
    check_mesh_annotation(mesh, "x", x_sbp)?;
    check_mesh_annotation(mesh, "y", y_sbp)?;
    let parallel = mesh.parallel_context(rank)?;
    check_logical_slice(parallel, x_sbp, y_sbp)?;
    Ok(parallel)
}

/// Checks a logical slice assignment run by the worker of rank `rank` on `mesh`, returning
/// its [`ParallelContext`].
pub fn check_logical_slice_assign_on_mesh<T: PartialEq>(
    mesh: &DeviceMesh<T>,
    rank: usize,
    ref_sbp: &NdSbp,
    value_sbp: &NdSbp,
) -> Result<ParallelContext, SliceError> {
    check_mesh_annotation(mesh, "ref", ref_sbp)?;
    check_mesh_annotation(mesh, "value", value_sbp)?;
    let parallel = mesh.parallel_context(rank)?;
    check_logical_slice_assign(parallel, value_sbp)?;
    Ok(parallel)
}
