// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the inverse kinematics backend capability and the bundled
//! numerical solver.

pub mod chain;
pub mod dls;

use crate::exception::ControlResult;
use crate::utils::JointVector;
use nalgebra::{Isometry3, UnitQuaternion, Vector3};

/// Capability contract of an inverse kinematics backend.
///
/// A backend maps a target end-effector pose, expressed in the backend's
/// world frame, to a joint configuration within the joint limits. Any
/// concrete solver (analytic, numeric iterative, learned) implementing this
/// trait can be plugged into a
/// [`DifferentialIkController`](`crate::controller::diff_ik::DifferentialIkController`).
///
/// Implementations must be deterministic: identical targets, seeds and
/// internal solver state must produce identical solutions, so that control
/// runs are reproducible in tests.
pub trait IkBackend {
    /// Number of joints of the backend's kinematic model.
    fn dof(&self) -> usize;

    /// Pose of the robot base in the backend's world frame.
    ///
    /// Targets handed to [`solve`](`Self::solve`) are expressed in the world
    /// frame; callers working in the base frame transform through this pose.
    fn base_pose(&self) -> Isometry3<f64>;

    /// Computes a joint configuration which places the end effector at or
    /// near the target pose.
    ///
    /// # Arguments
    /// * `target_position` - Desired end-effector position in the world frame.
    /// * `target_orientation` - Desired end-effector orientation in the world
    ///   frame.
    /// * `seed` - Joint configuration to start converging from, one entry per
    ///   joint.
    /// * `max_iterations` - Iteration budget. Solvers must never iterate past
    ///   this bound.
    ///
    /// # Errors
    /// * `IkConvergenceException` if no usable solution can be produced. A
    ///   solution vector with any other length than [`dof`](`Self::dof`) is
    ///   never returned.
    fn solve(
        &mut self,
        target_position: &Vector3<f64>,
        target_orientation: &UnitQuaternion<f64>,
        seed: &[f64],
        max_iterations: usize,
    ) -> ControlResult<JointVector>;
}
