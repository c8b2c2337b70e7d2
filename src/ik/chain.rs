// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the serial kinematic chain model used by the bundled solver.

use crate::exception::{create_configuration_exception, ControlResult};
use crate::utils::JointVector;
use nalgebra::{DMatrix, Isometry3, Unit, UnitQuaternion, Vector3};

/// One revolute joint of a serial chain.
#[derive(Debug, Clone)]
pub struct ChainJoint {
    /// Fixed transform from the parent joint frame to this joint frame.
    pub origin: Isometry3<f64>,
    /// Rotation axis, expressed in this joint's frame.
    pub axis: Unit<Vector3<f64>>,
    /// Lower and upper joint position limit in \[rad\].
    pub limits: (f64, f64),
}

impl ChainJoint {
    /// Creates a revolute joint rotating about the local z axis.
    pub fn about_z(origin: Isometry3<f64>, limits: (f64, f64)) -> Self {
        ChainJoint {
            origin,
            axis: Vector3::z_axis(),
            limits,
        }
    }
}

/// A fixed-base serial chain of revolute joints.
///
/// Poses are computed in the chain's world frame: the base pose, followed by
/// each joint's fixed origin and its rotation, followed by the fixed tool
/// transform from the last joint to the end effector.
#[derive(Debug, Clone)]
pub struct SerialChain {
    base: Isometry3<f64>,
    joints: Vec<ChainJoint>,
    tool: Isometry3<f64>,
}

impl SerialChain {
    /// Creates a new SerialChain.
    ///
    /// # Arguments
    /// * `base` - Pose of the chain base in the world frame.
    /// * `joints` - Joints from base to tip.
    /// * `tool` - Fixed transform from the last joint frame to the end
    ///   effector.
    /// # Errors
    /// * ConfigurationException if `joints` is empty or a joint has an
    ///   inverted limit pair.
    pub fn new(
        base: Isometry3<f64>,
        joints: Vec<ChainJoint>,
        tool: Isometry3<f64>,
    ) -> ControlResult<Self> {
        if joints.is_empty() {
            return Err(create_configuration_exception(
                "a kinematic chain needs at least one joint",
            ));
        }
        for joint in &joints {
            if joint.limits.0 > joint.limits.1 {
                return Err(create_configuration_exception(
                    "joint limits must satisfy lower <= upper",
                ));
            }
        }
        Ok(SerialChain { base, joints, tool })
    }

    /// Number of joints.
    pub fn dof(&self) -> usize {
        self.joints.len()
    }

    /// Pose of the chain base in the world frame.
    pub fn base_pose(&self) -> Isometry3<f64> {
        self.base
    }

    /// End-effector pose in the world frame for the given joint positions.
    ///
    /// # Errors
    /// * ConfigurationException if `q` does not have one entry per joint.
    pub fn forward(&self, q: &[f64]) -> ControlResult<Isometry3<f64>> {
        Ok(self.frames(q)?.1)
    }

    /// Geometric Jacobian of the end effector for the given joint positions.
    ///
    /// Rows 0..3 hold the linear part, rows 3..6 the angular part, one column
    /// per joint.
    pub fn jacobian(&self, q: &[f64]) -> ControlResult<DMatrix<f64>> {
        let (joint_frames, ee) = self.frames(q)?;
        let ee_pos = ee.translation.vector;
        let mut jacobian = DMatrix::zeros(6, self.dof());
        for (i, frame) in joint_frames.iter().enumerate() {
            let axis_world = frame.rotation * self.joints[i].axis.into_inner();
            let arm = ee_pos - frame.translation.vector;
            let linear = axis_world.cross(&arm);
            for row in 0..3 {
                jacobian[(row, i)] = linear[row];
                jacobian[(row + 3, i)] = axis_world[row];
            }
        }
        Ok(jacobian)
    }

    /// Clamps each joint position to its limits, in place.
    pub fn clamp_to_limits(&self, q: &mut JointVector) {
        for (i, joint) in self.joints.iter().enumerate() {
            q[i] = q[i].max(joint.limits.0).min(joint.limits.1);
        }
    }

    /// World frames of every joint plus the end-effector pose.
    fn frames(&self, q: &[f64]) -> ControlResult<(Vec<Isometry3<f64>>, Isometry3<f64>)> {
        if q.len() != self.dof() {
            return Err(create_configuration_exception(
                "joint vector length does not match the chain",
            ));
        }
        let mut current = self.base;
        let mut joint_frames = Vec::with_capacity(self.dof());
        for (joint, &angle) in self.joints.iter().zip(q.iter()) {
            current *= joint.origin;
            joint_frames.push(current);
            current *= Isometry3::from_parts(
                Vector3::zeros().into(),
                UnitQuaternion::from_axis_angle(&joint.axis, angle),
            );
        }
        Ok((joint_frames, current * self.tool))
    }
}
