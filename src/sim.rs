// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the simulator-facing capability trait and the controller's view
//! of the simulated arm state.
//!
//! The physics engine itself is an external collaborator. Controllers only
//! ever read joint state and the measured end-effector pose through
//! [`SimArm`] and return torque commands to the owning simulation loop.

use crate::exception::{create_configuration_exception, ControlResult};
use crate::utils::{array_to_isometry, JointVector};
use nalgebra::{Quaternion, Rotation3, UnitQuaternion, Vector3};

#[cfg(test)]
use mockall::automock;

/// Read access to the simulated robot arm.
///
/// Joint quantities are addressed through the simulator's flattened
/// position/velocity arrays; which entries belong to the controlled arm is
/// recorded once in a [`JointIndexes`] mapping.
#[cfg_attr(test, automock)]
pub trait SimArm {
    /// Joint position at the given flattened position-array index in \[rad\].
    fn qpos(&self, index: usize) -> f64;
    /// Joint velocity at the given flattened velocity-array index in \[rad/s\].
    fn qvel(&self, index: usize) -> f64;
    /// Bias torque (gravity and Coriolis) acting on the given velocity-array
    /// index in \[Nm\]. Added to commanded torques as compensation.
    fn bias_torque(&self, index: usize) -> f64;
    /// Measured end-effector pose in the robot base frame as a 4x4
    /// column-major homogeneous matrix.
    fn eef_pose(&self) -> [f64; 16];
    /// Orientation of the robot base in the world frame as an (x, y, z, w)
    /// quaternion.
    fn base_orientation(&self) -> [f64; 4];
}

/// converts an (x, y, z, w) quaternion array to a UnitQuaternion
pub fn quat_from_xyzw(quat: &[f64; 4]) -> UnitQuaternion<f64> {
    UnitQuaternion::from_quaternion(Quaternion::new(quat[3], quat[0], quat[1], quat[2]))
}

/// converts a UnitQuaternion to an (x, y, z, w) quaternion array
pub fn quat_to_xyzw(quat: &UnitQuaternion<f64>) -> [f64; 4] {
    [quat.i, quat.j, quat.k, quat.w]
}

/// Fixed association between the controlled joints and their entries in the
/// simulator's flattened joint-position, joint-velocity and actuator arrays.
///
/// Established once at controller construction and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct JointIndexes {
    /// Indexes of the controlled joints.
    pub joints: Vec<usize>,
    /// Entries of the flattened position array belonging to the joints.
    pub qpos: Vec<usize>,
    /// Entries of the flattened velocity array belonging to the joints.
    pub qvel: Vec<usize>,
}

impl JointIndexes {
    /// Creates a new JointIndexes mapping.
    ///
    /// # Errors
    /// * ConfigurationException if the index lists are empty or have
    ///   mismatched lengths.
    pub fn new(joints: Vec<usize>, qpos: Vec<usize>, qvel: Vec<usize>) -> ControlResult<Self> {
        if joints.is_empty() {
            return Err(create_configuration_exception(
                "at least one controlled joint is required",
            ));
        }
        if joints.len() != qpos.len() || joints.len() != qvel.len() {
            return Err(create_configuration_exception(
                "joint, qpos and qvel index lists must have equal lengths",
            ));
        }
        Ok(JointIndexes { joints, qpos, qvel })
    }

    /// Number of controlled joints.
    pub fn dof(&self) -> usize {
        self.joints.len()
    }
}

/// Snapshot of the arm quantities a controller works with.
///
/// Refreshed from the simulator once per control step before any control
/// computation.
#[derive(Debug, Clone)]
pub struct ArmView {
    /// Positions of the controlled joints in \[rad\].
    pub joint_pos: JointVector,
    /// Velocities of the controlled joints in \[rad/s\].
    pub joint_vel: JointVector,
    /// Measured end-effector position in the base frame in \[m\].
    pub ee_pos: Vector3<f64>,
    /// Measured end-effector orientation in the base frame.
    pub ee_ori_mat: Rotation3<f64>,
}

impl ArmView {
    /// Creates a zeroed view for the given number of joints.
    pub fn new(dof: usize) -> Self {
        ArmView {
            joint_pos: JointVector::zeros(dof),
            joint_vel: JointVector::zeros(dof),
            ee_pos: Vector3::zeros(),
            ee_ori_mat: Rotation3::identity(),
        }
    }

    /// Pulls the current joint state and end-effector pose from the
    /// simulator.
    pub fn refresh(&mut self, sim: &dyn SimArm, indexes: &JointIndexes) {
        for (i, &qpos_index) in indexes.qpos.iter().enumerate() {
            self.joint_pos[i] = sim.qpos(qpos_index);
        }
        for (i, &qvel_index) in indexes.qvel.iter().enumerate() {
            self.joint_vel[i] = sim.qvel(qvel_index);
        }
        let pose = array_to_isometry(&sim.eef_pose());
        self.ee_pos = pose.translation.vector;
        self.ee_ori_mat = pose.rotation.to_rotation_matrix();
    }

    /// Bias torques of the controlled joints in \[Nm\].
    pub fn bias_torques(&self, sim: &dyn SimArm, indexes: &JointIndexes) -> JointVector {
        JointVector::from_iterator(
            indexes.dof(),
            indexes.qvel.iter().map(|&index| sim.bias_torque(index)),
        )
    }
}
