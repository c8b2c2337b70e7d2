// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the descriptors of the supported robot arms.

use crate::exception::{ControlException, ControlResult};
use crate::ik::chain::{ChainJoint, SerialChain};
use nalgebra::{Isometry3, UnitQuaternion, Vector3};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

/// Maximum joint velocity of the supported arms in \[rad/s\].
pub static MAX_JOINT_VELOCITY: [f64; 7] = [2.175, 2.175, 2.175, 2.175, 2.61, 2.61, 2.61];

/// A robot arm this crate ships a kinematic description for.
///
/// The descriptor provides everything the bundled solver and the controllers
/// need to know about the arm: degrees of freedom, joint limits, the
/// kinematic chain and the rotation offset between the last arm link and the
/// end effector.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum RobotKind {
    Panda,
}

impl RobotKind {
    /// Looks up a robot descriptor by its configured name.
    ///
    /// # Errors
    /// * ConfigurationException for unsupported robot names. Construction
    ///   fails fast instead of degrading to a default arm.
    pub fn from_name(name: &str) -> ControlResult<Self> {
        match name {
            "Panda" => Ok(RobotKind::Panda),
            _ => Err(ControlException::ConfigurationException {
                message: format!("unsupported robot: {}", name),
            }),
        }
    }

    /// Number of actuated arm joints.
    pub fn dof(&self) -> usize {
        match self {
            RobotKind::Panda => 7,
        }
    }

    /// Lower and upper joint position limits in \[rad\].
    pub fn joint_limits(&self) -> Vec<(f64, f64)> {
        match self {
            RobotKind::Panda => vec![
                (-2.8973, 2.8973),
                (-1.7628, 1.7628),
                (-2.8973, 2.8973),
                (-3.0718, -0.0698),
                (-2.8973, 2.8973),
                (-0.0175, 3.7525),
                (-2.8973, 2.8973),
            ],
        }
    }

    /// Joint configuration used as a neutral starting pose.
    pub fn rest_pose(&self) -> Vec<f64> {
        match self {
            RobotKind::Panda => vec![
                0.,
                -FRAC_PI_4,
                0.,
                -3. * FRAC_PI_4,
                0.,
                FRAC_PI_2,
                FRAC_PI_4,
            ],
        }
    }

    /// Rotational offset between the last arm link frame and the end-effector
    /// frame as an (x, y, z, w) quaternion.
    pub fn eef_rot_offset(&self) -> [f64; 4] {
        match self {
            RobotKind::Panda => {
                let offset = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), -FRAC_PI_4);
                [offset.i, offset.j, offset.k, offset.w]
            }
        }
    }

    /// Kinematic chain of the arm with its base at `base_pose`.
    pub fn chain(&self, base_pose: Isometry3<f64>) -> ControlResult<SerialChain> {
        match self {
            RobotKind::Panda => {
                let limits = self.joint_limits();
                let joints = vec![
                    ChainJoint::about_z(frame(0., 0., 0.333, 0., 0., 0.), limits[0]),
                    ChainJoint::about_z(frame(0., 0., 0., -FRAC_PI_2, 0., 0.), limits[1]),
                    ChainJoint::about_z(frame(0., -0.316, 0., FRAC_PI_2, 0., 0.), limits[2]),
                    ChainJoint::about_z(frame(0.0825, 0., 0., FRAC_PI_2, 0., 0.), limits[3]),
                    ChainJoint::about_z(frame(-0.0825, 0.384, 0., -FRAC_PI_2, 0., 0.), limits[4]),
                    ChainJoint::about_z(frame(0., 0., 0., FRAC_PI_2, 0., 0.), limits[5]),
                    ChainJoint::about_z(frame(0.088, 0., 0., FRAC_PI_2, 0., 0.), limits[6]),
                ];
                SerialChain::new(base_pose, joints, frame(0., 0., 0.107, 0., 0., 0.))
            }
        }
    }
}

fn frame(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> Isometry3<f64> {
    Isometry3::from_parts(
        Vector3::new(x, y, z).into(),
        UnitQuaternion::from_euler_angles(roll, pitch, yaw),
    )
}
