// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the construction-time configuration of the differential IK
//! controller.

use crate::controller::interpolator::InterpolatorConfig;
use crate::exception::{create_configuration_exception, ControlResult};
use crate::robots::RobotKind;
use serde::Deserialize;
use serde::Serialize;

/// Selects how much of the end-effector orientation a controller commands.
///
/// Chosen at construction time and immutable for the controller's lifetime.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub enum OrientationMode {
    /// Position plus full 3-DOF relative rotation control (action dim 6).
    Full,
    /// Orientation pinned to a fixed reference frame (action dim 3), with an
    /// optional extra action entry for decoupled yaw control of the last
    /// joint (action dim 4).
    FixedOrientation {
        yaw: bool,
    },
}

impl OrientationMode {
    /// Dimensionality of the action vectors this mode accepts.
    pub fn control_dim(&self) -> usize {
        match self {
            OrientationMode::Full => 6,
            OrientationMode::FixedOrientation { yaw: false } => 3,
            OrientationMode::FixedOrientation { yaw: true } => 4,
        }
    }

    /// Suffix of the controller name.
    pub fn name_suffix(&self) -> &'static str {
        match self {
            OrientationMode::Full => "POSE",
            OrientationMode::FixedOrientation { .. } => "POSITION",
        }
    }
}

/// Configuration of a [`DifferentialIkController`](`crate::controller::diff_ik::DifferentialIkController`).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DiffIkConfig {
    /// Name of the controlled robot, e.g. "Panda".
    pub robot_name: String,
    /// Rotational offset between the last arm link frame and the
    /// end-effector frame as an (x, y, z, w) quaternion.
    pub eef_rot_offset: [f64; 4],
    /// Frequency at which the owning loop calls the controller in \[Hz\].
    pub control_freq: f64,
    /// Frequency at which policy actions arrive in \[Hz\].
    pub policy_freq: f64,
    /// Magnitude limit applied to positional action deltas in \[m\].
    pub ik_pos_limit: f64,
    /// Magnitude limit applied to rotational action deltas in \[rad\].
    pub ik_ori_limit: f64,
    /// Scaling of clipped positional deltas; in (0, 1\], smaller values mean
    /// less sensitivity.
    pub user_sensitivity: f64,
    /// Iteration budget of the IK backend per solve.
    pub converge_steps: usize,
    /// Orientation control mode.
    pub orientation_mode: OrientationMode,
    /// Optional interpolation of position goals.
    pub interpolator_pos: Option<InterpolatorConfig>,
    /// Optional interpolation of orientation goals.
    pub interpolator_ori: Option<InterpolatorConfig>,
    /// Proportional gain of the wrapped joint-velocity controller.
    pub kv: f64,
    /// Lower and upper bound applied to joint-velocity goals in \[rad/s\].
    pub velocity_limits: [f64; 2],
    /// Capacity of the per-tick control record log.
    pub log_size: usize,
}

impl Default for DiffIkConfig {
    fn default() -> Self {
        DiffIkConfig {
            robot_name: "Panda".to_string(),
            eef_rot_offset: RobotKind::Panda.eef_rot_offset(),
            control_freq: 500.,
            policy_freq: 20.,
            ik_pos_limit: 0.05,
            ik_ori_limit: 0.2,
            user_sensitivity: 0.3,
            converge_steps: 5,
            orientation_mode: OrientationMode::Full,
            interpolator_pos: None,
            interpolator_ori: None,
            kv: 0.25,
            velocity_limits: [-1., 1.],
            log_size: 50,
        }
    }
}

impl DiffIkConfig {
    /// Checks the configuration invariants which are independent of the
    /// simulator wiring.
    ///
    /// # Errors
    /// * ConfigurationException on out-of-range values. Interpolation orders
    ///   are checked when the interpolators are built.
    pub fn validate(&self) -> ControlResult<()> {
        if !(self.user_sensitivity > 0. && self.user_sensitivity <= 1.) {
            return Err(create_configuration_exception(
                "user sensitivity must be in (0, 1]",
            ));
        }
        if self.ik_pos_limit <= 0. || !self.ik_pos_limit.is_finite() {
            return Err(create_configuration_exception(
                "positional input limit must be positive and finite",
            ));
        }
        if self.ik_ori_limit <= 0. || !self.ik_ori_limit.is_finite() {
            return Err(create_configuration_exception(
                "orientation input limit must be positive and finite",
            ));
        }
        if self.control_freq <= 0. || self.policy_freq <= 0. {
            return Err(create_configuration_exception(
                "control and policy frequencies must be positive",
            ));
        }
        if self.converge_steps == 0 {
            return Err(create_configuration_exception(
                "the IK iteration budget must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(DiffIkConfig::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_sensitivity_is_rejected() {
        let mut config = DiffIkConfig::default();
        config.user_sensitivity = 0.;
        assert!(config.validate().is_err());
        config.user_sensitivity = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_iteration_budget_is_rejected() {
        let mut config = DiffIkConfig::default();
        config.converge_steps = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn mode_dimensions() {
        assert_eq!(OrientationMode::Full.control_dim(), 6);
        assert_eq!(
            OrientationMode::FixedOrientation { yaw: false }.control_dim(),
            3
        );
        assert_eq!(
            OrientationMode::FixedOrientation { yaw: true }.control_dim(),
            4
        );
    }
}
