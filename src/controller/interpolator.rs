// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the goal interpolators used to smooth controller setpoints
//! between policy actions.

use crate::exception::{create_configuration_exception, ControlResult};
use nalgebra::{UnitQuaternion, Vector3};
use serde::Deserialize;
use serde::Serialize;

/// Configuration of a goal interpolator.
#[derive(Serialize, Deserialize, Debug, Copy, Clone)]
pub struct InterpolatorConfig {
    /// Interpolation order. Only order 1 (linear) is implemented; any other
    /// order is rejected at construction.
    pub order: u32,
    /// Fraction of the interval between two policy actions over which the
    /// setpoint ramps from the old to the new goal.
    pub ramp_ratio: f64,
}

impl Default for InterpolatorConfig {
    fn default() -> Self {
        InterpolatorConfig {
            order: 1,
            ramp_ratio: 0.2,
        }
    }
}

impl InterpolatorConfig {
    /// Number of control ticks one ramp spans.
    fn total_steps(&self, control_freq: f64, policy_freq: f64) -> u32 {
        let steps = (self.ramp_ratio * control_freq / policy_freq).ceil();
        (steps as u32).max(1)
    }

    /// # Errors
    /// * ConfigurationException for any order other than 1.
    fn validate(&self) -> ControlResult<()> {
        if self.order != 1 {
            return Err(create_configuration_exception(
                "only linear (order 1) interpolation is implemented",
            ));
        }
        if self.ramp_ratio <= 0. || self.ramp_ratio > 1. {
            return Err(create_configuration_exception(
                "interpolator ramp ratio must be in (0, 1]",
            ));
        }
        Ok(())
    }
}

/// Linear interpolator for position goals.
///
/// Each [`get_interpolated_goal`](`Self::get_interpolated_goal`) call
/// advances the ramp by one control tick. Setting a new goal restarts the
/// ramp from the last sampled value, so the emitted trajectory has no jumps.
#[derive(Debug, Clone)]
pub struct LinearInterpolator {
    start: Vector3<f64>,
    goal: Vector3<f64>,
    current: Vector3<f64>,
    total_steps: u32,
    step: u32,
}

impl LinearInterpolator {
    fn new(total_steps: u32) -> Self {
        LinearInterpolator {
            start: Vector3::zeros(),
            goal: Vector3::zeros(),
            current: Vector3::zeros(),
            total_steps,
            step: 0,
        }
    }

    /// Replaces the pending goal.
    pub fn set_goal(&mut self, goal: Vector3<f64>) {
        self.start = self.current;
        self.goal = goal;
        self.step = 0;
    }

    /// Snaps the interpolator to a value, discarding any pending ramp.
    pub fn snap_to(&mut self, value: Vector3<f64>) {
        self.start = value;
        self.goal = value;
        self.current = value;
        self.step = self.total_steps;
    }

    /// Advances one control tick and returns the interpolated value.
    pub fn get_interpolated_goal(&mut self) -> Vector3<f64> {
        if self.step < self.total_steps {
            self.step += 1;
        }
        let fraction = f64::from(self.step) / f64::from(self.total_steps);
        self.current = self.start + (self.goal - self.start) * fraction;
        self.current
    }
}

/// Linear interpolator for relative orientation goals.
///
/// Goals are relative rotations; each ramp starts at the identity rotation
/// and approaches the goal by spherical linear interpolation.
#[derive(Debug, Clone)]
pub struct LinearOriInterpolator {
    goal: UnitQuaternion<f64>,
    current: UnitQuaternion<f64>,
    total_steps: u32,
    step: u32,
}

impl LinearOriInterpolator {
    fn new(total_steps: u32) -> Self {
        LinearOriInterpolator {
            goal: UnitQuaternion::identity(),
            current: UnitQuaternion::identity(),
            total_steps,
            step: 0,
        }
    }

    /// Replaces the pending relative rotation goal and restarts the ramp at
    /// the identity rotation.
    pub fn set_goal(&mut self, goal: UnitQuaternion<f64>) {
        self.goal = goal;
        self.current = UnitQuaternion::identity();
        self.step = 0;
    }

    /// Discards any pending ramp; the interpolator reports the identity
    /// rotation until the next goal arrives.
    pub fn snap_to_identity(&mut self) {
        self.goal = UnitQuaternion::identity();
        self.current = UnitQuaternion::identity();
        self.step = self.total_steps;
    }

    /// Advances one control tick and returns the interpolated relative
    /// rotation.
    pub fn get_interpolated_goal(&mut self) -> UnitQuaternion<f64> {
        if self.step < self.total_steps {
            self.step += 1;
        }
        let fraction = f64::from(self.step) / f64::from(self.total_steps);
        self.current = UnitQuaternion::identity().slerp(&self.goal, fraction);
        self.current
    }
}

/// Interpolation state of the position axis.
///
/// The disabled case is an explicit state rather than an absent object.
#[derive(Debug, Clone)]
pub enum PositionInterpolation {
    Disabled,
    Linear(LinearInterpolator),
}

impl PositionInterpolation {
    /// Builds the interpolation state from an optional configuration.
    ///
    /// # Errors
    /// * ConfigurationException for unsupported interpolation orders.
    pub fn from_config(
        config: Option<&InterpolatorConfig>,
        control_freq: f64,
        policy_freq: f64,
    ) -> ControlResult<Self> {
        match config {
            None => Ok(PositionInterpolation::Disabled),
            Some(config) => {
                config.validate()?;
                Ok(PositionInterpolation::Linear(LinearInterpolator::new(
                    config.total_steps(control_freq, policy_freq),
                )))
            }
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, PositionInterpolation::Linear(_))
    }
}

/// Interpolation state of the orientation axis.
#[derive(Debug, Clone)]
pub enum OrientationInterpolation {
    Disabled,
    Linear(LinearOriInterpolator),
}

impl OrientationInterpolation {
    /// Builds the interpolation state from an optional configuration.
    ///
    /// # Errors
    /// * ConfigurationException for unsupported interpolation orders.
    pub fn from_config(
        config: Option<&InterpolatorConfig>,
        control_freq: f64,
        policy_freq: f64,
    ) -> ControlResult<Self> {
        match config {
            None => Ok(OrientationInterpolation::Disabled),
            Some(config) => {
                config.validate()?;
                Ok(OrientationInterpolation::Linear(LinearOriInterpolator::new(
                    config.total_steps(control_freq, policy_freq),
                )))
            }
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, OrientationInterpolation::Linear(_))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn linear(total_steps: u32) -> LinearInterpolator {
        LinearInterpolator::new(total_steps)
    }

    #[test]
    fn nonlinear_order_is_rejected() {
        let config = InterpolatorConfig {
            order: 2,
            ramp_ratio: 0.2,
        };
        assert!(PositionInterpolation::from_config(Some(&config), 500., 20.).is_err());
        assert!(OrientationInterpolation::from_config(Some(&config), 500., 20.).is_err());
    }

    #[test]
    fn absent_config_disables_interpolation() {
        let interpolation = PositionInterpolation::from_config(None, 500., 20.).unwrap();
        assert!(!interpolation.is_active());
    }

    #[test]
    fn ramp_reaches_goal_and_holds() {
        let mut interpolator = linear(4);
        interpolator.set_goal(Vector3::new(1., 0., 0.));
        let first = interpolator.get_interpolated_goal();
        assert!((first.x - 0.25).abs() < 1e-12);
        for _ in 0..3 {
            interpolator.get_interpolated_goal();
        }
        let settled = interpolator.get_interpolated_goal();
        assert!((settled.x - 1.).abs() < 1e-12);
    }

    #[test]
    fn first_tick_makes_partial_progress_only() {
        let mut interpolator = linear(10);
        interpolator.set_goal(Vector3::new(0., 0., 2.));
        let first = interpolator.get_interpolated_goal();
        assert!(first.z > 0. && first.z < 2.);
    }

    #[test]
    fn new_goal_restarts_from_last_sample() {
        let mut interpolator = linear(2);
        interpolator.set_goal(Vector3::new(1., 0., 0.));
        interpolator.get_interpolated_goal();
        interpolator.set_goal(Vector3::new(0., 1., 0.));
        let value = interpolator.get_interpolated_goal();
        // Halfway between (0.5, 0, 0) and (0, 1, 0).
        assert!((value.x - 0.25).abs() < 1e-12);
        assert!((value.y - 0.5).abs() < 1e-12);
    }

    #[test]
    fn orientation_ramp_is_partial_then_complete() {
        let goal = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        let mut interpolator = LinearOriInterpolator::new(2);
        interpolator.set_goal(goal);
        let halfway = interpolator.get_interpolated_goal();
        assert!((halfway.angle() - FRAC_PI_2 / 2.).abs() < 1e-9);
        let full = interpolator.get_interpolated_goal();
        assert!(full.angle_to(&goal) < 1e-9);
    }

    #[test]
    fn snap_discards_pending_ramp() {
        let mut interpolator = linear(5);
        interpolator.set_goal(Vector3::new(1., 1., 1.));
        interpolator.get_interpolated_goal();
        interpolator.snap_to(Vector3::new(0.2, 0., 0.));
        let value = interpolator.get_interpolated_goal();
        assert!((value - Vector3::new(0.2, 0., 0.)).norm() < 1e-12);
    }
}
