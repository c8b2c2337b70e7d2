// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the controllers and their shared types.

pub mod config;
pub mod diff_ik;
pub mod interpolator;
pub mod joint_vel;
pub mod logger;

use crate::exception::{create_configuration_exception, ControlResult};
use crate::sim::SimArm;
use crate::utils::JointVector;
use serde::Deserialize;
use serde::Serialize;

/// Common interface of the controllers in this crate.
///
/// One control step consists of an optional [`set_goal`](`Self::set_goal`)
/// followed by [`run_controller`](`Self::run_controller`), invoked by the
/// owning simulation loop at a fixed control frequency. Controllers read the
/// simulator through [`SimArm`] and return torque commands; they never write
/// simulator state themselves.
pub trait Controller {
    /// Human-readable controller name.
    fn name(&self) -> String;

    /// Dimensionality of the goal vectors accepted by
    /// [`set_goal`](`Self::set_goal`).
    fn control_dim(&self) -> usize;

    /// Symmetric action bounds as a (minimum, maximum) pair of vectors of
    /// length [`control_dim`](`Self::control_dim`).
    fn control_limits(&self) -> (JointVector, JointVector);

    /// Resynchronizes the controller's goal state with the live simulator
    /// state, discarding accumulated drift.
    fn reset_goal(&mut self, sim: &dyn SimArm);

    /// Sets the internal goal state from an action vector.
    ///
    /// # Errors
    /// * ActionDimensionException if `action` does not have
    ///   [`control_dim`](`Self::control_dim`) entries.
    fn set_goal(&mut self, sim: &dyn SimArm, action: &[f64]) -> ControlResult<()>;

    /// Calculates the torques required to reach the current setpoint.
    fn run_controller(&mut self, sim: &dyn SimArm) -> ControlResult<Torques>;
}

/// Stores joint-level torque commands.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Torques {
    /// Desired torques in \[Nm\], one entry per controlled joint.
    pub tau: Vec<f64>,
}

impl Torques {
    /// Creates a new Torques instance
    /// # Arguments
    /// * `torques` - Desired joint-level torques in \[Nm\].
    pub fn new(torques: Vec<f64>) -> Self {
        Torques { tau: torques }
    }
}

impl From<JointVector> for Torques {
    fn from(vector: JointVector) -> Self {
        Torques::new(vector.iter().copied().collect())
    }
}

/// Lower and upper torque bound of every controlled actuator.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ActuatorRange {
    /// Lower torque bounds in \[Nm\].
    pub low: Vec<f64>,
    /// Upper torque bounds in \[Nm\].
    pub high: Vec<f64>,
}

impl ActuatorRange {
    /// Creates a symmetric actuator range of the given magnitude for every
    /// joint.
    pub fn symmetric(limit: f64, dof: usize) -> Self {
        ActuatorRange {
            low: vec![-limit; dof],
            high: vec![limit; dof],
        }
    }

    /// Checks that the range covers exactly `dof` actuators.
    ///
    /// # Errors
    /// * ConfigurationException on length mismatch.
    pub fn validate(&self, dof: usize) -> ControlResult<()> {
        if self.low.len() != dof || self.high.len() != dof {
            return Err(create_configuration_exception(
                "actuator range length does not match the number of joints",
            ));
        }
        Ok(())
    }
}
