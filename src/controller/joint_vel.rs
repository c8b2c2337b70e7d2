// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the joint-velocity controller.

use crate::controller::{ActuatorRange, Controller, Torques};
use crate::exception::{
    create_configuration_exception, ControlException, ControlResult,
};
use crate::sim::{ArmView, JointIndexes, SimArm};
use crate::utils::JointVector;

/// Default proportional gain from velocity error to torque.
pub static DEFAULT_VELOCITY_GAIN: f64 = 0.25;

/// Proportional joint-velocity controller.
///
/// Converts a joint-velocity goal into torque commands:
/// torque = bias compensation + kv * (goal - measured velocity), clipped to
/// the actuator range. Velocity goals are clipped to the configured velocity
/// limits before use.
pub struct JointVelocityController {
    indexes: JointIndexes,
    actuator_range: ActuatorRange,
    velocity_limits: [f64; 2],
    kv: f64,
    goal_velocity: JointVector,
    view: ArmView,
}

impl JointVelocityController {
    /// Creates a new JointVelocityController.
    ///
    /// # Arguments
    /// * `indexes` - Mapping of the controlled joints into the simulator's
    ///   flattened arrays.
    /// * `actuator_range` - Torque bounds of the joint actuators.
    /// * `velocity_limits` - Lower and upper bound applied to every entry of
    ///   a velocity goal in \[rad/s\].
    /// * `kv` - Proportional gain from velocity error to torque.
    /// # Errors
    /// * ConfigurationException on mismatched actuator-range lengths, an
    ///   inverted velocity-limit pair or a non-positive gain.
    pub fn new(
        indexes: JointIndexes,
        actuator_range: ActuatorRange,
        velocity_limits: [f64; 2],
        kv: f64,
    ) -> ControlResult<Self> {
        actuator_range.validate(indexes.dof())?;
        if velocity_limits[0] >= velocity_limits[1] {
            return Err(create_configuration_exception(
                "velocity limits must satisfy lower < upper",
            ));
        }
        if kv <= 0. {
            return Err(create_configuration_exception(
                "velocity gain must be positive",
            ));
        }
        let dof = indexes.dof();
        Ok(JointVelocityController {
            indexes,
            actuator_range,
            velocity_limits,
            kv,
            goal_velocity: JointVector::zeros(dof),
            view: ArmView::new(dof),
        })
    }

    /// Number of controlled joints.
    pub fn dof(&self) -> usize {
        self.indexes.dof()
    }

    /// The controller's current view of the arm state.
    pub fn view(&self) -> &ArmView {
        &self.view
    }

    /// The joint index mapping.
    pub fn indexes(&self) -> &JointIndexes {
        &self.indexes
    }

    /// The current joint-velocity goal.
    pub fn goal_velocity(&self) -> &JointVector {
        &self.goal_velocity
    }

    /// Refreshes the view of the arm state from the simulator.
    pub fn update(&mut self, sim: &dyn SimArm) {
        self.view.refresh(sim, &self.indexes);
    }

    /// Sets the joint-velocity goal, clipping each entry to the velocity
    /// limits.
    ///
    /// # Errors
    /// * ActionDimensionException if `velocities` does not have one entry per
    ///   joint.
    pub fn set_goal_velocity(&mut self, velocities: &JointVector) -> ControlResult<()> {
        if velocities.len() != self.dof() {
            return Err(ControlException::ActionDimensionException {
                expected: self.dof(),
                got: velocities.len(),
            });
        }
        for i in 0..self.dof() {
            self.goal_velocity[i] = velocities[i]
                .max(self.velocity_limits[0])
                .min(self.velocity_limits[1]);
        }
        Ok(())
    }
}

impl Controller for JointVelocityController {
    fn name(&self) -> String {
        "JOINT_VELOCITY".to_string()
    }

    fn control_dim(&self) -> usize {
        self.dof()
    }

    fn control_limits(&self) -> (JointVector, JointVector) {
        let low = JointVector::from_element(self.dof(), self.velocity_limits[0]);
        let high = JointVector::from_element(self.dof(), self.velocity_limits[1]);
        (low, high)
    }

    fn reset_goal(&mut self, sim: &dyn SimArm) {
        self.update(sim);
        self.goal_velocity = JointVector::zeros(self.dof());
    }

    fn set_goal(&mut self, sim: &dyn SimArm, action: &[f64]) -> ControlResult<()> {
        self.update(sim);
        let velocities = JointVector::from_column_slice(action);
        self.set_goal_velocity(&velocities)
    }

    fn run_controller(&mut self, sim: &dyn SimArm) -> ControlResult<Torques> {
        self.update(sim);
        let bias = self.view.bias_torques(sim, &self.indexes);
        let mut tau = vec![0.; self.dof()];
        for i in 0..self.dof() {
            let torque = bias[i] + self.kv * (self.goal_velocity[i] - self.view.joint_vel[i]);
            tau[i] = torque
                .max(self.actuator_range.low[i])
                .min(self.actuator_range.high[i]);
        }
        Ok(Torques::new(tau))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::MockSimArm;
    use crate::utils::isometry_to_array;
    use nalgebra::Isometry3;

    fn static_sim() -> MockSimArm {
        let mut sim = MockSimArm::new();
        sim.expect_qpos().returning(|_| 0.);
        sim.expect_qvel().returning(|_| 0.);
        sim.expect_bias_torque().returning(|_| 0.);
        sim.expect_eef_pose()
            .returning(|| isometry_to_array(&Isometry3::identity()));
        sim
    }

    fn controller(dof: usize) -> JointVelocityController {
        let indexes = JointIndexes::new(
            (0..dof).collect(),
            (0..dof).collect(),
            (0..dof).collect(),
        )
        .unwrap();
        JointVelocityController::new(
            indexes,
            ActuatorRange::symmetric(80., dof),
            [-1., 1.],
            DEFAULT_VELOCITY_GAIN,
        )
        .unwrap()
    }

    #[test]
    fn velocity_goal_is_clipped_to_limits() {
        let mut controller = controller(3);
        controller
            .set_goal_velocity(&JointVector::from_vec(vec![2., -3., 0.5]))
            .unwrap();
        let goal = controller.goal_velocity();
        assert_eq!(goal[0], 1.);
        assert_eq!(goal[1], -1.);
        assert_eq!(goal[2], 0.5);
    }

    #[test]
    fn wrong_goal_dimension_is_rejected() {
        let mut controller = controller(3);
        let result = controller.set_goal_velocity(&JointVector::from_vec(vec![0.1, 0.2]));
        assert!(matches!(
            result,
            Err(ControlException::ActionDimensionException {
                expected: 3,
                got: 2
            })
        ));
    }

    #[test]
    fn torque_follows_proportional_law() {
        let mut controller = controller(2);
        let sim = static_sim();
        controller
            .set_goal_velocity(&JointVector::from_vec(vec![0.8, -0.4]))
            .unwrap();
        let torques = controller.run_controller(&sim).unwrap();
        assert!((torques.tau[0] - DEFAULT_VELOCITY_GAIN * 0.8).abs() < 1e-12);
        assert!((torques.tau[1] + DEFAULT_VELOCITY_GAIN * 0.4).abs() < 1e-12);
    }

    #[test]
    fn torques_are_clipped_to_actuator_range() {
        let indexes = JointIndexes::new(vec![0], vec![0], vec![0]).unwrap();
        let mut controller = JointVelocityController::new(
            indexes,
            ActuatorRange::symmetric(0.05, 1),
            [-10., 10.],
            1.,
        )
        .unwrap();
        let sim = static_sim();
        controller
            .set_goal_velocity(&JointVector::from_vec(vec![5.]))
            .unwrap();
        let torques = controller.run_controller(&sim).unwrap();
        assert_eq!(torques.tau[0], 0.05);
    }

    #[test]
    fn reset_zeroes_the_velocity_goal() {
        let mut controller = controller(2);
        let sim = static_sim();
        controller
            .set_goal_velocity(&JointVector::from_vec(vec![0.5, 0.5]))
            .unwrap();
        controller.reset_goal(&sim);
        assert_eq!(controller.goal_velocity()[0], 0.);
        assert_eq!(controller.goal_velocity()[1], 0.);
    }
}
