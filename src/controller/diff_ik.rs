// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the differential inverse kinematics controller.

use crate::controller::config::{DiffIkConfig, OrientationMode};
use crate::controller::interpolator::{OrientationInterpolation, PositionInterpolation};
use crate::controller::joint_vel::JointVelocityController;
use crate::controller::logger::{ControlLogger, Record};
use crate::controller::{ActuatorRange, Controller, Torques};
use crate::exception::{
    create_configuration_exception, ControlException, ControlResult,
};
use crate::ik::IkBackend;
use crate::robots::RobotKind;
use crate::sim::{quat_from_xyzw, JointIndexes, SimArm};
use crate::utils::{
    axis_angle_to_quat, clip_rotation, clip_translation, orientation_error, JointVector,
};
use nalgebra::{Isometry3, Matrix3, Rotation3, UnitQuaternion, Vector3};

/// Proportional gain from commanded joint positions to the joint-velocity
/// command.
pub static IK_P_GAIN: f64 = 10.0;

/// Reference frame the end effector is pinned to when orientation is not
/// controlled: gripper facing straight down.
fn fixed_reference_orientation() -> Rotation3<f64> {
    Rotation3::from_matrix_unchecked(Matrix3::new(0., 1., 0., 1., 0., 0., 0., 0., -1.))
}

/// Goal state of a [`DifferentialIkController`].
///
/// All fields are written by exactly one state transition per control step,
/// so snapshots taken between steps are consistent. `tick` counts the
/// completed control steps.
#[derive(Debug, Clone)]
pub struct IkControllerState {
    /// Number of completed control steps.
    pub tick: u64,
    /// Target end-effector position in the base frame. Kept as an explicit
    /// reference to prevent drift over time.
    pub reference_target_pos: Vector3<f64>,
    /// Target end-effector orientation. Always a unit quaternion.
    pub reference_target_orn: UnitQuaternion<f64>,
    /// Accumulated target position in the IK backend's frame.
    pub ik_robot_target_pos: Vector3<f64>,
    /// Accumulated target orientation in the IK backend's frame.
    pub ik_robot_target_orn: UnitQuaternion<f64>,
    /// Joint position targets produced by the IK backend, one entry per
    /// controlled joint.
    pub commanded_joint_positions: JointVector,
    /// Joint velocity commands derived from the proportional law.
    pub commanded_joint_velocities: JointVector,
}

/// Controller for controlling a robot arm via inverse kinematics. Allows
/// position and orientation control of the robot's end effector.
///
/// Control input actions are relative to the current position / orientation
/// of the end effector and are taken as the array
/// (x_dpos, y_dpos, z_dpos, x_rot, y_rot, z_rot) in full-pose mode.
///
/// The controller wraps a [`JointVelocityController`]: each action is turned
/// into target joint positions by the IK backend and into a joint-velocity
/// goal by a proportional law with gain [`IK_P_GAIN`]; the wrapped controller
/// converts that goal into torques once per tick.
pub struct DifferentialIkController<Backend: IkBackend> {
    robot: RobotKind,
    mode: OrientationMode,
    ik_pos_limit: f64,
    ik_ori_limit: f64,
    user_sensitivity: f64,
    converge_steps: usize,
    eef_rot_offset: Rotation3<f64>,
    base_orn_offset_inv: Rotation3<f64>,
    joint_vel: JointVelocityController,
    backend: Backend,
    state: IkControllerState,
    interpolator_pos: PositionInterpolation,
    interpolator_ori: OrientationInterpolation,
    /// Orientation snapshot taken when an interpolated orientation goal was
    /// set; origin of the running relative-orientation measurement.
    ori_ref: Option<Rotation3<f64>>,
    relative_ori: Vector3<f64>,
    logger: ControlLogger,
}

impl<Backend: IkBackend> DifferentialIkController<Backend> {
    /// Creates a new DifferentialIkController and synchronizes its goal
    /// state with the live simulator state.
    ///
    /// # Arguments
    /// * `sim` - Simulator the controller will pull robot state updates from.
    /// * `config` - Construction-time configuration.
    /// * `indexes` - Mapping of the controlled joints into the simulator's
    ///   flattened arrays.
    /// * `actuator_range` - Torque bounds of the joint actuators.
    /// * `backend` - Inverse kinematics backend.
    ///
    /// # Errors
    /// * ConfigurationException for an unsupported robot name, an
    ///   unimplemented interpolation order, or any dimension mismatch
    ///   between robot, joint indexes and backend.
    pub fn new(
        sim: &dyn SimArm,
        config: DiffIkConfig,
        indexes: JointIndexes,
        actuator_range: ActuatorRange,
        backend: Backend,
    ) -> ControlResult<Self> {
        config.validate()?;
        let robot = RobotKind::from_name(&config.robot_name)?;
        if backend.dof() != indexes.dof() {
            return Err(create_configuration_exception(
                "IK backend does not match the number of controlled joints",
            ));
        }
        let interpolator_pos = PositionInterpolation::from_config(
            config.interpolator_pos.as_ref(),
            config.control_freq,
            config.policy_freq,
        )?;
        let interpolator_ori = OrientationInterpolation::from_config(
            config.interpolator_ori.as_ref(),
            config.control_freq,
            config.policy_freq,
        )?;
        let dof = indexes.dof();
        let joint_vel = JointVelocityController::new(
            indexes,
            actuator_range,
            config.velocity_limits,
            config.kv,
        )?;

        let mut controller = DifferentialIkController {
            robot,
            mode: config.orientation_mode,
            ik_pos_limit: config.ik_pos_limit,
            ik_ori_limit: config.ik_ori_limit,
            user_sensitivity: config.user_sensitivity,
            converge_steps: config.converge_steps,
            eef_rot_offset: quat_from_xyzw(&config.eef_rot_offset).to_rotation_matrix(),
            base_orn_offset_inv: quat_from_xyzw(&sim.base_orientation())
                .to_rotation_matrix()
                .inverse(),
            joint_vel,
            backend,
            state: IkControllerState {
                tick: 0,
                reference_target_pos: Vector3::zeros(),
                reference_target_orn: UnitQuaternion::identity(),
                ik_robot_target_pos: Vector3::zeros(),
                ik_robot_target_orn: UnitQuaternion::identity(),
                commanded_joint_positions: JointVector::zeros(dof),
                commanded_joint_velocities: JointVector::zeros(dof),
            },
            interpolator_pos,
            interpolator_ori,
            ori_ref: None,
            relative_ori: Vector3::zeros(),
            logger: ControlLogger::new(config.log_size),
        };
        Controller::reset_goal(&mut controller, sim);
        Ok(controller)
    }

    /// The robot this controller was configured for.
    pub fn robot(&self) -> RobotKind {
        self.robot
    }

    /// The controller's goal state.
    pub fn state(&self) -> &IkControllerState {
        &self.state
    }

    /// Relative orientation traveled since the last orientation goal was
    /// set, as a scaled axis-angle vector. Zero while no interpolated
    /// orientation goal is pending.
    pub fn relative_ori(&self) -> Vector3<f64> {
        self.relative_ori
    }

    /// Returns the recorded control records and empties the log.
    pub fn flush_log(&mut self) -> Vec<Record> {
        self.logger.flush()
    }

    /// Returns joint velocities to control the robot after the target end
    /// effector position and orientation are updated from the arguments.
    ///
    /// # Arguments
    /// * `dpos` - Desired change of the end-effector position.
    /// * `rotation` - Desired rotation relative to the current end-effector
    ///   orientation.
    /// * `desired_rotation` - Absolute desired end-effector orientation,
    ///   used when no relative rotation is given.
    /// * `z_rot` - Optional decoupled yaw target; overrides the last joint's
    ///   commanded position with its current angle plus `z_rot`.
    /// * `update_targets` - Whether to accumulate into the persisted IK
    ///   target pose.
    ///
    /// # Errors
    /// * MissingInputException if neither `dpos` nor any rotation input is
    ///   supplied.
    /// * IkConvergenceException if the backend cannot produce a full-length
    ///   solution.
    pub fn get_control(
        &mut self,
        dpos: Option<&Vector3<f64>>,
        rotation: Option<&Rotation3<f64>>,
        desired_rotation: Option<&Rotation3<f64>>,
        z_rot: Option<f64>,
        update_targets: bool,
    ) -> ControlResult<JointVector> {
        if dpos.is_none() && rotation.is_none() && desired_rotation.is_none() {
            return Err(ControlException::MissingInputException);
        }
        let dpos = dpos.copied().unwrap_or_else(Vector3::zeros);
        let positions =
            self.joint_positions_for_eef_command(&dpos, rotation, desired_rotation, update_targets)?;
        self.state.commanded_joint_positions = positions;

        if let Some(z_rot) = z_rot {
            let last = self.joint_vel.dof() - 1;
            self.state.commanded_joint_positions[last] =
                self.joint_vel.view().joint_pos[last] + z_rot;
        }

        // P controller from joint positions (from IK) to velocities
        let dof = self.joint_vel.dof();
        let mut velocities = JointVector::zeros(dof);
        for i in 0..dof {
            let delta =
                self.joint_vel.view().joint_pos[i] - self.state.commanded_joint_positions[i];
            velocities[i] = -IK_P_GAIN * delta;
        }
        self.state.commanded_joint_velocities = velocities.clone();
        Ok(velocities)
    }

    /// Runs inverse kinematics to back out target joint positions from the
    /// provided end-effector command.
    ///
    /// The command is expressed in the controller's reference frame: the
    /// rotation input is composed with the inverse base orientation offset
    /// and the end-effector rotation offset, the target pose is converted
    /// into the backend's world frame through the backend's base pose, and
    /// the backend converges from the current joint positions within the
    /// configured iteration budget.
    ///
    /// # Errors
    /// * MissingInputException if no rotation input is supplied.
    /// * IkConvergenceException if the backend fails or returns a solution
    ///   of the wrong length.
    pub fn joint_positions_for_eef_command(
        &mut self,
        dpos: &Vector3<f64>,
        rotation: Option<&Rotation3<f64>>,
        desired_rotation: Option<&Rotation3<f64>>,
        update_targets: bool,
    ) -> ControlResult<JointVector> {
        let ee_pos = self.joint_vel.view().ee_pos;
        let ee_ori_mat = self.joint_vel.view().ee_ori_mat;

        let target_rotation = match rotation {
            Some(relative) => {
                self.base_orn_offset_inv * ee_ori_mat * *relative * self.eef_rot_offset
            }
            None => {
                let desired = desired_rotation.ok_or(ControlException::MissingInputException)?;
                self.base_orn_offset_inv * *desired * self.eef_rot_offset
            }
        };
        let target_orn = UnitQuaternion::from_rotation_matrix(&target_rotation);

        // With an interpolator the command is anchored to the live pose;
        // without one it accumulates on the persisted IK target.
        let target_pos =
            if self.interpolator_pos.is_active() || self.interpolator_ori.is_active() {
                ee_pos + dpos
            } else {
                self.state.ik_robot_target_pos + dpos
            };

        // convert from target pose in base frame to target pose in the
        // backend's world frame
        let world_target = self.backend.base_pose()
            * Isometry3::from_parts(target_pos.into(), target_orn);

        if update_targets {
            self.state.ik_robot_target_pos += dpos;
            self.state.ik_robot_target_orn = target_orn;
        }

        let solution = self.backend.solve(
            &world_target.translation.vector,
            &world_target.rotation,
            self.joint_vel.view().joint_pos.as_slice(),
            self.converge_steps,
        )?;
        if solution.len() != self.joint_vel.dof() {
            return Err(ControlException::IkConvergenceException {
                residual: f64::INFINITY,
                iterations: self.converge_steps,
            });
        }
        Ok(solution)
    }

    /// The one state transition which moves the reference targets.
    fn apply_goal_update(&mut self, scaled_dpos: Vector3<f64>, orientation: UnitQuaternion<f64>) {
        self.state.reference_target_pos += scaled_dpos;
        self.state.reference_target_orn =
            UnitQuaternion::new_normalize(orientation.into_inner());
    }

    /// Clips a raw action into the configured input range.
    ///
    /// Zero positional deltas skip the clipping entirely; rotational deltas
    /// at or below numeric epsilon become the identity rotation.
    fn clip_ik_input(
        &self,
        dpos: &Vector3<f64>,
        rotation: Option<&Vector3<f64>>,
    ) -> (Vector3<f64>, UnitQuaternion<f64>) {
        let dpos = if dpos.norm() > 0. {
            clip_translation(dpos, self.ik_pos_limit).0
        } else {
            *dpos
        };
        let dquat = match rotation {
            Some(axis_angle) => clip_rotation(&axis_angle_to_quat(axis_angle), self.ik_ori_limit).0,
            None => UnitQuaternion::identity(),
        };
        (dpos, dquat)
    }
}

impl<Backend: IkBackend> Controller for DifferentialIkController<Backend> {
    fn name(&self) -> String {
        format!("DIFFERENTIAL_IK_{}", self.mode.name_suffix())
    }

    fn control_dim(&self) -> usize {
        self.mode.control_dim()
    }

    fn control_limits(&self) -> (JointVector, JointVector) {
        let mut max_limit = vec![self.ik_pos_limit; 3];
        match self.mode {
            OrientationMode::Full => max_limit.extend_from_slice(&[self.ik_ori_limit; 3]),
            OrientationMode::FixedOrientation { yaw: true } => max_limit.push(self.ik_ori_limit),
            OrientationMode::FixedOrientation { yaw: false } => {}
        }
        let high = JointVector::from_vec(max_limit);
        (-&high, high)
    }

    /// Resets the goal to the current pose of the robot.
    ///
    /// Clears the accumulated reference and backend-frame targets, pending
    /// interpolator ramps and the velocity goal, so an immediately following
    /// [`run_controller`](`Controller::run_controller`) commands (near-)zero
    /// velocities.
    fn reset_goal(&mut self, sim: &dyn SimArm) {
        self.joint_vel.update(sim);
        let ee_pos = self.joint_vel.view().ee_pos;
        let ee_ori_mat = self.joint_vel.view().ee_ori_mat;
        let joint_pos = self.joint_vel.view().joint_pos.clone();
        let dof = self.joint_vel.dof();

        self.state.reference_target_pos = ee_pos;
        self.state.reference_target_orn = UnitQuaternion::from_rotation_matrix(&ee_ori_mat);
        self.state.ik_robot_target_pos = ee_pos;
        self.state.ik_robot_target_orn = UnitQuaternion::from_rotation_matrix(
            &(self.base_orn_offset_inv * ee_ori_mat * self.eef_rot_offset),
        );
        self.state.commanded_joint_positions = joint_pos;
        self.state.commanded_joint_velocities = JointVector::zeros(dof);

        if let PositionInterpolation::Linear(interpolator) = &mut self.interpolator_pos {
            interpolator.snap_to(ee_pos);
        }
        if let OrientationInterpolation::Linear(interpolator) = &mut self.interpolator_ori {
            interpolator.snap_to_identity();
        }
        self.ori_ref = None;
        self.relative_ori = Vector3::zeros();

        self.joint_vel.reset_goal(sim);
    }

    /// Sets the internal goal state of this controller based on the action.
    ///
    /// The positional part of the action is clipped to the configured input
    /// limit and scaled by the user sensitivity; the rotational part is
    /// clipped to the orientation limit. The clipped deltas accumulate into
    /// the reference targets, feed the interpolators when configured, and
    /// the resulting joint velocities become the goal of the wrapped
    /// joint-velocity controller.
    fn set_goal(&mut self, sim: &dyn SimArm, action: &[f64]) -> ControlResult<()> {
        self.joint_vel.update(sim);
        if action.len() != self.control_dim() {
            return Err(ControlException::ActionDimensionException {
                expected: self.control_dim(),
                got: action.len(),
            });
        }
        let ee_ori_mat = self.joint_vel.view().ee_ori_mat;
        let dpos_raw = Vector3::new(action[0], action[1], action[2]);
        let old_reference_pos = self.state.reference_target_pos;

        let velocities = match self.mode {
            OrientationMode::Full => {
                let rotation_delta = Vector3::new(action[3], action[4], action[5]);
                let (dpos, dquat) = self.clip_ik_input(&dpos_raw, Some(&rotation_delta));
                let scaled_dpos = dpos * self.user_sensitivity;

                let new_orientation = self.state.reference_target_orn * dquat;
                self.apply_goal_update(scaled_dpos, new_orientation);

                if let PositionInterpolation::Linear(interpolator) = &mut self.interpolator_pos {
                    // Absolute position goal
                    interpolator.set_goal(scaled_dpos + old_reference_pos);
                }
                if let OrientationInterpolation::Linear(interpolator) = &mut self.interpolator_ori
                {
                    // goal is the relative change in orientation
                    interpolator.set_goal(dquat);
                    self.ori_ref = Some(ee_ori_mat);
                    self.relative_ori = Vector3::zeros();
                }

                let rotation = dquat.to_rotation_matrix();
                self.get_control(Some(&scaled_dpos), Some(&rotation), None, None, true)?
            }
            OrientationMode::FixedOrientation { yaw } => {
                let (dpos, _) = self.clip_ik_input(&dpos_raw, None);
                let scaled_dpos = dpos * self.user_sensitivity;

                let set_ori = fixed_reference_orientation();
                self.apply_goal_update(
                    scaled_dpos,
                    UnitQuaternion::from_rotation_matrix(&set_ori),
                );

                if let PositionInterpolation::Linear(interpolator) = &mut self.interpolator_pos {
                    interpolator.set_goal(scaled_dpos + old_reference_pos);
                }
                if let OrientationInterpolation::Linear(interpolator) = &mut self.interpolator_ori
                {
                    // orientation is pinned; no relative change to ramp over
                    interpolator.set_goal(UnitQuaternion::identity());
                    self.ori_ref = Some(ee_ori_mat);
                    self.relative_ori = Vector3::zeros();
                }

                let z_rot = if yaw {
                    Some(self.ik_ori_limit * action[3])
                } else {
                    None
                };
                self.get_control(Some(&scaled_dpos), None, Some(&set_ori), z_rot, true)?
            }
        };
        self.joint_vel.set_goal_velocity(&velocities)
    }

    /// Calculates the torques required to reach the desired setpoint.
    ///
    /// When an interpolator is active, the velocity goal is recomputed from
    /// the interpolated pose each tick, so repeated calls walk the end
    /// effector toward the goal instead of jumping there. Without
    /// interpolators the velocity goal set by the last
    /// [`set_goal`](`Controller::set_goal`) is reused unchanged.
    fn run_controller(&mut self, sim: &dyn SimArm) -> ControlResult<Torques> {
        self.joint_vel.update(sim);
        let ee_pos = self.joint_vel.view().ee_pos;
        let ee_ori_mat = self.joint_vel.view().ee_ori_mat;

        let mut update_velocity_goal = false;
        let desired_pos = match &mut self.interpolator_pos {
            PositionInterpolation::Linear(interpolator) => {
                update_velocity_goal = true;
                interpolator.get_interpolated_goal()
            }
            PositionInterpolation::Disabled => self.state.reference_target_pos,
        };
        let relative_rotation = match &mut self.interpolator_ori {
            OrientationInterpolation::Linear(interpolator) => {
                update_velocity_goal = true;
                Some(interpolator.get_interpolated_goal().to_rotation_matrix())
            }
            OrientationInterpolation::Disabled => None,
        };
        if relative_rotation.is_some() {
            if let Some(ori_ref) = self.ori_ref {
                // relative orientation based on difference between current
                // ori and ref
                self.relative_ori = orientation_error(&ee_ori_mat, &ori_ref);
            }
        }

        // Only update the velocity goals if we're interpolating
        if update_velocity_goal {
            let dpos = desired_pos - ee_pos;
            let velocities = match &relative_rotation {
                Some(rotation) => {
                    let rotation = *rotation;
                    self.get_control(Some(&dpos), Some(&rotation), None, None, false)?
                }
                None => {
                    let reference = self.state.reference_target_orn.to_rotation_matrix();
                    self.get_control(Some(&dpos), None, Some(&reference), None, false)?
                }
            };
            self.joint_vel.set_goal_velocity(&velocities)?;
        }

        self.state.tick += 1;
        let torques = self.joint_vel.run_controller(sim)?;
        self.logger.log(&self.state, &torques);
        Ok(torques)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ik::dls::DlsIkSolver;
    use crate::sim::MockSimArm;
    use crate::utils::isometry_to_array;
    use nalgebra::Isometry3;

    /// Backend of a toy gantry robot whose three joints are the Cartesian
    /// target coordinates.
    struct GantryBackend;

    impl IkBackend for GantryBackend {
        fn dof(&self) -> usize {
            3
        }
        fn base_pose(&self) -> Isometry3<f64> {
            Isometry3::identity()
        }
        fn solve(
            &mut self,
            target_position: &Vector3<f64>,
            _target_orientation: &UnitQuaternion<f64>,
            _seed: &[f64],
            _max_iterations: usize,
        ) -> ControlResult<JointVector> {
            Ok(JointVector::from_vec(vec![
                target_position.x,
                target_position.y,
                target_position.z,
            ]))
        }
    }

    /// Backend which claims three joints but delivers two.
    struct ShortBackend;

    impl IkBackend for ShortBackend {
        fn dof(&self) -> usize {
            3
        }
        fn base_pose(&self) -> Isometry3<f64> {
            Isometry3::identity()
        }
        fn solve(
            &mut self,
            _target_position: &Vector3<f64>,
            _target_orientation: &UnitQuaternion<f64>,
            _seed: &[f64],
            _max_iterations: usize,
        ) -> ControlResult<JointVector> {
            Ok(JointVector::from_vec(vec![0., 0.]))
        }
    }

    fn static_sim() -> MockSimArm {
        let mut sim = MockSimArm::new();
        sim.expect_qpos().returning(|_| 0.);
        sim.expect_qvel().returning(|_| 0.);
        sim.expect_bias_torque().returning(|_| 0.);
        sim.expect_eef_pose()
            .returning(|| isometry_to_array(&Isometry3::identity()));
        sim.expect_base_orientation().returning(|| [0., 0., 0., 1.]);
        sim
    }

    fn gantry_config(mode: OrientationMode) -> DiffIkConfig {
        DiffIkConfig {
            eef_rot_offset: [0., 0., 0., 1.],
            orientation_mode: mode,
            ..DiffIkConfig::default()
        }
    }

    fn gantry_indexes() -> JointIndexes {
        JointIndexes::new(vec![0, 1, 2], vec![0, 1, 2], vec![0, 1, 2]).unwrap()
    }

    fn gantry_controller(
        sim: &MockSimArm,
        config: DiffIkConfig,
    ) -> DifferentialIkController<GantryBackend> {
        DifferentialIkController::new(
            sim,
            config,
            gantry_indexes(),
            ActuatorRange::symmetric(80., 3),
            GantryBackend,
        )
        .unwrap()
    }

    #[test]
    fn unsupported_robot_name_is_rejected() {
        let sim = static_sim();
        let mut config = gantry_config(OrientationMode::Full);
        config.robot_name = "Sawyer".to_string();
        let result = DifferentialIkController::new(
            &sim,
            config,
            gantry_indexes(),
            ActuatorRange::symmetric(80., 3),
            GantryBackend,
        );
        assert!(matches!(
            result,
            Err(ControlException::ConfigurationException { .. })
        ));
    }

    #[test]
    fn backend_dof_mismatch_is_rejected() {
        let sim = static_sim();
        let config = DiffIkConfig::default();
        let indexes =
            JointIndexes::new((0..7).collect(), (0..7).collect(), (0..7).collect()).unwrap();
        let result = DifferentialIkController::new(
            &sim,
            config,
            indexes,
            ActuatorRange::symmetric(80., 7),
            GantryBackend,
        );
        assert!(matches!(
            result,
            Err(ControlException::ConfigurationException { .. })
        ));
    }

    #[test]
    fn control_limits_match_control_dim() {
        let sim = static_sim();
        for mode in [
            OrientationMode::Full,
            OrientationMode::FixedOrientation { yaw: false },
            OrientationMode::FixedOrientation { yaw: true },
        ]
        .iter()
        {
            let mut config = gantry_config(*mode);
            config.robot_name = "Panda".to_string();
            let controller = gantry_controller(&sim, config);
            let (low, high) = controller.control_limits();
            assert_eq!(low.len(), controller.control_dim());
            assert_eq!(high.len(), controller.control_dim());
            for i in 0..low.len() {
                assert_eq!(low[i], -high[i]);
            }
        }
    }

    #[test]
    fn name_encodes_orientation_mode() {
        let sim = static_sim();
        let pose = gantry_controller(&sim, gantry_config(OrientationMode::Full));
        assert_eq!(pose.name(), "DIFFERENTIAL_IK_POSE");
        let position = gantry_controller(
            &sim,
            gantry_config(OrientationMode::FixedOrientation { yaw: false }),
        );
        assert_eq!(position.name(), "DIFFERENTIAL_IK_POSITION");
    }

    #[test]
    fn wrong_action_dimension_is_rejected() {
        let sim = static_sim();
        let mut controller = gantry_controller(&sim, gantry_config(OrientationMode::Full));
        let result = controller.set_goal(&sim, &[0.1, 0., 0.]);
        assert!(matches!(
            result,
            Err(ControlException::ActionDimensionException {
                expected: 6,
                got: 3
            })
        ));
    }

    #[test]
    fn positional_input_is_clipped_then_scaled() {
        let sim = static_sim();
        let mut controller = gantry_controller(&sim, gantry_config(OrientationMode::Full));
        controller
            .set_goal(&sim, &[0.1, 0., 0., 0., 0., 0.])
            .unwrap();
        let reference = controller.state().reference_target_pos;
        // clipped to ik_pos_limit = 0.05, then scaled by 0.3
        assert!((reference.x - 0.05 * 0.3).abs() < 1e-12);
        assert_eq!(reference.y, 0.);
        assert_eq!(reference.z, 0.);
    }

    #[test]
    fn in_range_positional_input_is_not_clipped() {
        let sim = static_sim();
        let mut controller = gantry_controller(&sim, gantry_config(OrientationMode::Full));
        controller
            .set_goal(&sim, &[0.02, 0., 0., 0., 0., 0.])
            .unwrap();
        let reference = controller.state().reference_target_pos;
        assert!((reference.x - 0.02 * 0.3).abs() < 1e-12);
    }

    #[test]
    fn zero_action_leaves_reference_unchanged() {
        let sim = static_sim();
        let mut controller = gantry_controller(&sim, gantry_config(OrientationMode::Full));
        controller
            .set_goal(&sim, &[0.04, 0., 0., 0., 0.1, 0.])
            .unwrap();
        let pos_before = controller.state().reference_target_pos;
        let orn_before = controller.state().reference_target_orn;
        for _ in 0..3 {
            controller.set_goal(&sim, &[0.; 6]).unwrap();
        }
        let state = controller.state();
        assert!((state.reference_target_pos - pos_before).norm() < 1e-12);
        assert!(state.reference_target_orn.angle_to(&orn_before) < 1e-12);
    }

    #[test]
    fn reference_quaternion_stays_normalized() {
        let sim = static_sim();
        let mut controller = gantry_controller(&sim, gantry_config(OrientationMode::Full));
        for i in 0..100 {
            let sign = if i % 2 == 0 { 1. } else { -0.7 };
            controller
                .set_goal(&sim, &[0.01, 0., 0., 0.3 * sign, 0.2, 0.1 * sign])
                .unwrap();
            let norm = controller
                .state()
                .reference_target_orn
                .into_inner()
                .norm();
            assert!((norm - 1.).abs() < 1e-9);
        }
    }

    #[test]
    fn reset_then_run_commands_near_zero_velocities() {
        let sim = static_sim();
        let mut controller = gantry_controller(&sim, gantry_config(OrientationMode::Full));
        controller
            .set_goal(&sim, &[0.05, 0.05, 0., 0., 0., 0.2])
            .unwrap();
        controller.reset_goal(&sim);
        let torques = controller.run_controller(&sim).unwrap();
        for tau in &torques.tau {
            assert!(tau.abs() < 1e-9);
        }
        let velocities = &controller.state().commanded_joint_velocities;
        for i in 0..velocities.len() {
            assert!(velocities[i].abs() < 1e-9);
        }
    }

    #[test]
    fn yaw_action_changes_only_the_last_commanded_joint() {
        let sim = static_sim();
        let mut controller = gantry_controller(
            &sim,
            gantry_config(OrientationMode::FixedOrientation { yaw: true }),
        );
        controller.set_goal(&sim, &[0., 0., 0., 1.]).unwrap();
        let commanded = &controller.state().commanded_joint_positions;
        assert_eq!(commanded[0], 0.);
        assert_eq!(commanded[1], 0.);
        // z_rot = ik_ori_limit * action[3] on top of the current angle
        assert!((commanded[2] - 0.2).abs() < 1e-12);
        let velocities = &controller.state().commanded_joint_velocities;
        assert_eq!(velocities[0], 0.);
        assert_eq!(velocities[1], 0.);
        assert!(velocities[2].abs() > 0.);
    }

    #[test]
    fn interpolated_first_tick_makes_partial_progress() {
        let sim = static_sim();
        let mut plain = gantry_controller(&sim, gantry_config(OrientationMode::Full));
        plain.set_goal(&sim, &[0.1, 0., 0., 0., 0., 0.]).unwrap();
        let full_torques = plain.run_controller(&sim).unwrap();

        let mut config = gantry_config(OrientationMode::Full);
        config.interpolator_pos = Some(Default::default());
        let mut interpolated = gantry_controller(&sim, config);
        interpolated
            .set_goal(&sim, &[0.1, 0., 0., 0., 0., 0.])
            .unwrap();
        let partial_torques = interpolated.run_controller(&sim).unwrap();

        assert!(partial_torques.tau[0] > 0.);
        assert!(partial_torques.tau[0] < full_torques.tau[0]);
    }

    #[test]
    fn velocity_goal_is_reused_without_interpolators() {
        let sim = static_sim();
        let mut controller = gantry_controller(&sim, gantry_config(OrientationMode::Full));
        controller
            .set_goal(&sim, &[0.1, 0., 0., 0., 0., 0.])
            .unwrap();
        let first = controller.run_controller(&sim).unwrap();
        let second = controller.run_controller(&sim).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_inputs_are_rejected() {
        let sim = static_sim();
        let mut controller = gantry_controller(&sim, gantry_config(OrientationMode::Full));
        let result = controller.get_control(None, None, None, None, false);
        assert!(matches!(
            result,
            Err(ControlException::MissingInputException)
        ));
    }

    #[test]
    fn short_backend_solution_is_a_convergence_error() {
        let sim = static_sim();
        let mut controller = DifferentialIkController::new(
            &sim,
            gantry_config(OrientationMode::Full),
            gantry_indexes(),
            ActuatorRange::symmetric(80., 3),
            ShortBackend,
        )
        .unwrap();
        let result = controller.set_goal(&sim, &[0.01, 0., 0., 0., 0., 0.]);
        assert!(matches!(
            result,
            Err(ControlException::IkConvergenceException { .. })
        ));
    }

    #[test]
    fn run_controller_ticks_and_logs() {
        let sim = static_sim();
        let mut controller = gantry_controller(&sim, gantry_config(OrientationMode::Full));
        controller
            .set_goal(&sim, &[0.01, 0., 0., 0., 0., 0.])
            .unwrap();
        controller.run_controller(&sim).unwrap();
        controller.run_controller(&sim).unwrap();
        assert_eq!(controller.state().tick, 2);
        let records = controller.flush_log();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].state.tick, 1);
        assert_eq!(records[1].state.tick, 2);
    }

    #[test]
    fn panda_with_dls_backend_moves_toward_the_target() {
        let robot = RobotKind::Panda;
        let chain = robot.chain(Isometry3::identity()).unwrap();
        let rest = robot.rest_pose();
        let start_pose = chain.forward(&rest).unwrap();

        let mut sim = MockSimArm::new();
        let rest_q = rest.clone();
        sim.expect_qpos().returning(move |i| rest_q[i]);
        sim.expect_qvel().returning(|_| 0.);
        sim.expect_bias_torque().returning(|_| 0.);
        let pose_array = isometry_to_array(&start_pose);
        sim.expect_eef_pose().returning(move || pose_array);
        sim.expect_base_orientation().returning(|| [0., 0., 0., 1.]);

        let mut config = DiffIkConfig {
            eef_rot_offset: [0., 0., 0., 1.],
            ..DiffIkConfig::default()
        };
        config.converge_steps = 30;
        let indexes =
            JointIndexes::new((0..7).collect(), (0..7).collect(), (0..7).collect()).unwrap();
        let mut controller = DifferentialIkController::new(
            &sim,
            config,
            indexes,
            ActuatorRange::symmetric(80., 7),
            DlsIkSolver::new(chain.clone()),
        )
        .unwrap();

        controller
            .set_goal(&sim, &[0.1, 0., 0., 0., 0., 0.])
            .unwrap();
        let commanded = controller.state().commanded_joint_positions.clone();
        let reached = chain.forward(commanded.as_slice()).unwrap();
        let target = start_pose.translation.vector + Vector3::new(0.05 * 0.3, 0., 0.);
        let remaining = (reached.translation.vector - target).norm();
        assert!(
            remaining < 0.05 * 0.3,
            "IK did not move toward the target, remaining error {}",
            remaining
        );
    }
}
