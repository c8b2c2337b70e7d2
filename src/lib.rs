// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! # diffik-rs
//! diffik-rs is a library for Cartesian control of simulated robot arms via
//! differential inverse kinematics.
//!
//! A [`DifferentialIkController`] receives relative end-effector pose deltas
//! (position plus orientation), clips and scales them, accumulates them into
//! a drift-resistant reference target, converges to matching joint positions
//! through a pluggable [`IkBackend`], and turns the joint position error into
//! a joint-velocity goal with a proportional law. A wrapped
//! [`JointVelocityController`] converts that goal into torque commands, once
//! per simulation tick.
//!
//! ## Design
//! The library is divided into these main Modules:
//! * [controller](`crate::controller`) - contains the differential IK and
//!   joint-velocity controllers, goal interpolation and control logging.
//! * [ik](`crate::ik`) - contains the IK backend capability, the serial
//!   chain model and the bundled damped least-squares solver.
//! * [sim](`crate::sim`) - contains the narrow interface through which
//!   controllers read the simulated robot.
//! * [robots](`crate::robots`) - contains the descriptors of the supported
//!   arms.
//!
//! The physics engine itself is not part of this crate. Anything that can
//! answer the [`SimArm`] queries (joint state, end-effector pose, actuator
//! bias) can be controlled; controllers return [`Torques`] for the owning
//! loop to apply.
//!
//! # Example:
//!```no_run
//! use diffik::{
//!     ActuatorRange, Controller, DiffIkConfig, DifferentialIkController, DlsIkSolver,
//!     ControlResult, JointIndexes, RobotKind, SimArm,
//! };
//! use diffik::utils::isometry_to_array;
//! use nalgebra::Isometry3;
//!
//! /// Minimal stand-in for a physics engine holding a Panda at rest.
//! struct StaticSim {
//!     q: Vec<f64>,
//!     eef_pose: [f64; 16],
//! }
//!
//! impl SimArm for StaticSim {
//!     fn qpos(&self, index: usize) -> f64 {
//!         self.q[index]
//!     }
//!     fn qvel(&self, _index: usize) -> f64 {
//!         0.
//!     }
//!     fn bias_torque(&self, _index: usize) -> f64 {
//!         0.
//!     }
//!     fn eef_pose(&self) -> [f64; 16] {
//!         self.eef_pose
//!     }
//!     fn base_orientation(&self) -> [f64; 4] {
//!         [0., 0., 0., 1.]
//!     }
//! }
//!
//! fn main() -> ControlResult<()> {
//!     let robot = RobotKind::Panda;
//!     let chain = robot.chain(Isometry3::identity())?;
//!     let rest = robot.rest_pose();
//!     let sim = StaticSim {
//!         q: rest.clone(),
//!         eef_pose: isometry_to_array(&chain.forward(&rest)?),
//!     };
//!
//!     let indexes = JointIndexes::new(
//!         (0..7).collect(),
//!         (0..7).collect(),
//!         (0..7).collect(),
//!     )?;
//!     let mut controller = DifferentialIkController::new(
//!         &sim,
//!         DiffIkConfig::default(),
//!         indexes,
//!         ActuatorRange::symmetric(80., 7),
//!         DlsIkSolver::new(chain),
//!     )?;
//!
//!     // Ask for 2 cm along x; the controller clips, scales and converts
//!     // this into a joint-velocity goal.
//!     controller.set_goal(&sim, &[0.02, 0., 0., 0., 0., 0.])?;
//!     let torques = controller.run_controller(&sim)?;
//!     println!("commanded torques: {:?}", torques.tau);
//!     Ok(())
//! }
//! ```
//!
//! Every action is clipped to the configured input limits before use, so a
//! policy can safely emit unconstrained deltas. [`Controller::control_limits`]
//! reports the symmetric action bounds matching the configured orientation
//! mode; [`Controller::reset_goal`] resynchronizes the reference targets with
//! the live pose, e.g. on episode reset.
pub mod controller;
pub mod exception;
pub mod ik;
pub mod robots;
pub mod sim;
pub mod utils;

pub use controller::config::{DiffIkConfig, OrientationMode};
pub use controller::diff_ik::{DifferentialIkController, IkControllerState, IK_P_GAIN};
pub use controller::interpolator::InterpolatorConfig;
pub use controller::joint_vel::JointVelocityController;
pub use controller::logger::Record;
pub use controller::{ActuatorRange, Controller, Torques};
pub use exception::{ControlException, ControlResult};
pub use ik::chain::{ChainJoint, SerialChain};
pub use ik::dls::DlsIkSolver;
pub use ik::IkBackend;
pub use robots::RobotKind;
pub use sim::{ArmView, JointIndexes, SimArm};
pub use utils::JointVector;
