// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

use clap::Parser;
use diffik::utils::isometry_to_array;
use diffik::{
    ActuatorRange, ControlResult, Controller, DiffIkConfig, DifferentialIkController, DlsIkSolver,
    JointIndexes, OrientationMode, RobotKind, SerialChain, SimArm,
};
use nalgebra::Isometry3;

/// A demo showing decoupled yaw control: the controller pins the end
/// effector orientation to the downward-facing reference frame and controls
/// the wrist rotation through a single extra action entry.
#[derive(Parser, Debug)]
#[clap(author, version, name = "yaw_only")]
struct CommandLineArguments {
    /// Normalized yaw action in [-1, 1]; scaled by the orientation limit
    #[clap(default_value = "0.5", long)]
    pub yaw: f64,
}

/// Frozen arm state; this demo inspects commanded joint positions instead of
/// integrating motion.
struct FrozenSim {
    q: Vec<f64>,
    eef_pose: [f64; 16],
}

impl SimArm for FrozenSim {
    fn qpos(&self, index: usize) -> f64 {
        self.q[index]
    }
    fn qvel(&self, _index: usize) -> f64 {
        0.
    }
    fn bias_torque(&self, _index: usize) -> f64 {
        0.
    }
    fn eef_pose(&self) -> [f64; 16] {
        self.eef_pose
    }
    fn base_orientation(&self) -> [f64; 4] {
        [0., 0., 0., 1.]
    }
}

fn build_chain() -> ControlResult<SerialChain> {
    RobotKind::Panda.chain(Isometry3::identity())
}

fn main() -> ControlResult<()> {
    let arguments = CommandLineArguments::parse();
    let robot = RobotKind::Panda;
    let chain = build_chain()?;
    let rest = robot.rest_pose();
    let sim = FrozenSim {
        q: rest.clone(),
        eef_pose: isometry_to_array(&chain.forward(&rest)?),
    };

    let config = DiffIkConfig {
        eef_rot_offset: [0., 0., 0., 1.],
        orientation_mode: OrientationMode::FixedOrientation { yaw: true },
        ..DiffIkConfig::default()
    };
    let ori_limit = config.ik_ori_limit;
    let indexes = JointIndexes::new((0..7).collect(), (0..7).collect(), (0..7).collect())?;
    let mut controller = DifferentialIkController::new(
        &sim,
        config,
        indexes,
        ActuatorRange::symmetric(80., 7),
        DlsIkSolver::new(chain),
    )?;
    println!(
        "controller: {} with action dimension {}",
        controller.name(),
        controller.control_dim()
    );

    // Pure yaw action: no translation, only the decoupled wrist entry.
    controller.set_goal(&sim, &[0., 0., 0., arguments.yaw])?;
    let commanded = &controller.state().commanded_joint_positions;
    println!(
        "requested wrist offset: {:.4} rad",
        ori_limit * arguments.yaw
    );
    for i in 0..commanded.len() {
        println!(
            "joint {}: current {:+.4} rad -> commanded {:+.4} rad",
            i, rest[i], commanded[i]
        );
    }
    Ok(())
}
