// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

use clap::Parser;
use diffik::utils::isometry_to_array;
use diffik::{
    ActuatorRange, ControlResult, Controller, DiffIkConfig, DifferentialIkController, DlsIkSolver,
    JointIndexes, RobotKind, SerialChain, SimArm, Torques,
};
use nalgebra::{Isometry3, Vector3};

/// A demo showing how to move a simulated Panda end effector to a Cartesian
/// offset with the differential IK controller.
///
/// The "simulator" is a minimal torque-driven integrator over the same
/// kinematic chain the solver uses.
#[derive(Parser, Debug)]
#[clap(author, version, name = "reach_pose")]
struct CommandLineArguments {
    /// Desired x offset of the end effector in meters
    #[clap(default_value = "0.10", long)]
    pub dx: f64,
    /// Desired y offset of the end effector in meters
    #[clap(default_value = "0.00", long)]
    pub dy: f64,
    /// Desired z offset of the end effector in meters
    #[clap(default_value = "0.05", long)]
    pub dz: f64,
    /// Number of policy steps to run
    #[clap(default_value = "40", long)]
    pub steps: usize,
}

/// Torque-driven toy simulation of an arm with unit joint inertia.
struct IntegratorSim {
    chain: SerialChain,
    q: Vec<f64>,
    dq: Vec<f64>,
    dt: f64,
}

impl IntegratorSim {
    fn new(chain: SerialChain, q: Vec<f64>, dt: f64) -> Self {
        let dof = q.len();
        IntegratorSim {
            chain,
            q,
            dq: vec![0.; dof],
            dt,
        }
    }

    fn step(&mut self, torques: &Torques) {
        for i in 0..self.q.len() {
            self.dq[i] += (torques.tau[i] - self.dq[i]) * self.dt;
            self.q[i] += self.dq[i] * self.dt;
        }
    }

    fn eef_position(&self) -> Vector3<f64> {
        self.chain
            .forward(&self.q)
            .map(|pose| pose.translation.vector)
            .unwrap_or_else(|_| Vector3::zeros())
    }
}

impl SimArm for IntegratorSim {
    fn qpos(&self, index: usize) -> f64 {
        self.q[index]
    }
    fn qvel(&self, index: usize) -> f64 {
        self.dq[index]
    }
    fn bias_torque(&self, _index: usize) -> f64 {
        0.
    }
    fn eef_pose(&self) -> [f64; 16] {
        match self.chain.forward(&self.q) {
            Ok(pose) => isometry_to_array(&pose),
            Err(_) => isometry_to_array(&Isometry3::identity()),
        }
    }
    fn base_orientation(&self) -> [f64; 4] {
        [0., 0., 0., 1.]
    }
}

fn main() -> ControlResult<()> {
    let arguments = CommandLineArguments::parse();
    let robot = RobotKind::Panda;
    let chain = robot.chain(Isometry3::identity())?;
    let mut sim = IntegratorSim::new(chain.clone(), robot.rest_pose(), 1. / 500.);

    let config = DiffIkConfig {
        eef_rot_offset: [0., 0., 0., 1.],
        kv: 8.,
        converge_steps: 20,
        ..DiffIkConfig::default()
    };
    let ticks_per_action = (config.control_freq / config.policy_freq) as usize;
    let indexes = JointIndexes::new((0..7).collect(), (0..7).collect(), (0..7).collect())?;
    let mut controller = DifferentialIkController::new(
        &sim,
        config,
        indexes,
        ActuatorRange::symmetric(80., 7),
        DlsIkSolver::new(chain),
    )?;
    println!("controller: {}", controller.name());

    let target = sim.eef_position() + Vector3::new(arguments.dx, arguments.dy, arguments.dz);
    for step in 0..arguments.steps {
        let remaining = target - sim.eef_position();
        let action = [remaining.x, remaining.y, remaining.z, 0., 0., 0.];
        controller.set_goal(&sim, &action)?;
        for _ in 0..ticks_per_action {
            let torques = controller.run_controller(&sim)?;
            sim.step(&torques);
        }
        println!(
            "step {:3}: distance to target {:.4} m",
            step,
            remaining.norm()
        );
    }
    println!(
        "finished, final distance {:.4} m",
        (target - sim.eef_position()).norm()
    );
    Ok(())
}
