// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains a damped least-squares inverse kinematics solver.

use crate::exception::{ControlException, ControlResult};
use crate::ik::chain::SerialChain;
use crate::ik::IkBackend;
use crate::utils::JointVector;
use nalgebra::{DMatrix, DVector, Isometry3, UnitQuaternion, Vector3, Vector6};

/// Damping factor of the least-squares step.
pub static DEFAULT_DAMPING: f64 = 0.05;
/// Largest joint step taken in a single iteration in \[rad\].
pub static MAX_JOINT_STEP: f64 = 0.2;

/// Joint-limit aware damped least-squares solver over a [`SerialChain`].
///
/// Each iteration computes the 6-DOF pose error, maps it through
/// dq = Jᵀ (J Jᵀ + λ²I)⁻¹ e, clamps the step and the resulting joint
/// positions and repeats until the error is within tolerance or the
/// iteration budget is spent. When the budget runs out the best
/// configuration found so far is returned, so the caller always receives a
/// full-length solution with bounded error.
///
/// The solver keeps no hidden state between calls and is deterministic.
#[derive(Debug, Clone)]
pub struct DlsIkSolver {
    chain: SerialChain,
    damping: f64,
    /// Position tolerance in \[m\].
    pub position_tolerance: f64,
    /// Orientation tolerance in \[rad\].
    pub orientation_tolerance: f64,
}

impl DlsIkSolver {
    /// Creates a new DlsIkSolver with default damping and tolerances.
    pub fn new(chain: SerialChain) -> Self {
        DlsIkSolver {
            chain,
            damping: DEFAULT_DAMPING,
            position_tolerance: 1e-4,
            orientation_tolerance: 1e-3,
        }
    }

    /// The chain the solver converges over.
    pub fn chain(&self) -> &SerialChain {
        &self.chain
    }

    fn pose_error(
        current: &Isometry3<f64>,
        target_position: &Vector3<f64>,
        target_orientation: &UnitQuaternion<f64>,
    ) -> Vector6<f64> {
        let position_error = target_position - current.translation.vector;
        let rotation_error = (target_orientation * current.rotation.inverse()).scaled_axis();
        Vector6::new(
            position_error.x,
            position_error.y,
            position_error.z,
            rotation_error.x,
            rotation_error.y,
            rotation_error.z,
        )
    }

    fn step(jacobian: &DMatrix<f64>, error: &Vector6<f64>, damping: f64) -> DVector<f64> {
        let jjt = jacobian * jacobian.transpose();
        let damped = jjt + DMatrix::identity(6, 6) * (damping * damping);
        match damped.try_inverse() {
            Some(inverse) => {
                jacobian.transpose() * inverse * DVector::from_column_slice(error.as_slice())
            }
            None => DVector::zeros(jacobian.ncols()),
        }
    }
}

impl IkBackend for DlsIkSolver {
    fn dof(&self) -> usize {
        self.chain.dof()
    }

    fn base_pose(&self) -> Isometry3<f64> {
        self.chain.base_pose()
    }

    fn solve(
        &mut self,
        target_position: &Vector3<f64>,
        target_orientation: &UnitQuaternion<f64>,
        seed: &[f64],
        max_iterations: usize,
    ) -> ControlResult<JointVector> {
        let mut q = JointVector::from_column_slice(seed);
        self.chain.clamp_to_limits(&mut q);
        let mut best = q.clone();
        let mut best_residual = f64::INFINITY;

        for _ in 0..max_iterations {
            let current = self.chain.forward(q.as_slice())?;
            let error = Self::pose_error(&current, target_position, target_orientation);
            let residual = error.norm();
            if residual < best_residual {
                best_residual = residual;
                best.copy_from(&q);
            }
            let position_error = Vector3::new(error[0], error[1], error[2]).norm();
            let orientation_error = Vector3::new(error[3], error[4], error[5]).norm();
            if position_error < self.position_tolerance
                && orientation_error < self.orientation_tolerance
            {
                return Ok(q);
            }

            let jacobian = self.chain.jacobian(q.as_slice())?;
            let dq = Self::step(&jacobian, &error, self.damping);
            for i in 0..q.len() {
                q[i] += dq[i].max(-MAX_JOINT_STEP).min(MAX_JOINT_STEP);
            }
            self.chain.clamp_to_limits(&mut q);
        }

        if !best_residual.is_finite() {
            return Err(ControlException::IkConvergenceException {
                residual: best_residual,
                iterations: max_iterations,
            });
        }
        Ok(best)
    }
}
