// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! contains useful type definitions and conversion functions.
use nalgebra::{DVector, Isometry3, Matrix4, Rotation3, UnitQuaternion, Vector3};

/// Epsilon below which a rotation magnitude is treated as the identity
/// rotation.
pub static ROTATION_EPS: f64 = f64::EPSILON;

/// A joint-space vector with one entry per controlled joint.
pub type JointVector = DVector<f64>;

/// converts a 4x4 column-major homogenous matrix to an Isometry
pub fn array_to_isometry(array: &[f64; 16]) -> Isometry3<f64> {
    let rot = Rotation3::from_matrix(
        &Matrix4::from_column_slice(array)
            .remove_column(3)
            .remove_row(3),
    );
    Isometry3::from_parts(
        Vector3::new(array[12], array[13], array[14]).into(),
        rot.into(),
    )
}

/// converts an Isometry to a 4x4 column-major homogeneous matrix
pub fn isometry_to_array(isometry: &Isometry3<f64>) -> [f64; 16] {
    let mut out = [0.; 16];
    for (i, &x) in isometry.to_homogeneous().iter().enumerate() {
        out[i] = x;
    }
    out
}

/// Limits a translation delta to a maximum magnitude.
///
/// The direction of the delta is preserved. Deltas within the limit pass
/// through unchanged; a delta is never amplified.
///
/// # Arguments
/// * `translation` - Desired translation delta.
/// * `limit` - Maximum allowed magnitude in \[m\].
/// # Return
/// The possibly scaled-down translation and whether clipping was applied.
pub fn clip_translation(translation: &Vector3<f64>, limit: f64) -> (Vector3<f64>, bool) {
    let norm = translation.norm();
    if norm > limit {
        (translation * (limit / norm), true)
    } else {
        (*translation, false)
    }
}

/// Limits a rotation to a maximum angular magnitude.
///
/// The rotation axis is preserved and the angle is scaled down if it exceeds
/// the limit. Rotations within the limit pass through unchanged.
///
/// # Arguments
/// * `rotation` - Desired relative rotation.
/// * `limit` - Maximum allowed rotation angle in \[rad\].
/// # Return
/// The possibly scaled-down rotation and whether clipping was applied.
pub fn clip_rotation(rotation: &UnitQuaternion<f64>, limit: f64) -> (UnitQuaternion<f64>, bool) {
    match rotation.axis_angle() {
        Some((axis, angle)) if angle > limit => {
            (UnitQuaternion::from_axis_angle(&axis, limit), true)
        }
        _ => (*rotation, false),
    }
}

/// Converts a scaled axis-angle vector to a quaternion.
///
/// Magnitudes at or below [`ROTATION_EPS`] map to the identity rotation.
pub fn axis_angle_to_quat(axis_angle: &Vector3<f64>) -> UnitQuaternion<f64> {
    if axis_angle.norm() <= ROTATION_EPS {
        UnitQuaternion::identity()
    } else {
        UnitQuaternion::from_scaled_axis(*axis_angle)
    }
}

/// Computes the orientation error between two rotation matrices.
///
/// The error is expressed as a scaled axis-angle vector which rotates
/// `current` onto `desired`. Useful as the input of a proportional
/// orientation law.
pub fn orientation_error(desired: &Rotation3<f64>, current: &Rotation3<f64>) -> Vector3<f64> {
    let rc1 = current.matrix().column(0);
    let rc2 = current.matrix().column(1);
    let rc3 = current.matrix().column(2);
    let rd1 = desired.matrix().column(0);
    let rd2 = desired.matrix().column(1);
    let rd3 = desired.matrix().column(2);
    0.5 * (rc1.cross(&rd1) + rc2.cross(&rd2) + rc3.cross(&rd3))
}
