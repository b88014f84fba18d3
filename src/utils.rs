// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! contains useful type definitions and conversion functions.
use nalgebra::{Isometry3, Matrix4, Rotation3, SVector, Vector3};

/// Number of joints of the arm.
pub const NUM_JOINTS: usize = 7;

/// A Vector with 7 entries, one per joint.
pub type Vector7 = SVector<f64, NUM_JOINTS>;

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

/// Determines whether the given array represents a valid homogeneous transformation matrix.
/// transform is represented as a 4x4 matrix in column-major format
#[allow(clippy::float_cmp)]
pub fn is_homogeneous_transformation(transform: &[f64; 16]) -> bool {
    const ORTHONORMAL_THRESHOLD: f64 = 1e-5;
    if transform[3] != 0.0 || transform[7] != 0.0 || transform[11] != 0.0 || transform[15] != 1.0 {
        return false;
    }
    for j in 0..3 {
        let column_norm = (transform[j * 4].powi(2)
            + transform[j * 4 + 1].powi(2)
            + transform[j * 4 + 2].powi(2))
        .sqrt();
        if (column_norm - 1.).abs() > ORTHONORMAL_THRESHOLD {
            return false;
        }
    }
    for i in 0..3 {
        let row_norm =
            (transform[i].powi(2) + transform[4 + i].powi(2) + transform[8 + i].powi(2)).sqrt();
        if (row_norm - 1.).abs() > ORTHONORMAL_THRESHOLD {
            return false;
        }
    }
    true
}

/// Name of the i-th joint (zero based index) of the arm with the given id, e.g. `fr3_joint1`.
pub fn joint_name(arm_id: &str, index: usize) -> String {
    format!("{}_joint{}", arm_id, index + 1)
}

/// Names of all joints of the arm with the given id, in joint order.
pub fn joint_names(arm_id: &str) -> [String; NUM_JOINTS] {
    let mut names: [String; NUM_JOINTS] = Default::default();
    for (i, name) in names.iter_mut().enumerate() {
        *name = joint_name(arm_id, i);
    }
    names
}

#[cfg(test)]
mod tests {
    use crate::utils::{array_to_isometry, is_homogeneous_transformation, joint_names};

    const IDENTITY_WITH_OFFSET: [f64; 16] = [
        1., 0., 0., 0., 0., 1., 0., 0., 0., 0., 1., 0., 0.3, -0.1, 0.5, 1.,
    ];

    #[test]
    fn homogeneous_transformation_test() {
        assert!(is_homogeneous_transformation(&IDENTITY_WITH_OFFSET));
        let mut broken = IDENTITY_WITH_OFFSET;
        broken[0] = 2.;
        assert!(!is_homogeneous_transformation(&broken));
        let mut not_affine = IDENTITY_WITH_OFFSET;
        not_affine[15] = 0.5;
        assert!(!is_homogeneous_transformation(&not_affine));
    }

    #[test]
    fn isometry_translation_test() {
        let transform = array_to_isometry(&IDENTITY_WITH_OFFSET);
        assert_eq!(transform.translation.vector.x, 0.3);
        assert_eq!(transform.translation.vector.y, -0.1);
        assert_eq!(transform.translation.vector.z, 0.5);
        assert!(transform.rotation.angle().abs() < 1e-12);
    }

    #[test]
    fn joint_names_test() {
        let names = joint_names("fr3");
        assert_eq!(names[0], "fr3_joint1");
        assert_eq!(names[6], "fr3_joint7");
    }
}
