use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

/// Why a 3×3 matrix is not accepted as a rotation.
#[derive(thiserror::Error, Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum RotationDefect {
    #[error("rotation has non-finite entries")]
    NonFinite,
    #[error("rotation is not orthonormal (max |R^T R - I| = {max_error:.3e})")]
    NotOrthonormal { max_error: f64 },
    #[error("rotation determinant is {det:.6}, expected +1")]
    WrongDeterminant { det: f64 },
}

/// Check that `r` is a proper rotation: finite, `R^T R = I` and `det R = +1`,
/// both within `tolerance`.
pub fn check_rotation(r: &Matrix3<f64>, tolerance: f64) -> Result<(), RotationDefect> {
    if r.iter().any(|v| !v.is_finite()) {
        return Err(RotationDefect::NonFinite);
    }

    let gram = r.transpose() * r - Matrix3::identity();
    let max_error = gram.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if max_error > tolerance {
        return Err(RotationDefect::NotOrthonormal { max_error });
    }

    // An orthonormal matrix has det = ±1; -1 is a reflection.
    let det = r.determinant();
    if (det - 1.0).abs() > tolerance {
        return Err(RotationDefect::WrongDeterminant { det });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Rotation3, Vector3};

    #[test]
    fn accepts_proper_rotations() {
        let r = Rotation3::from_axis_angle(&Vector3::z_axis(), 0.7)
            * Rotation3::from_axis_angle(&Vector3::x_axis(), -1.2);
        assert_eq!(Ok(()), check_rotation(r.matrix(), 1e-9));
        assert_eq!(Ok(()), check_rotation(&Matrix3::identity(), 0.0));
    }

    #[test]
    fn rejects_scaled_matrix() {
        let r = Matrix3::identity() * 1.1;
        assert!(matches!(
            check_rotation(&r, 1e-3),
            Err(RotationDefect::NotOrthonormal { .. })
        ));
    }

    #[test]
    fn rejects_reflection() {
        let r = Matrix3::from_diagonal(&Vector3::new(-1.0, 1.0, 1.0));
        let err = check_rotation(&r, 1e-6).unwrap_err();
        assert!(matches!(err, RotationDefect::WrongDeterminant { det } if (det + 1.0).abs() < 1e-12));
    }

    #[test]
    fn rejects_nan() {
        let mut r = Matrix3::identity();
        r[(1, 2)] = f64::NAN;
        assert_eq!(Err(RotationDefect::NonFinite), check_rotation(&r, 1e-3));
    }
}
