use crate::error::GeometryError;

/// Compute the Euclidean norm of a quaternion.
pub fn quaternion_norm(q: &[f64; 4]) -> f64 {
    (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt()
}

/// Normalize a quaternion to unit length.
///
/// # Arguments
///
/// * `q` - The quaternion as `[w, x, y, z]`.
///
/// # Returns
///
/// The unit quaternion, or [`GeometryError::ZeroNormQuaternion`] if the norm is zero
/// or not finite.
///
/// Example:
///
/// ```
/// use sfmkit_geometry::quaternion::normalize_quaternion;
///
/// let q = normalize_quaternion(&[2.0, 0.0, 0.0, 0.0]).unwrap();
/// assert_eq!(q, [1.0, 0.0, 0.0, 0.0]);
/// ```
pub fn normalize_quaternion(q: &[f64; 4]) -> Result<[f64; 4], GeometryError> {
    let norm = quaternion_norm(q);
    if norm == 0.0 || !norm.is_finite() {
        return Err(GeometryError::ZeroNormQuaternion(q[0], q[1], q[2], q[3]));
    }
    Ok([q[0] / norm, q[1] / norm, q[2] / norm, q[3] / norm])
}

/// Convert a unit quaternion to a row-major rotation matrix.
///
/// PRECONDITION: `q` is a unit quaternion in `[w, x, y, z]` order.
pub fn quaternion_to_rotation_matrix(q: &[f64; 4]) -> [[f64; 3]; 3] {
    let [qw, qx, qy, qz] = *q;

    [
        [
            1.0 - 2.0 * (qy * qy + qz * qz),
            2.0 * (qx * qy - qw * qz),
            2.0 * (qx * qz + qw * qy),
        ],
        [
            2.0 * (qx * qy + qw * qz),
            1.0 - 2.0 * (qx * qx + qz * qz),
            2.0 * (qy * qz - qw * qx),
        ],
        [
            2.0 * (qx * qz - qw * qy),
            2.0 * (qy * qz + qw * qx),
            1.0 - 2.0 * (qx * qx + qy * qy),
        ],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normalize_quaternion() -> Result<(), GeometryError> {
        let q = normalize_quaternion(&[1.0, 1.0, 1.0, 1.0])?;
        for v in q {
            assert_relative_eq!(v, 0.5);
        }
        assert_relative_eq!(quaternion_norm(&q), 1.0);
        Ok(())
    }

    #[test]
    fn test_normalize_quaternion_zero() {
        let res = normalize_quaternion(&[0.0, 0.0, 0.0, 0.0]);
        assert_eq!(
            res,
            Err(GeometryError::ZeroNormQuaternion(0.0, 0.0, 0.0, 0.0))
        );
        assert!(normalize_quaternion(&[f64::NAN, 0.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn test_quaternion_to_rotation_matrix_identity() {
        let rotation = quaternion_to_rotation_matrix(&[1.0, 0.0, 0.0, 0.0]);
        let expected = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        assert_eq!(rotation, expected);
    }

    #[test]
    fn test_quaternion_to_rotation_matrix_z90() {
        let half = std::f64::consts::FRAC_PI_4;
        let rotation = quaternion_to_rotation_matrix(&[half.cos(), 0.0, 0.0, half.sin()]);
        let expected = [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(rotation[i][j], expected[i][j], epsilon = 1e-12);
            }
        }
    }
}
