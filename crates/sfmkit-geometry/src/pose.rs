use crate::error::GeometryError;
use crate::quaternion::{normalize_quaternion, quaternion_to_rotation_matrix};
use crate::rotation::{mat3_mul_vec3, rotation_matrix_to_euler_angles, transpose};

/// A camera pose mapping world coordinates into the camera frame.
///
/// The rotation is stored as a unit quaternion `[w, x, y, z]` and the translation is
/// the world-to-camera vector, so that `x_cam = R * x_world + t`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    quaternion: [f64; 4],
    translation: [f64; 3],
}

impl Pose {
    /// Create a pose from a (possibly non-unit) quaternion and a translation.
    ///
    /// The quaternion is normalized; a zero-norm quaternion is rejected.
    ///
    /// Example:
    ///
    /// ```
    /// use sfmkit_geometry::Pose;
    ///
    /// let pose = Pose::new([2.0, 0.0, 0.0, 0.0], [1.0, 2.0, 3.0]).unwrap();
    /// assert_eq!(pose.quaternion(), [1.0, 0.0, 0.0, 0.0]);
    /// assert_eq!(pose.camera_center(), [-1.0, -2.0, -3.0]);
    /// ```
    pub fn new(quaternion: [f64; 4], translation: [f64; 3]) -> Result<Self, GeometryError> {
        Ok(Self {
            quaternion: normalize_quaternion(&quaternion)?,
            translation,
        })
    }

    /// The unit quaternion `[w, x, y, z]`.
    pub fn quaternion(&self) -> [f64; 4] {
        self.quaternion
    }

    /// The world-to-camera translation.
    pub fn translation(&self) -> [f64; 3] {
        self.translation
    }

    /// The row-major world-to-camera rotation matrix.
    pub fn rotation_matrix(&self) -> [[f64; 3]; 3] {
        quaternion_to_rotation_matrix(&self.quaternion)
    }

    /// ZYX Euler angles `[roll, pitch, yaw]` in degrees.
    pub fn euler_angles_deg(&self) -> [f64; 3] {
        rotation_matrix_to_euler_angles(&self.rotation_matrix())
    }

    /// The camera center in world coordinates, `-R^T * t`.
    pub fn camera_center(&self) -> [f64; 3] {
        let rt = transpose(&self.rotation_matrix());
        let c = mat3_mul_vec3(&rt, &self.translation);
        [-c[0], -c[1], -c[2]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quaternion::quaternion_norm;
    use crate::rotation::{mat3_mul_vec3, orthonormality_error};
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn test_pose_zero_quaternion() {
        let res = Pose::new([0.0; 4], [1.0, 2.0, 3.0]);
        assert!(matches!(res, Err(GeometryError::ZeroNormQuaternion(..))));
    }

    #[test]
    fn test_pose_camera_center_projects_to_origin() -> Result<(), GeometryError> {
        let half = 20f64.to_radians();
        let pose = Pose::new([half.cos(), 0.0, half.sin(), 0.0], [0.5, -1.0, 4.0])?;
        let center = pose.camera_center();

        // the camera center maps to the origin of the camera frame
        let r = pose.rotation_matrix();
        let t = pose.translation();
        let p = mat3_mul_vec3(&r, &center);
        for i in 0..3 {
            assert_relative_eq!(p[i] + t[i], 0.0, epsilon = 1e-12);
        }
        Ok(())
    }

    #[test]
    fn test_random_poses_are_unit_and_orthonormal() -> Result<(), GeometryError> {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1000 {
            let q = [
                rng.random_range(-10.0..10.0),
                rng.random_range(-10.0..10.0),
                rng.random_range(-10.0..10.0),
                rng.random_range(-10.0..10.0),
            ];
            if quaternion_norm(&q) < 1e-3 {
                continue;
            }
            let pose = Pose::new(q, [0.0; 3])?;
            assert!((quaternion_norm(&pose.quaternion()) - 1.0).abs() < 1e-6);
            assert!(orthonormality_error(&pose.rotation_matrix()) < 1e-5);
        }
        Ok(())
    }

    #[test]
    fn test_gimbal_lock_pose_has_zero_yaw() -> Result<(), GeometryError> {
        let half = std::f64::consts::FRAC_PI_4;
        let pose = Pose::new([half.cos(), 0.0, half.sin(), 0.0], [0.0; 3])?;
        let [_, pitch, yaw] = pose.euler_angles_deg();
        assert_eq!(yaw, 0.0);
        assert_relative_eq!(pitch, 90.0, epsilon = 1e-4);
        Ok(())
    }
}
