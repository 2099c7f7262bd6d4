/// Error types for the geometry module.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GeometryError {
    /// The quaternion has zero (or non-finite) norm and cannot be normalized.
    #[error("Cannot normalize quaternion [{0}, {1}, {2}, {3}]: norm is zero or not finite")]
    ZeroNormQuaternion(f64, f64, f64, f64),
}
