#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Error types for the geometry module.
pub mod error;

/// Camera pose type built from a quaternion and a world-to-camera translation.
pub mod pose;

/// Unit quaternion helpers (scalar-first `w, x, y, z`).
pub mod quaternion;

/// Rotation matrix helpers and Euler angle decomposition.
pub mod rotation;

pub use error::GeometryError;
pub use pose::Pose;
