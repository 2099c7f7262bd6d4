#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Configuration of an export run.
pub mod config;

/// Error types for the export module.
pub mod error;

/// Global pose table (`global_pose.txt` / `global_poses.txt`).
pub mod global;

/// Per-pair match files.
pub mod matches;

/// The batch export driving readers, resolver and writers.
pub mod pipeline;

/// Text, CSV and JSON pose files.
pub mod poses;

/// Selection and normalization of image poses.
pub mod resolve;

/// Human-readable run and database statistics.
pub mod summary;

pub use config::{ExportConfig, PoseFormat};
pub use error::ExportError;
pub use pipeline::run;
