#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Reinterpretation of packed binary blobs as typed arrays.
pub mod blob;

/// Reader for the COLMAP SQLite feature database.
///
/// See [`database::ColmapDatabase`] for the scoped database handle.
pub mod database;

/// Error types for the io module.
///
/// Defines [`SfmIoError`] with the not-found, decode, malformed-record and range cases.
pub mod error;

/// Keypoint/descriptor and match text files written by external feature tools.
pub mod features;

/// Readers for COLMAP sparse models in binary and text encodings.
pub mod model;

/// Packing of an image pair into a single pair id.
pub mod pair_id;

/// Records produced by the readers.
pub mod types;

pub use error::SfmIoError;
