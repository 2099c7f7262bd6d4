use sfmkit_geometry::GeometryError;

/// An error type for the io module.
#[derive(thiserror::Error, Debug)]
pub enum SfmIoError {
    /// A file, table or row referenced by id does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A blob or text field does not match its declared shape.
    #[error("Failed to decode: {0}")]
    Decode(String),

    /// A binary record is truncated or corrupt, or a pose cannot be normalized.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// A pair id component is outside the valid range.
    #[error("Out of range: {0}")]
    Range(String),

    /// Error to read the file.
    #[error("Failed to manipulate the file. {0}")]
    Io(#[from] std::io::Error),

    /// Error returned by the SQLite driver.
    #[error("Database error. {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl From<GeometryError> for SfmIoError {
    fn from(err: GeometryError) -> Self {
        SfmIoError::MalformedRecord(err.to_string())
    }
}
