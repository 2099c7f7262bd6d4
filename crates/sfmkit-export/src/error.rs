use sfmkit_io::SfmIoError;

/// An error type for the export module.
#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    /// Error reading the database or the model.
    #[error(transparent)]
    Read(#[from] SfmIoError),

    /// Error to write an output file.
    #[error("Failed to write the output file. {0}")]
    Io(#[from] std::io::Error),

    /// Error to serialize or parse JSON.
    #[error("JSON error. {0}")]
    Json(#[from] serde_json::Error),

    /// Error to write a CSV record.
    #[error("CSV error. {0}")]
    Csv(#[from] csv::Error),

    /// The run configuration cannot be used.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
