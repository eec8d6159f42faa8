//! Error types for container building and parsing

use thiserror::Error;

/// Errors that can occur when building or parsing a recording container
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Input bytes were rejected by the engine at parser construction
    #[error("Malformed container: {0}")]
    MalformedContainer(String),

    /// Unknown camera device type discriminant
    ///
    /// Never produced for containers written by this library; containers
    /// from future or foreign writers may carry discriminants we do not know.
    #[error("Unsupported camera device type: {0}")]
    UnsupportedDeviceType(i32),

    /// A record was built without a camera calibration
    #[error("No camera calibration set before build")]
    MissingCalibration,

    /// Failed to decode a payload exchanged across the engine boundary
    #[error("Decode failed: {0}")]
    Decode(String),

    /// The engine returned an error sentinel for an operation
    #[error("Engine call failed: {0}")]
    Engine(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Decode(e.to_string())
    }
}
