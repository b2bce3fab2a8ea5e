use std::fmt::{Display, Formatter};

/// Error type for mixer operations and their collaborators.
#[derive(Debug)]
pub enum MixerError {
    /// The track id is not in the catalog, or its backing resource is missing.
    ResourceNotFound(String),
    /// The shared audio output could not be claimed.
    OutputAcquisitionFailed(String),
    Decode(String),
    Io(std::io::Error),
    Config(String),
}

impl Display for MixerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ResourceNotFound(err) => write!(f, "resource not found: {}", err),
            Self::OutputAcquisitionFailed(err) => write!(f, "output acquisition failed: {}", err),
            Self::Decode(err) => write!(f, "decode error: {}", err),
            Self::Io(err) => write!(f, "io error: {}", err),
            Self::Config(err) => write!(f, "invalid configuration: {}", err),
        }
    }
}

impl std::error::Error for MixerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MixerError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for MixerError {
    fn from(value: serde_json::Error) -> Self {
        Self::Config(value.to_string())
    }
}

/// Convenience result alias for mixer operations.
pub type Result<T> = std::result::Result<T, MixerError>;
