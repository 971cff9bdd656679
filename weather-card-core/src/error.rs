use std::{io, path::PathBuf};

use thiserror::Error;

/// Failures while loading a forecast delivered by the host.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("failed to read forecast file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse forecast JSON")]
    Parse(#[from] serde_json::Error),

    #[error("forecast samples are not ascending by datetime (sample {index})")]
    Unordered { index: usize },

    #[error("forecast sample {index} has {field} out of range")]
    OutOfRange { index: usize, field: &'static str },
}

/// Pointer capture was refused by the container.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("container is not connected")]
    NotConnected,

    #[error("pointer {0} is not active on this container")]
    InactivePointer(i32),
}
