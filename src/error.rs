use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GanError>;

/// Everything that can stop data loading, optimizer construction or a training step
#[derive(Debug, Error)]
pub enum GanError {
    #[error("no images found in '{}'", .path.display())]
    NoDataFound { path: PathBuf },

    #[error(
        "'{}' holds {found} samples, fewer than one batch of {batch_size}",
        .path.display()
    )]
    InsufficientData {
        path: PathBuf,
        found: usize,
        batch_size: usize,
    },

    #[error("format '{0}' not supported; only jpg, png, tfrecord and tfrecords are supported")]
    UnsupportedFormat(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("non-finite {metric} ({value}) at step {step}")]
    NumericInstability {
        step: u64,
        metric: String,
        value: f32,
    },

    /// (height, width, channels) after the shape policy ran
    #[error("'{source_name}' is {actual:?} after shape normalization, expected {expected:?}")]
    ShapeMismatch {
        source_name: String,
        expected: (usize, usize, usize),
        actual: (usize, usize, usize),
    },

    #[error("failed to decode '{source_name}'")]
    Decode {
        source_name: String,
        #[source]
        source: image::ImageError,
    },

    #[error("malformed record in '{}': {reason}", .path.display())]
    Record { path: PathBuf, reason: String },

    #[error("I/O error on '{}'", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("input stream '{0}' stopped producing batches")]
    StreamClosed(String),

    #[error("training loop failed at step {step}; no further steps run")]
    LoopFailed { step: u64 },
}

impl GanError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_data_message_names_root() {
        let err = GanError::NoDataFound {
            path: PathBuf::from("/data/faces"),
        };
        assert_eq!(err.to_string(), "no images found in '/data/faces'");
    }

    #[test]
    fn test_unsupported_format_message() {
        let err = GanError::UnsupportedFormat("bmp".to_string());
        assert!(err.to_string().starts_with("format 'bmp' not supported"));
    }
}
