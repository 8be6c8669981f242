use std::path::PathBuf;

use thiserror::Error;

use crate::layout::Roi;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode or encode {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Runtime(#[from] ort::Error),
    #[error("invalid config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid run configuration: {0}")]
    Validation(String),
    #[error("mask is {mask_width}x{mask_height} but image is {width}x{height}")]
    MaskMismatch {
        mask_width: u32,
        mask_height: u32,
        width: u32,
        height: u32,
    },
    #[error("failed to serialize geotag for {path}: {source}")]
    Sidecar {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read or build EXIF for {path}: {source}")]
    Exif {
        path: PathBuf,
        #[source]
        source: exif::Error,
    },
    #[error("failed to parse JPEG segments of {path}: {source}")]
    Jpeg {
        path: PathBuf,
        #[source]
        source: img_parts::Error,
    },
    #[error(transparent)]
    Oracle(#[from] OracleFault),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        Self::Image {
            path: path.into(),
            source,
        }
    }
}

/// Failure of the recognizer itself, as opposed to "no text found".
#[derive(Debug, Error)]
pub enum OracleError {
    #[error(transparent)]
    Runtime(#[from] ort::Error),
    #[error("recognition exceeded its budget of {budget_ms} ms")]
    Timeout { budget_ms: u128 },
    #[error("unexpected model output: {0}")]
    Decode(String),
}

/// An [`OracleError`] tagged with the region that was being read.
#[derive(Debug, Error)]
#[error("recognizer failed on {roi}: {source}")]
pub struct OracleFault {
    pub roi: Roi,
    #[source]
    pub source: OracleError,
}
