use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure of a single decode path, or of both paths together.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported or corrupt container: {0}")]
    Probe(String),

    #[error("no decodable audio track")]
    NoAudioTrack,

    #[error("codec error: {0}")]
    Codec(String),

    #[error("resampling decoded audio failed: {0}")]
    Resample(String),

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("decoder process timed out after {0:?}")]
    Timeout(Duration),

    #[error("decode cancelled")]
    Cancelled,

    #[error("decoder process exited with {status}: {stderr}")]
    ProcessFailed { status: String, stderr: String },

    #[error("decoder produced no samples")]
    Empty,

    #[error("could not decode {path} (primary: {primary}; fallback: {fallback})")]
    Unrecoverable {
        path: PathBuf,
        primary: Box<DecodeError>,
        fallback: Box<DecodeError>,
    },
}

/// Errors that abort a whole analysis call.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("decoded audio is unusable: {0}")]
    EmptyOrInvalidBuffer(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("analysis cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Soft failure of one feature. Logged and turned into null report fields.
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("input too short or degenerate: {0}")]
    Degenerate(&'static str),

    #[error("loudness meter error: {0}")]
    Loudness(String),

    #[error("resampling failed: {0}")]
    Resample(String),

    #[error("feature panicked: {0}")]
    Panicked(String),

    #[error("cancelled")]
    Cancelled,
}

impl From<ebur128::Error> for FeatureError {
    fn from(err: ebur128::Error) -> Self {
        Self::Loudness(format!("{:?}", err))
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
pub type FeatureResult<T> = std::result::Result<T, FeatureError>;

/// Construction or processing failure inside the resampler.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ResampleError(pub String);

impl From<ResampleError> for DecodeError {
    fn from(err: ResampleError) -> Self {
        Self::Resample(err.0)
    }
}

impl From<ResampleError> for FeatureError {
    fn from(err: ResampleError) -> Self {
        Self::Resample(err.0)
    }
}
