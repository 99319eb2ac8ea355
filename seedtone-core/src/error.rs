//! Error types for catalog loading, configuration and generation.
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catalog violates one of its invariants
    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),

    /// Configuration file exists but cannot be used
    #[error("invalid config {}: {reason}", .path.display())]
    InvalidConfig { path: PathBuf, reason: String },

    /// Checkpoint directory holds no complete model
    #[error("no usable models found in {}", .0.display())]
    NoModels(PathBuf),

    /// Provider could not be brought up
    #[error("provider initialization failed: {0}")]
    ProviderInit(String),

    #[error("ONNX runtime error: {0}")]
    Ort(#[from] ort::Error),

    #[error("tensor shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("sampling error: {0}")]
    Sampling(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
