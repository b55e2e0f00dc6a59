//! # Diagnosis Error Types Module
//!
//! This module defines the error types used along the photo intake pipeline.
//! Every variant is recovered at the intake handler boundary and turned into a
//! generic user-facing apology; the detail only reaches the operator log.

/// Custom error types for diagnosis operations
#[derive(Debug, Clone)]
pub enum DiagnosisError {
    /// Downloading or persisting the incoming photo failed
    Download(String),
    /// Model or label file could not be loaded
    ModelLoad(String),
    /// Image decoding or preprocessing errors
    ImageLoad(String),
    /// Inference errors, including output/label mismatches
    Inference(String),
    /// Timeout errors
    Timeout(String),
}

impl std::fmt::Display for DiagnosisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosisError::Download(msg) => write!(f, "Download error: {msg}"),
            DiagnosisError::ModelLoad(msg) => write!(f, "Model load error: {msg}"),
            DiagnosisError::ImageLoad(msg) => write!(f, "Image load error: {msg}"),
            DiagnosisError::Inference(msg) => write!(f, "Inference error: {msg}"),
            DiagnosisError::Timeout(msg) => write!(f, "Timeout error: {msg}"),
        }
    }
}

impl std::error::Error for DiagnosisError {}

impl From<std::io::Error> for DiagnosisError {
    fn from(err: std::io::Error) -> Self {
        DiagnosisError::Download(err.to_string())
    }
}
