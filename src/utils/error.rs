// src/utils/error.rs
use std::time::Duration;
use thiserror::Error;

// Failures of the OCR collaborator. Fatal for the document being processed.
#[derive(Error, Debug)]
pub enum OcrError {
    #[error("OCR service did not answer within {0:?}")]
    Timeout(Duration),

    #[error("OCR failed: {0}")]
    Failure(String),
}

// Terminal conditions of the line extraction stage. Everything after that
// stage is infallible: a rule that finds nothing yields an absent field.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Document unreadable: {0}")]
    DocumentUnreadable(String),

    #[error(transparent)]
    Ocr(#[from] OcrError),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Data processing failed: {0}")]
    Processing(String),
}
