//! Codec error types

use thiserror::Error;

/// Errors raised while decoding a wire frame
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The discriminant names no registered variant
    #[error("Unknown event kind: '{0}'")]
    UnknownEventKind(String),

    /// The frame is not valid JSON, lacks a field, or the content does not
    /// match the shape declared by its discriminant
    #[error("Malformed payload: {0}")]
    MalformedPayload(#[source] serde_json::Error),
}

/// Errors raised while encoding an event
#[derive(Error, Debug)]
#[error("Failed to encode event: {0}")]
pub struct EncodeError(#[from] pub serde_json::Error);
