use crate::value::ValueType;

/// Errors that can occur during frame and value encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The data byte count is outside `1..=8`.
    #[error("invalid data byte count {0} (expected 1..=8)")]
    InvalidDataCount(usize),

    /// The payload length does not match the declared data byte count.
    #[error("payload length {actual} does not match data byte count {expected}")]
    PayloadLengthMismatch { expected: usize, actual: usize },

    /// The bytes do not form a structurally valid frame.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// A value's byte representation has the wrong width for its type.
    #[error("{value_type} expects {expected} bytes, got {actual}")]
    ValueWidth {
        value_type: ValueType,
        expected: usize,
        actual: usize,
    },
}

pub type Result<T> = std::result::Result<T, FrameError>;
