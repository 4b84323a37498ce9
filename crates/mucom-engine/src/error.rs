use std::time::Duration;

/// Errors that can occur in engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] mucom_transport::TransportError),

    /// Frame or value encoding error.
    #[error("frame error: {0}")]
    Frame(#[from] mucom_frame::FrameError),

    /// No read response arrived within the read timeout.
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// The peer answered a read with a different width than requested.
    #[error(
        "response carries {actual} data bytes instead of {expected}; \
         check that both sides declare the same variable type"
    )]
    ProtocolMismatch { expected: usize, actual: usize },

    /// A binding or engine setting is invalid.
    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
