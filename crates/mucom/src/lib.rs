//! Typed variables and remote procedures over a 7-bit clean serial link.
//!
//! mucom lets two peers read and write each other's variables and trigger
//! each other's functions, addressed by 8-bit ids, over any duplex byte
//! stream. Frames mark their first byte with the high bit, so a receiver
//! resynchronizes after noise or loss without any framing escape.
//!
//! # Crate Structure
//!
//! - [`transport`] — byte transport abstraction (in-memory pair, Unix sockets)
//! - [`frame`] — 7-bit frame codec, receive state machine and value codec
//! - [`engine`] — binding registry, request dispatch and blocking reads

/// Re-export transport types.
pub mod transport {
    pub use mucom_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use mucom_frame::*;
}

/// Re-export engine types.
pub mod engine {
    pub use mucom_engine::*;
}

pub use mucom_engine::{Engine, EngineConfig, EngineError, Variable};
pub use mucom_frame::{Scalar, Value, ValueType};
pub use mucom_transport::{MemoryTransport, Transport};
