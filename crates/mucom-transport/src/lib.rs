//! Byte transport abstraction for the mucom protocol.
//!
//! The protocol engine only needs a duplex byte channel with a "data arrived"
//! notification. This crate defines that capability as the [`Transport`]
//! trait and provides two implementations:
//! - [`MemoryTransport`]: an in-process duplex pair
//! - [`StreamTransport`]: a connected Unix domain socket, standing in for a
//!   serial line
//!
//! This is the lowest layer of mucom. Everything else builds on top of it.

pub mod error;
pub mod memory;
pub mod traits;

#[cfg(unix)]
pub mod stream;
#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use memory::MemoryTransport;
pub use traits::{DataReceivedHandler, Transport, DEFAULT_READ_TIMEOUT};

#[cfg(unix)]
pub use stream::StreamTransport;
#[cfg(unix)]
pub use uds::UnixDomainSocket;
