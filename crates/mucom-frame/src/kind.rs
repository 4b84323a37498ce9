//! Frame kinds.
//!
//! The kind occupies bits 6-5 of the header byte.

use std::fmt;

/// What a frame asks the receiving side to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    /// Answer to a [`FrameKind::ReadRequest`], carrying the variable's bytes.
    ReadResponse = 0,
    /// Ask the peer for the current value of a variable. Carries no payload.
    ReadRequest = 1,
    /// Overwrite a variable on the peer.
    WriteRequest = 2,
    /// Invoke a function on the peer with the payload as argument.
    ExecuteRequest = 3,
}

impl FrameKind {
    /// All kinds, in wire order.
    pub const ALL: [FrameKind; 4] = [
        FrameKind::ReadResponse,
        FrameKind::ReadRequest,
        FrameKind::WriteRequest,
        FrameKind::ExecuteRequest,
    ];

    /// Extract the kind from a header byte.
    pub fn from_header(header: u8) -> Self {
        match (header >> 5) & 0x03 {
            0 => FrameKind::ReadResponse,
            1 => FrameKind::ReadRequest,
            2 => FrameKind::WriteRequest,
            _ => FrameKind::ExecuteRequest,
        }
    }

    /// The 2-bit wire code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether frames of this kind carry payload bytes on the wire.
    pub fn has_payload(self) -> bool {
        self != FrameKind::ReadRequest
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            FrameKind::ReadResponse => "read-response",
            FrameKind::ReadRequest => "read-request",
            FrameKind::WriteRequest => "write-request",
            FrameKind::ExecuteRequest => "execute-request",
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for FrameKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FrameKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown frame kind '{s}'"))
    }
}
