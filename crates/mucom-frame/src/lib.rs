//! 7-bit clean framing for the mucom serial protocol.
//!
//! Every frame starts with the only byte on the wire that has its high bit
//! set. The header carries:
//! - the frame kind (read response / read request / write / execute)
//! - the payload width (1-8 bytes)
//! - the top two bits of the 8-bit target id
//!
//! The remaining id bits and the payload follow as a bit stream packed seven
//! bits per byte. [`FrameReceiver`] turns a noisy byte stream back into
//! frames; [`value`] maps scalar values to payload bytes.

pub mod codec;
pub mod error;
pub mod kind;
pub mod receiver;
pub mod value;

pub use codec::{
    data_count_from_header, decode, encode, encode_into, frame_len, is_header_byte, Frame,
    MAX_DATA_COUNT, MAX_FRAME_LEN, READ_REQUEST_LEN,
};
pub use error::{FrameError, Result};
pub use kind::FrameKind;
pub use receiver::FrameReceiver;
pub use value::{parse_hex, to_hex, Scalar, Value, ValueType};
