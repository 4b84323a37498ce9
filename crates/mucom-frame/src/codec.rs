use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::kind::FrameKind;

/// Largest payload a single frame can carry.
pub const MAX_DATA_COUNT: usize = 8;

/// Length of the longest frame on the wire (8 payload bytes).
pub const MAX_FRAME_LEN: usize = 11;

/// Length of a read request, which never carries payload.
pub const READ_REQUEST_LEN: usize = 2;

const HEADER_MARKER: u8 = 0x80;
const SEVEN_BITS: u32 = 0x7F;

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// What the frame asks for.
    pub kind: FrameKind,
    /// Variable or function address.
    pub id: u8,
    /// Declared payload width in bytes (1..=8). For read requests this is the
    /// width the requester expects back.
    pub data_count: u8,
    /// Payload bytes; empty for read requests.
    pub payload: Bytes,
}

impl Frame {
    /// Build a payload-bearing frame, taking `data_count` from the payload.
    pub fn new(kind: FrameKind, id: u8, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        let data_count = checked_data_count(payload.len())?;
        if kind == FrameKind::ReadRequest {
            return Err(FrameError::PayloadLengthMismatch {
                expected: 0,
                actual: payload.len(),
            });
        }
        Ok(Self {
            kind,
            id,
            data_count,
            payload,
        })
    }

    /// Build a read request expecting `data_count` bytes back.
    pub fn read_request(id: u8, data_count: usize) -> Result<Self> {
        Ok(Self {
            kind: FrameKind::ReadRequest,
            id,
            data_count: checked_data_count(data_count)?,
            payload: Bytes::new(),
        })
    }

    /// Encode into the wire format.
    pub fn encode(&self) -> Result<Bytes> {
        encode(self.kind, self.id, self.data_count as usize, &self.payload)
    }

    /// The number of bytes this frame occupies on the wire.
    pub fn wire_len(&self) -> usize {
        frame_len(self.kind, self.data_count as usize)
    }
}

/// Returns true if `byte` starts a frame.
///
/// Only the first byte of a frame has its high bit set, which lets a receiver
/// resynchronize anywhere in the stream.
pub fn is_header_byte(byte: u8) -> bool {
    byte & HEADER_MARKER != 0
}

/// Data byte count declared by a header byte.
pub fn data_count_from_header(header: u8) -> usize {
    let field = ((header >> 2) & 0x07) as usize;
    match FrameKind::from_header(header) {
        // Read requests carry the width itself, with 8 wrapping to 0.
        FrameKind::ReadRequest if field == 0 => MAX_DATA_COUNT,
        FrameKind::ReadRequest => field,
        _ => field + 1,
    }
}

/// Wire length of a frame of `kind` carrying `data_count` bytes.
///
/// The id and payload form one bit stream: two bits ride in the header, the
/// rest is spread over following bytes seven bits at a time.
pub fn frame_len(kind: FrameKind, data_count: usize) -> usize {
    if kind.has_payload() {
        (data_count * 8 + 5) / 7 + 2
    } else {
        READ_REQUEST_LEN
    }
}

/// Encode a frame into a fresh buffer.
pub fn encode(kind: FrameKind, id: u8, data_count: usize, payload: &[u8]) -> Result<Bytes> {
    let mut dst = BytesMut::with_capacity(frame_len(kind, data_count.min(MAX_DATA_COUNT)));
    encode_into(kind, id, data_count, payload, &mut dst)?;
    Ok(dst.freeze())
}

/// Encode a frame, appending it to `dst`.
///
/// Wire format (bit 7 of every byte is the start-of-frame marker):
/// ```text
/// byte 0    1 | kind (2) | count field (3) | id bits 7-6
/// byte 1    0 | id bits 5-0 | payload[0] bit 7
/// byte 2..  0 | next 7 bits of the payload stream, zero padded at the end
/// ```
/// The count field holds `data_count - 1`, except in read requests, which
/// have no payload and carry the requested width itself (8 sent as 0).
pub fn encode_into(
    kind: FrameKind,
    id: u8,
    data_count: usize,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    let count = checked_data_count(data_count)?;
    let count_field = if kind.has_payload() {
        if payload.len() != data_count {
            return Err(FrameError::PayloadLengthMismatch {
                expected: data_count,
                actual: payload.len(),
            });
        }
        count - 1
    } else {
        if !payload.is_empty() {
            return Err(FrameError::PayloadLengthMismatch {
                expected: 0,
                actual: payload.len(),
            });
        }
        count & 0x07
    };

    dst.reserve(frame_len(kind, data_count));
    dst.put_u8(HEADER_MARKER | (kind.code() << 5) | (count_field << 2) | (id >> 6));

    if !kind.has_payload() {
        dst.put_u8((id & 0x3F) << 1);
        return Ok(());
    }

    let mut acc = u32::from(id & 0x3F);
    let mut bits = 6u32;
    for &byte in payload {
        acc = (acc << 8) | u32::from(byte);
        bits += 8;
        while bits >= 7 {
            bits -= 7;
            dst.put_u8(((acc >> bits) & SEVEN_BITS) as u8);
        }
        acc &= (1 << bits) - 1;
    }
    if bits > 0 {
        dst.put_u8(((acc << (7 - bits)) & SEVEN_BITS) as u8);
    }
    Ok(())
}

/// Decode one complete frame.
///
/// `bytes` must hold exactly one frame, header first.
pub fn decode(bytes: &[u8]) -> Result<Frame> {
    let (&header, body) = bytes
        .split_first()
        .ok_or_else(|| FrameError::Malformed("empty frame".to_string()))?;
    if !is_header_byte(header) {
        return Err(FrameError::Malformed(format!(
            "first byte {header:#04x} is not a header"
        )));
    }
    if let Some(pos) = body.iter().position(|&b| is_header_byte(b)) {
        return Err(FrameError::Malformed(format!(
            "header marker inside frame at offset {}",
            pos + 1
        )));
    }

    let kind = FrameKind::from_header(header);
    let data_count = data_count_from_header(header);
    let expected = frame_len(kind, data_count);
    if bytes.len() != expected {
        return Err(FrameError::Malformed(format!(
            "{kind} with {data_count} data bytes must be {expected} bytes long, got {}",
            bytes.len()
        )));
    }

    if !kind.has_payload() {
        return Ok(Frame {
            kind,
            id: ((header & 0x03) << 6) | ((body[0] >> 1) & 0x3F),
            data_count: data_count as u8,
            payload: Bytes::new(),
        });
    }

    // Reassemble id + payload from the 2 header bits and the 7-bit groups.
    let mut out = BytesMut::with_capacity(data_count + 1);
    let mut acc = u32::from(header & 0x03);
    let mut bits = 2u32;
    for &byte in body {
        acc = (acc << 7) | (u32::from(byte) & SEVEN_BITS);
        bits += 7;
        if bits >= 8 {
            bits -= 8;
            if out.len() <= data_count {
                out.put_u8((acc >> bits) as u8);
            }
            acc &= (1 << bits) - 1;
        }
    }

    let id = out[0];
    let payload = out.split_off(1).freeze();
    Ok(Frame {
        kind,
        id,
        data_count: data_count as u8,
        payload,
    })
}

fn checked_data_count(data_count: usize) -> Result<u8> {
    if (1..=MAX_DATA_COUNT).contains(&data_count) {
        Ok(data_count as u8)
    } else {
        Err(FrameError::InvalidDataCount(data_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WRITE_PAYLOAD: [u8; 8] = [0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF];
    const WRITE_WIRE: [u8; 11] = [
        0xDC, 0x4A, 0x01, 0x11, 0x51, 0x2C, 0x78, 0x4D, 0x2F, 0x1B, 0x6F,
    ];

    #[test]
    fn execute_request_vector() {
        let wire = encode(FrameKind::ExecuteRequest, 237, 1, &[0x43]).unwrap();
        assert_eq!(wire.as_ref(), &[0xE3, 0x5A, 0x43]);

        let frame = decode(&wire).unwrap();
        assert_eq!(frame.kind, FrameKind::ExecuteRequest);
        assert_eq!(frame.id, 237);
        assert_eq!(frame.data_count, 1);
        assert_eq!(frame.payload.as_ref(), &[0x43]);
    }

    #[test]
    fn read_request_vector() {
        let wire = encode(FrameKind::ReadRequest, 73, 4, &[]).unwrap();
        assert_eq!(wire.as_ref(), &[0xB1, 0x12]);

        let frame = decode(&wire).unwrap();
        assert_eq!(frame.kind, FrameKind::ReadRequest);
        assert_eq!(frame.id, 73);
        assert_eq!(frame.data_count, 4);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn write_request_vector() {
        let wire = encode(FrameKind::WriteRequest, 37, 8, &WRITE_PAYLOAD).unwrap();
        assert_eq!(wire.as_ref(), &WRITE_WIRE);

        let frame = decode(&wire).unwrap();
        assert_eq!(frame.kind, FrameKind::WriteRequest);
        assert_eq!(frame.id, 37);
        assert_eq!(frame.data_count, 8);
        assert_eq!(frame.payload.as_ref(), &WRITE_PAYLOAD);
    }

    #[test]
    fn roundtrip_every_id_kind_and_width() {
        for kind in FrameKind::ALL {
            for id in 0..=255u8 {
                for count in 1..=MAX_DATA_COUNT {
                    let payload: Vec<u8> = if kind.has_payload() {
                        (0..count)
                            .map(|i| id.wrapping_mul(31).wrapping_add((i as u8).wrapping_mul(97)) ^ 0xA5)
                            .collect()
                    } else {
                        Vec::new()
                    };

                    let wire = encode(kind, id, count, &payload).unwrap();
                    assert_eq!(wire.len(), frame_len(kind, count));
                    assert!(is_header_byte(wire[0]));
                    assert!(wire[1..].iter().all(|&b| !is_header_byte(b)));

                    let frame = decode(&wire).unwrap();
                    assert_eq!(frame.kind, kind);
                    assert_eq!(frame.id, id);
                    assert_eq!(frame.data_count as usize, count);
                    assert_eq!(frame.payload.as_ref(), payload.as_slice());
                }
            }
        }
    }

    #[test]
    fn read_requests_are_always_two_bytes() {
        for count in 1..=MAX_DATA_COUNT {
            let wire = encode(FrameKind::ReadRequest, 200, count, &[]).unwrap();
            assert_eq!(wire.len(), READ_REQUEST_LEN);
        }
    }

    #[test]
    fn frame_lengths_follow_bit_budget() {
        let lens: Vec<usize> = (1..=8)
            .map(|n| frame_len(FrameKind::WriteRequest, n))
            .collect();
        assert_eq!(lens, vec![3, 5, 6, 7, 8, 9, 10, 11]);
        assert_eq!(frame_len(FrameKind::ReadResponse, 8), MAX_FRAME_LEN);
    }

    #[test]
    fn encode_rejects_bad_data_count() {
        assert!(matches!(
            encode(FrameKind::WriteRequest, 1, 0, &[]),
            Err(FrameError::InvalidDataCount(0))
        ));
        assert!(matches!(
            encode(FrameKind::ReadRequest, 1, 9, &[]),
            Err(FrameError::InvalidDataCount(9))
        ));
    }

    #[test]
    fn encode_rejects_payload_length_mismatch() {
        assert!(matches!(
            encode(FrameKind::WriteRequest, 1, 2, &[1, 2, 3]),
            Err(FrameError::PayloadLengthMismatch {
                expected: 2,
                actual: 3
            })
        ));
        assert!(matches!(
            encode(FrameKind::ReadRequest, 1, 2, &[1]),
            Err(FrameError::PayloadLengthMismatch { .. })
        ));
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let err = decode(&WRITE_WIRE[..10]).unwrap_err();
        assert!(matches!(err, FrameError::Malformed(_)));

        let err = decode(&[0xB1, 0x12, 0x00]).unwrap_err();
        assert!(matches!(err, FrameError::Malformed(_)));
    }

    #[test]
    fn decode_rejects_missing_header() {
        assert!(matches!(decode(&[]), Err(FrameError::Malformed(_))));
        assert!(matches!(
            decode(&[0x63, 0x5A, 0x43]),
            Err(FrameError::Malformed(_))
        ));
    }

    #[test]
    fn decode_rejects_marker_inside_frame() {
        assert!(matches!(
            decode(&[0xE3, 0xDA, 0x43]),
            Err(FrameError::Malformed(_))
        ));
    }

    #[test]
    fn frame_helpers() {
        let frame = Frame::new(FrameKind::WriteRequest, 37, WRITE_PAYLOAD.to_vec()).unwrap();
        assert_eq!(frame.data_count, 8);
        assert_eq!(frame.wire_len(), 11);
        assert_eq!(frame.encode().unwrap().as_ref(), &WRITE_WIRE);

        let request = Frame::read_request(73, 4).unwrap();
        assert_eq!(request.encode().unwrap().as_ref(), &[0xB1, 0x12]);

        assert!(Frame::new(FrameKind::ReadRequest, 1, vec![1]).is_err());
        assert!(Frame::new(FrameKind::ExecuteRequest, 1, Vec::new()).is_err());
    }

    #[test]
    fn eight_byte_read_request_wraps_count_field() {
        let wire = encode(FrameKind::ReadRequest, 5, 8, &[]).unwrap();
        assert_eq!(wire[0] & 0x1C, 0);
        assert_eq!(decode(&wire).unwrap().data_count, 8);
    }
}
