//! Property tests for the receive state machine.
//!
//! Whatever garbage precedes it, a complete frame fed to the receiver comes
//! out exactly once and unchanged.

use mucom_frame::{decode, encode, frame_len, FrameKind, FrameReceiver, MAX_DATA_COUNT};
use proptest::prelude::*;

fn kind_strategy() -> impl Strategy<Value = FrameKind> {
    prop::sample::select(FrameKind::ALL.to_vec())
}

/// Wire bytes of a frame with random kind, id and width.
fn frame_strategy() -> impl Strategy<Value = (FrameKind, u8, Vec<u8>)> {
    (
        kind_strategy(),
        any::<u8>(),
        prop::collection::vec(any::<u8>(), 1..=MAX_DATA_COUNT),
    )
}

fn wire(kind: FrameKind, id: u8, data: &[u8]) -> Vec<u8> {
    let payload: &[u8] = if kind.has_payload() { data } else { &[] };
    encode(kind, id, data.len(), payload).unwrap().to_vec()
}

proptest! {
    /// Non-header noise, then a frame cut short, then a complete frame.
    #[test]
    fn prop_frame_survives_garbage_prefix(
        noise in prop::collection::vec(0u8..0x80, 0..32),
        (cut_kind, cut_id, cut_data) in frame_strategy(),
        cut_at in any::<prop::sample::Index>(),
        (kind, id, data) in frame_strategy(),
    ) {
        let partial = wire(cut_kind, cut_id, &cut_data);
        let keep = cut_at.index(frame_len(cut_kind, cut_data.len()));
        let full = wire(kind, id, &data);

        let mut stream = noise;
        stream.extend_from_slice(&partial[..keep]);
        stream.extend_from_slice(&full);

        let mut receiver = FrameReceiver::new();
        let out = receiver.push_slice(&stream);

        prop_assert_eq!(out.len(), 1);
        let frame = out.into_iter().next().unwrap().unwrap();
        prop_assert_eq!(&frame, &decode(&full).unwrap());
        prop_assert_eq!(frame.kind, kind);
        prop_assert_eq!(frame.id, id);
        prop_assert_eq!(usize::from(frame.data_count), data.len());
        if kind.has_payload() {
            prop_assert_eq!(frame.payload.as_ref(), data.as_slice());
        } else {
            prop_assert!(frame.payload.is_empty());
        }
        prop_assert!(!receiver.is_collecting());
    }
}
