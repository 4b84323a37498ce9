use mucom_frame::{decode as decode_frame, to_hex, Frame, FrameKind};

use crate::cmd::{parse_payload, DecodeArgs, EncodeArgs};
use crate::exit::{frame_error, CliError, CliResult, SUCCESS};
use crate::output::{print_raw, print_record, FrameOutput, OutputFormat};

pub fn decode(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let wire = parse_payload(&args.hex)?;
    let frame = decode_frame(&wire).map_err(|err| frame_error("decode failed", err))?;

    if let OutputFormat::Raw = format {
        print_raw(&frame.payload);
        return Ok(SUCCESS);
    }
    print_record(&frame_output(&frame, &wire), format);
    Ok(SUCCESS)
}

pub fn encode(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let frame = if args.kind == FrameKind::ReadRequest {
        if args.data.is_some() {
            return Err(CliError::usage("read requests carry no payload; use --count"));
        }
        Frame::read_request(args.id, usize::from(args.count.unwrap_or(1)))
    } else {
        let Some(hex) = &args.data else {
            return Err(CliError::usage(format!("{} frames need --data", args.kind)));
        };
        let payload = parse_payload(hex)?;
        if let Some(count) = args.count {
            if usize::from(count) != payload.len() {
                return Err(CliError::usage(format!(
                    "--count {count} does not match {} payload bytes",
                    payload.len()
                )));
            }
        }
        Frame::new(args.kind, args.id, payload)
    }
    .map_err(|err| frame_error("encode failed", err))?;

    let wire = frame
        .encode()
        .map_err(|err| frame_error("encode failed", err))?;
    print_record(&frame_output(&frame, &wire), format);
    Ok(SUCCESS)
}

fn frame_output(frame: &Frame, wire: &[u8]) -> FrameOutput {
    FrameOutput {
        kind: frame.kind.to_string(),
        id: frame.id,
        data_count: frame.data_count,
        payload: to_hex(&frame.payload),
        wire: to_hex(wire),
        wire_len: wire.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_output_describes_vector() {
        let wire = [0xE3, 0x5A, 0x43];
        let frame = decode_frame(&wire).unwrap();
        let out = frame_output(&frame, &wire);
        assert_eq!(out.kind, "execute-request");
        assert_eq!(out.id, 237);
        assert_eq!(out.payload, "43");
        assert_eq!(out.wire, "e35a43");
        assert_eq!(out.wire_len, 3);
    }

    #[test]
    fn encode_requires_payload_for_writes() {
        let args = EncodeArgs {
            kind: FrameKind::WriteRequest,
            id: 1,
            count: None,
            data: None,
        };
        let err = encode(args, OutputFormat::Json).unwrap_err();
        assert_eq!(err.code, crate::exit::USAGE);
    }
}
