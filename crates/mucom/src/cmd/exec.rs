use mucom_frame::{encode, to_hex, FrameKind, MAX_DATA_COUNT};
use tracing::debug;

use crate::cmd::{connect, parse_payload, ExecArgs};
use crate::exit::{engine_error, CliError, CliResult, SUCCESS};
use crate::output::{print_record, FrameOutput, OutputFormat};

pub fn run(args: ExecArgs, format: OutputFormat) -> CliResult<i32> {
    let mut payload = match &args.data {
        Some(hex) => parse_payload(hex)?,
        None => Vec::new(),
    };
    if payload.len() > MAX_DATA_COUNT {
        return Err(CliError::usage(format!(
            "payload is {} bytes, at most {MAX_DATA_COUNT} allowed",
            payload.len()
        )));
    }

    let engine = connect(&args.link)?;
    debug!(id = args.id, payload = %to_hex(&payload), "executing method");
    engine
        .execute(args.id, &payload)
        .map_err(|err| engine_error("execute failed", err))?;
    let _ = engine.close();

    if payload.is_empty() {
        payload.push(0);
    }
    let wire = encode(FrameKind::ExecuteRequest, args.id, payload.len(), &payload)
        .map(|bytes| to_hex(&bytes))
        .unwrap_or_default();
    print_record(
        &FrameOutput {
            kind: FrameKind::ExecuteRequest.to_string(),
            id: args.id,
            data_count: payload.len() as u8,
            payload: to_hex(&payload),
            wire_len: wire.len() / 2,
            wire,
        },
        format,
    );
    Ok(SUCCESS)
}
