use mucom_frame::{to_hex, Value, ValueType};
use tracing::debug;

use crate::cmd::{connect, ReadArgs};
use crate::exit::{engine_error, frame_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat, ValueOutput};

pub fn run(args: ReadArgs, format: OutputFormat) -> CliResult<i32> {
    let engine = connect(&args.link)?;
    let count = match args.value_type {
        ValueType::Bytes => usize::from(args.count),
        fixed => fixed.width().unwrap_or(usize::from(args.count)),
    };

    debug!(id = args.id, value_type = %args.value_type, count, "reading variable");
    let payload = engine
        .read(args.id, count)
        .map_err(|err| engine_error("read failed", err))?;
    let value = Value::from_bytes(args.value_type, &payload)
        .map_err(|err| frame_error("invalid response", err))?;
    let _ = engine.close();

    print_record(
        &ValueOutput {
            id: args.id,
            value_type: args.value_type.to_string(),
            value: value.to_string(),
            bytes: to_hex(&payload),
        },
        format,
    );
    Ok(SUCCESS)
}
