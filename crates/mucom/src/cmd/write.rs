use mucom_frame::{to_hex, Value};
use tracing::debug;

use crate::cmd::{connect, WriteArgs};
use crate::exit::{engine_error, CliError, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat, ValueOutput};

pub fn run(args: WriteArgs, format: OutputFormat) -> CliResult<i32> {
    let value = Value::parse(args.value_type, &args.value).map_err(CliError::usage)?;
    let data = value.to_bytes();

    let engine = connect(&args.link)?;
    debug!(id = args.id, %value, "writing variable");
    engine
        .write(args.id, &data)
        .map_err(|err| engine_error("write failed", err))?;
    let _ = engine.close();

    print_record(
        &ValueOutput {
            id: args.id,
            value_type: args.value_type.to_string(),
            value: value.to_string(),
            bytes: to_hex(&data),
        },
        format,
    );
    Ok(SUCCESS)
}
