use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    println!("mucom {}", env!("CARGO_PKG_VERSION"));
    if !args.extended {
        return Ok(SUCCESS);
    }

    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "target: {}",
        option_env!("MUCOM_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "frame: max_data_count={} max_frame_len={}",
        mucom_frame::MAX_DATA_COUNT,
        mucom_frame::MAX_FRAME_LEN
    );
    println!(
        "value_types: {}",
        mucom_frame::ValueType::ALL
            .iter()
            .map(|ty| ty.name())
            .collect::<Vec<_>>()
            .join(", ")
    );

    Ok(SUCCESS)
}
