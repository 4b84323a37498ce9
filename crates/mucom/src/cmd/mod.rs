use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use mucom_engine::{Engine, EngineConfig};
use mucom_frame::{parse_hex, FrameKind, Value, ValueType};
use mucom_transport::{StreamTransport, UnixDomainSocket};

use crate::exit::{engine_error, transport_error, CliError, CliResult};
use crate::output::OutputFormat;

pub mod codec;
pub mod device;
pub mod exec;
pub mod read;
pub mod version;
pub mod write;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Emulate a device: serve variables and methods on a Unix socket.
    Device(DeviceArgs),
    /// Read a variable from a device.
    Read(ReadArgs),
    /// Write a variable on a device.
    Write(WriteArgs),
    /// Execute a method on a device.
    Exec(ExecArgs),
    /// Decode a hex-encoded frame.
    Decode(DecodeArgs),
    /// Encode a frame and print it as hex.
    Encode(EncodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Device(args) => device::run(args, format),
        Command::Read(args) => read::run(args, format),
        Command::Write(args) => write::run(args, format),
        Command::Exec(args) => exec::run(args, format),
        Command::Decode(args) => codec::decode(args, format),
        Command::Encode(args) => codec::encode(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// A variable served by `device`, given as `ID:TYPE[=VALUE]`.
#[derive(Clone, Debug, PartialEq)]
pub struct VarSpec {
    pub id: u8,
    pub value: Value,
}

impl std::str::FromStr for VarSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (binding, initial) = match s.split_once('=') {
            Some((binding, initial)) => (binding, Some(initial)),
            None => (s, None),
        };
        let (id, value_type) = binding
            .split_once(':')
            .ok_or_else(|| format!("expected ID:TYPE[=VALUE], got '{s}'"))?;
        let id: u8 = id
            .trim()
            .parse()
            .map_err(|_| format!("invalid variable id '{id}' (expected 0-255)"))?;
        let value_type: ValueType = value_type.trim().parse()?;
        let initial = initial.unwrap_or(match value_type {
            ValueType::Bytes => "00",
            _ => "0",
        });
        let value = Value::parse(value_type, initial)?;
        Ok(Self { id, value })
    }
}

#[derive(Args, Debug)]
pub struct DeviceArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Variable to serve, as ID:TYPE[=VALUE] (repeatable).
    #[arg(long = "var", value_name = "ID:TYPE[=VALUE]")]
    pub vars: Vec<VarSpec>,
    /// Method id to serve; executions are printed (repeatable).
    #[arg(long = "method", value_name = "ID")]
    pub methods: Vec<u8>,
    /// Exit after the first connection closes.
    #[arg(long)]
    pub once: bool,
}

/// Connection options shared by commands that talk to a device.
#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Socket path of the device.
    pub path: PathBuf,
    /// Response timeout (e.g. 500ms, 2s).
    #[arg(long, env = "MUCOM_TIMEOUT", default_value = "100ms")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Variable id.
    #[arg(long)]
    pub id: u8,
    /// Variable type.
    #[arg(long = "type", value_name = "TYPE")]
    pub value_type: ValueType,
    /// Byte count for `bytes` variables.
    #[arg(long, default_value_t = 8, value_parser = clap::value_parser!(u8).range(1..=8))]
    pub count: u8,
}

#[derive(Args, Debug)]
pub struct WriteArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Variable id.
    #[arg(long)]
    pub id: u8,
    /// Variable type.
    #[arg(long = "type", value_name = "TYPE")]
    pub value_type: ValueType,
    /// Value to write; hex for `bytes`.
    #[arg(long, allow_hyphen_values = true)]
    pub value: String,
}

#[derive(Args, Debug)]
pub struct ExecArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Method id.
    #[arg(long)]
    pub id: u8,
    /// Payload as hex (1 to 8 bytes). Default: a single zero byte.
    #[arg(long, value_name = "HEX")]
    pub data: Option<String>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Frame bytes as hex, e.g. e35a43.
    pub hex: String,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Frame kind.
    #[arg(long)]
    pub kind: FrameKind,
    /// Variable or method id.
    #[arg(long)]
    pub id: u8,
    /// Requested byte count for read requests.
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=8))]
    pub count: Option<u8>,
    /// Payload as hex.
    #[arg(long, value_name = "HEX")]
    pub data: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build information.
    #[arg(long)]
    pub extended: bool,
}

/// Connect to a device socket and open an engine on it.
pub(crate) fn connect(link: &LinkArgs) -> CliResult<Arc<Engine<StreamTransport>>> {
    let timeout = parse_duration(&link.timeout)?;
    let transport = UnixDomainSocket::connect(&link.path)
        .map_err(|err| transport_error("connect failed", err))?;
    let config = EngineConfig::default().with_read_timeout(timeout);
    let engine = Engine::with_config(transport, config)
        .map_err(|err| engine_error("engine setup failed", err))?;
    engine
        .open()
        .map_err(|err| engine_error("open failed", err))?;
    Ok(engine)
}

pub(crate) fn parse_payload(hex: &str) -> CliResult<Vec<u8>> {
    parse_hex(hex).map_err(|err| CliError::usage(format!("invalid hex payload: {err}")))
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, true)
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
