use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};
use connectorx_led::create_id;

use crate::exit::{CliError, CliResult};
use crate::output::OutputFormat;

pub mod decode;
pub mod frame;
pub mod id;
pub mod run;
pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the numeric ids of names.
    Id(IdArgs),
    /// Encode a command or request as framed bytes.
    Frame(FrameArgs),
    /// Decode framed bytes into transmissions.
    Decode(DecodeArgs),
    /// Run one animation on a simulated strip and print each flush.
    Simulate(SimulateArgs),
    /// Run a device node over a serial link.
    Run(RunArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Id(args) => id::run(args, format),
        Command::Frame(args) => frame::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Simulate(args) => simulate::run(args, format),
        Command::Run(args) => run::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// A name, or an explicit `0x`-prefixed numeric id.
pub fn resolve_id(input: &str) -> CliResult<u16> {
    match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(digits) => u16::from_str_radix(digits, 16)
            .map_err(|_| CliError::usage(format!("invalid id {input:?}"))),
        None => Ok(create_id(input)),
    }
}

#[derive(Args, Debug)]
pub struct IdArgs {
    /// Names to hash.
    #[arg(required = true)]
    pub names: Vec<String>,
}

#[derive(Args, Debug)]
pub struct FrameArgs {
    #[command(subcommand)]
    pub message: FrameMessage,
    /// Id of the first packet.
    #[arg(long, default_value = "0", global = true)]
    pub packet_id: u16,
}

#[derive(Subcommand, Debug)]
pub enum FrameMessage {
    /// SetAnimation on a zone or group.
    SetAnimation(SetAnimationArgs),
    /// SetColor on a zone or group.
    SetColor(SetColorArgs),
    /// A host request.
    Request(RequestArgs),
}

#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Target zone (name or 0x id).
    #[arg(long, conflicts_with = "group", required_unless_present = "group")]
    pub zone: Option<String>,
    /// Target animation group (name or 0x id).
    #[arg(long)]
    pub group: Option<String>,
}

#[derive(Args, Debug)]
pub struct SetAnimationArgs {
    #[command(flatten)]
    pub target: TargetArgs,
    /// Animation name or 0x id.
    #[arg(long)]
    pub animation: String,
    /// Frame delay in milliseconds. Default: the animation's own.
    #[arg(long)]
    pub delay: Option<u16>,
    /// Colour as rrggbb. Default: the animation's own.
    #[arg(long)]
    pub color: Option<String>,
    #[arg(long)]
    pub reversed: bool,
    #[arg(long)]
    pub one_shot: bool,
}

#[derive(Args, Debug)]
pub struct SetColorArgs {
    #[command(flatten)]
    pub target: TargetArgs,
    /// Colour as rrggbb.
    #[arg(long)]
    pub color: String,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum RequestKind {
    Handshake,
    Status,
    ProductSku,
    ProductSerialNumber,
    ConfigHash,
    AssignedId,
    Faults,
    DeviceStatus,
    DeviceData,
    LedChannelStatus,
    LedZoneStatus,
    LatestEvent,
    EventFlags,
    ModuleList,
}

#[derive(Args, Debug)]
pub struct RequestArgs {
    pub kind: RequestKind,
    /// Request id echoed by the response.
    #[arg(long, default_value = "1")]
    pub id: u32,
    /// Device, channel or zone the request is about (name or 0x id).
    #[arg(long)]
    pub target: Option<String>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Hex bytes. Reads stdin when omitted.
    pub hex: Option<String>,
    /// Read raw bytes from a file instead.
    #[arg(long, conflicts_with = "hex")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Configuration JSON.
    #[arg(long)]
    pub config: PathBuf,
    /// Zone to animate (name or 0x id).
    #[arg(long)]
    pub zone: String,
    /// Animation name or 0x id.
    #[arg(long)]
    pub animation: String,
    /// Frame delay in milliseconds. Default: the animation's own.
    #[arg(long)]
    pub delay: Option<u16>,
    /// Colour as rrggbb. Default: the animation's own.
    #[arg(long)]
    pub color: Option<String>,
    #[arg(long)]
    pub reversed: bool,
    #[arg(long)]
    pub one_shot: bool,
    /// Simulated milliseconds to run.
    #[arg(long, default_value = "1000")]
    pub duration: u64,
    /// Tick period in milliseconds.
    #[arg(long, default_value = "5")]
    pub step: u64,
    /// Directory holding bitmap files.
    #[arg(long, value_name = "DIR")]
    pub bitmaps: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Configuration JSON. Default: the stored configuration under --files.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Serial device of the host link.
    #[arg(long, env = "CONNECTORX_PORT")]
    pub port: String,
    #[arg(long, default_value = "115200")]
    pub baud: u32,
    /// Device filesystem root.
    #[arg(long, value_name = "DIR", env = "CONNECTORX_FILES")]
    pub files: Option<PathBuf>,
    /// Board serial number reported to hosts.
    #[arg(long, default_value = "0")]
    pub serial_number: u64,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
