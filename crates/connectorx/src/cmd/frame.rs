use bytes::BytesMut;
use serde::Serialize;

use connectorx_frame::{packet_count_for, Transmission, TransmissionEncoder};
use connectorx_led::RegistryBuilder;
use connectorx_proto::{
    Command, HostSource, LedCommand, Request, RequestBody, Target, WireMessage,
};

use crate::cmd::{resolve_id, FrameArgs, FrameMessage, RequestArgs, RequestKind, TargetArgs};
use crate::exit::{wire_error, CliError, CliResult, SUCCESS};
use crate::output::{hex, parse_color, print_json, print_raw, print_table, OutputFormat};

#[derive(Serialize)]
struct FrameOutput {
    kind: String,
    body_len: usize,
    packets: usize,
    encoded_len: usize,
    hex: String,
}

pub fn run(args: FrameArgs, format: OutputFormat) -> CliResult<i32> {
    let transmission = build(&args.message)?;
    let mut encoded = BytesMut::new();
    TransmissionEncoder::starting_at(args.packet_id).encode_framed(&transmission, &mut encoded);

    let out = FrameOutput {
        kind: format!("{:?}", transmission.kind()),
        body_len: transmission.len(),
        packets: packet_count_for(transmission.len()),
        encoded_len: encoded.len(),
        hex: hex(&encoded),
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_table(
            &["TYPE", "BODY", "PACKETS", "BYTES", "HEX"],
            [vec![
                out.kind,
                out.body_len.to_string(),
                out.packets.to_string(),
                out.encoded_len.to_string(),
                out.hex,
            ]],
        ),
        OutputFormat::Pretty => println!("{}", out.hex),
        OutputFormat::Raw => print_raw(&encoded),
    }
    Ok(SUCCESS)
}

fn build(message: &FrameMessage) -> CliResult<Transmission> {
    let encoded = match message {
        FrameMessage::SetAnimation(args) => {
            let animation_id = resolve_id(&args.animation)?;
            let defaults = RegistryBuilder::with_builtins().build();
            let known = defaults.animation(animation_id);
            let color = match &args.color {
                Some(color) => parse_color(color).map_err(CliError::usage)?,
                None => known.map(|a| a.default_color).unwrap_or_default(),
            };
            let delay_ms = args
                .delay
                .or_else(|| known.map(|a| a.default_delay_ms))
                .ok_or_else(|| {
                    CliError::usage(format!(
                        "--delay is required for unknown animation {:?}",
                        args.animation
                    ))
                })?;
            Command::Led(LedCommand::SetAnimation {
                target: target(&args.target)?,
                animation_id,
                delay_ms,
                color,
                reversed: args.reversed,
                one_shot: args.one_shot,
            })
            .to_transmission()
        }
        FrameMessage::SetColor(args) => Command::Led(LedCommand::SetColor {
            target: target(&args.target)?,
            color: parse_color(&args.color).map_err(CliError::usage)?,
        })
        .to_transmission(),
        FrameMessage::Request(args) => request(args)?.to_transmission(),
    };
    encoded.map_err(|err| wire_error("encode failed", err))
}

fn target(args: &TargetArgs) -> CliResult<Target> {
    match (&args.zone, &args.group) {
        (Some(zone), None) => Ok(Target::Zone(resolve_id(zone)?)),
        (None, Some(group)) => Ok(Target::Group(resolve_id(group)?)),
        _ => Err(CliError::usage("exactly one of --zone or --group is required")),
    }
}

fn request(args: &RequestArgs) -> CliResult<Request> {
    let entity = || -> CliResult<u16> {
        let name = args
            .target
            .as_deref()
            .ok_or_else(|| CliError::usage(format!("{:?} needs --target", args.kind)))?;
        resolve_id(name)
    };
    let body = match args.kind {
        RequestKind::Handshake => RequestBody::Handshake {
            host: HostSource::Studio,
        },
        RequestKind::Status => RequestBody::Status,
        RequestKind::ProductSku => RequestBody::ProductSku,
        RequestKind::ProductSerialNumber => RequestBody::ProductSerialNumber,
        RequestKind::ConfigHash => RequestBody::ConfigHash,
        RequestKind::AssignedId => RequestBody::AssignedId,
        RequestKind::Faults => RequestBody::Faults,
        RequestKind::DeviceStatus => RequestBody::DeviceStatus {
            device_id: entity()?,
        },
        RequestKind::DeviceData => RequestBody::DeviceData {
            device_id: entity()?,
        },
        RequestKind::LedChannelStatus => RequestBody::LedChannelStatus {
            channel_id: entity()?,
        },
        RequestKind::LedZoneStatus => RequestBody::LedZoneStatus {
            zone_id: entity()?,
        },
        RequestKind::LatestEvent => RequestBody::LatestEvent,
        RequestKind::EventFlags => RequestBody::EventFlags,
        RequestKind::ModuleList => RequestBody::ModuleList,
    };
    Ok(Request::new(args.id, body))
}
