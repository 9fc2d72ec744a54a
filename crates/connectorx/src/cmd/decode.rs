use std::io::{Cursor, Read};

use serde::Serialize;

use connectorx_frame::{FrameError, Transmission, TransmissionReader, TransmissionType};
use connectorx_proto::{
    Command, Event, FileTransfer, ModuleData, Request, Response, Result as WireResult,
    WireMessage,
};

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{hex, parse_hex, print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct DecodedOutput {
    kind: String,
    body_len: usize,
    decoded: String,
}

#[derive(Serialize)]
struct DecodeReport {
    transmissions: Vec<DecodedOutput>,
    dropped: Vec<String>,
    malformed_frames: u64,
}

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = input(&args)?;
    let report = decode(bytes)?;

    match format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Table => {
            print_table(
                &["TYPE", "BODY", "DECODED"],
                report.transmissions.iter().map(|t| {
                    vec![t.kind.clone(), t.body_len.to_string(), t.decoded.clone()]
                }),
            );
            for dropped in &report.dropped {
                println!("dropped: {dropped}");
            }
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for t in &report.transmissions {
                println!("{} ({} bytes): {}", t.kind, t.body_len, t.decoded);
            }
            for dropped in &report.dropped {
                println!("dropped: {dropped}");
            }
        }
    }

    if report.transmissions.is_empty() && !report.dropped.is_empty() {
        return Ok(DATA_INVALID);
    }
    Ok(SUCCESS)
}

fn input(args: &DecodeArgs) -> CliResult<Vec<u8>> {
    if let Some(path) = &args.file {
        return std::fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    let text = match &args.hex {
        Some(text) => text.clone(),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .map_err(|err| io_error("failed reading stdin", err))?;
            text
        }
    };
    parse_hex(&text).map_err(|err| CliError::new(DATA_INVALID, err))
}

fn decode(bytes: Vec<u8>) -> CliResult<DecodeReport> {
    let mut reader = TransmissionReader::new(Cursor::new(bytes));
    let mut transmissions = Vec::new();
    let mut dropped = Vec::new();
    loop {
        match reader.read_transmission() {
            Ok(transmission) => transmissions.push(DecodedOutput {
                kind: format!("{:?}", transmission.kind()),
                body_len: transmission.len(),
                decoded: describe(&transmission),
            }),
            Err(FrameError::ConnectionClosed) => break,
            Err(err) if err.is_recoverable() => dropped.push(err.to_string()),
            Err(err) => return Err(frame_error("decode failed", err)),
        }
    }
    Ok(DecodeReport {
        transmissions,
        dropped,
        malformed_frames: reader.malformed_frames(),
    })
}

fn describe(transmission: &Transmission) -> String {
    fn show<T: std::fmt::Debug>(decoded: WireResult<T>) -> String {
        match decoded {
            Ok(value) => format!("{value:?}"),
            Err(err) => format!("undecodable: {err}"),
        }
    }

    match transmission.kind() {
        TransmissionType::Command => show(Command::from_transmission(transmission)),
        TransmissionType::Request => show(Request::from_transmission(transmission)),
        TransmissionType::Response => show(Response::from_transmission(transmission)),
        TransmissionType::Event => show(Event::from_transmission(transmission)),
        TransmissionType::ModuleData => show(ModuleData::from_transmission(transmission)),
        TransmissionType::File => match FileTransfer::from_transmission(transmission) {
            Ok(file) => format!("{:?} md5={:#06x} data={}", file.kind, file.md5, hex(&file.bytes)),
            Err(err) => format!("undecodable: {err}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use connectorx_frame::TransmissionEncoder;
    use connectorx_proto::{RequestBody, SystemCommand};

    use super::*;

    fn framed(transmissions: &[Transmission]) -> Vec<u8> {
        let mut encoder = TransmissionEncoder::new();
        let mut out = BytesMut::new();
        for t in transmissions {
            encoder.encode_framed(t, &mut out);
        }
        out.to_vec()
    }

    #[test]
    fn decodes_every_transmission_in_order() {
        let bytes = framed(&[
            Request::new(9, RequestBody::Faults).to_transmission().unwrap(),
            Command::System(SystemCommand::RestartDevice { delay_ms: 5 })
                .to_transmission()
                .unwrap(),
        ]);
        let report = decode(bytes).unwrap();
        assert_eq!(report.transmissions.len(), 2);
        assert_eq!(report.transmissions[0].kind, "Request");
        assert!(report.transmissions[0].decoded.contains("Faults"));
        assert!(report.transmissions[1].decoded.contains("RestartDevice"));
        assert!(report.dropped.is_empty());
    }

    #[test]
    fn corrupted_frame_is_dropped_not_fatal() {
        let mut bytes = framed(&[Request::new(1, RequestBody::Status).to_transmission().unwrap()]);
        bytes[3] ^= 0x40;
        let report = decode(bytes).unwrap();
        assert!(report.transmissions.is_empty());
        assert!(!report.dropped.is_empty() || report.malformed_frames > 0);
    }
}
