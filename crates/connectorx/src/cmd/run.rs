use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use connectorx_frame::FrameConfig;
use connectorx_led::{BmpReader, Configuration};
use connectorx_node::{BoardInfo, DirFileService, FileError, FileService, NodeBuilder};
use connectorx_transport::{open_serial, SerialConfig, TransportId};
use tracing::{info, warn};

use crate::cmd::RunArgs;
use crate::exit::{
    config_error, io_error, node_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS,
};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct RunSummary {
    status: String,
    restart_requested: bool,
    faults: u32,
}

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let files = args.files.clone().map(DirFileService::new);
    let config = load_config(&args, files.as_ref())?;

    let mut builder = NodeBuilder::new(config).with_board(BoardInfo {
        serial_number: args.serial_number,
        ..BoardInfo::default()
    });
    if let Some(files) = files {
        builder = builder
            .with_bitmaps(Box::new(BmpReader::new(files.root())))
            .with_files(Arc::new(files));
    }
    let mut node = builder
        .build()
        .map_err(|err| node_error("node failed to start", err))?;

    let serial = SerialConfig {
        baud_rate: args.baud,
        ..SerialConfig::default()
    };
    node.attach(|events| {
        open_serial(
            TransportId(0),
            &args.port,
            &serial,
            events,
            FrameConfig::default(),
        )
    })
    .map_err(|err| transport_error("serial link failed", err))?;
    info!(port = %args.port, baud = args.baud, "host link open");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;
    while running.load(Ordering::SeqCst) && !node.restart_requested() {
        std::thread::sleep(Duration::from_millis(100));
    }

    let summary = RunSummary {
        status: format!("{:?}", node.status()),
        restart_requested: node.restart_requested(),
        faults: node.flags().bits(),
    };
    node.shutdown();

    match format {
        OutputFormat::Json => print_json(&summary),
        _ => println!(
            "stopped: status={} restart={} faults={:#x}",
            summary.status, summary.restart_requested, summary.faults
        ),
    }
    Ok(SUCCESS)
}

fn load_config(args: &RunArgs, files: Option<&DirFileService>) -> CliResult<Configuration> {
    let bytes = match (&args.config, files) {
        (Some(path), _) => std::fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?,
        (None, Some(files)) => match files.read_config() {
            Ok(bytes) => bytes,
            Err(FileError::NotFound(_)) => {
                warn!("no stored configuration; starting empty");
                return Ok(Configuration::default());
            }
            Err(err) => return Err(CliError::new(INTERNAL, format!("config read failed: {err}"))),
        },
        (None, None) => {
            warn!("no configuration given; starting empty");
            return Ok(Configuration::default());
        }
    };
    Configuration::parse(&bytes).map_err(|err| config_error("invalid config", err))
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
