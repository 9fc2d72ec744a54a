use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use connectorx_led::{
    BitmapReader, BmpReader, Configuration, LedDriver, LedService, ManualClock, MemoryBitmaps,
    PowerBudget, RecordingDriver, RegistryBuilder,
};
use connectorx_proto::Target;
use tracing::{debug, warn};

use crate::cmd::{resolve_id, SimulateArgs};
use crate::exit::{config_error, io_error, led_error, CliError, CliResult, SUCCESS};
use crate::output::{color_hex, parse_color, print_json, print_raw, print_table, OutputFormat};

#[derive(Serialize)]
struct Flush {
    t_ms: u64,
    pixels: Vec<String>,
}

pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    if args.step == 0 {
        return Err(CliError::usage("--step must be greater than zero"));
    }
    let bytes = std::fs::read(&args.config)
        .map_err(|err| io_error(&format!("failed reading {}", args.config.display()), err))?;
    let config = Configuration::parse(&bytes).map_err(|err| config_error("invalid config", err))?;
    let flushes = simulate(&args, &config)?;

    match format {
        OutputFormat::Json => {
            for flush in &flushes {
                print_json(flush);
            }
        }
        OutputFormat::Table => print_table(
            &["T (ms)", "PIXELS"],
            flushes
                .iter()
                .map(|f| vec![f.t_ms.to_string(), f.pixels.join(" ")]),
        ),
        OutputFormat::Pretty => {
            for flush in &flushes {
                println!("{:>6}ms  {}", flush.t_ms, flush.pixels.join(" "));
            }
        }
        OutputFormat::Raw => {
            for flush in &flushes {
                let bytes: Vec<u8> = flush
                    .pixels
                    .iter()
                    .filter_map(|p| parse_color(p).ok())
                    .flat_map(|c| [c.r, c.g, c.b])
                    .collect();
                print_raw(&bytes);
            }
        }
    }
    Ok(SUCCESS)
}

fn simulate(args: &SimulateArgs, config: &Configuration) -> CliResult<Vec<Flush>> {
    let bitmaps: Box<dyn BitmapReader> = match &args.bitmaps {
        Some(root) => Box::new(BmpReader::new(root)),
        None => Box::new(MemoryBitmaps::new()),
    };
    let mut registry = RegistryBuilder::with_builtins();
    let skipped = registry
        .register_configuration(config, bitmaps.as_ref())
        .map_err(|err| CliError::new(crate::exit::CONFIG_INVALID, err.to_string()))?;
    for (bitmap, err) in skipped {
        warn!(%bitmap, %err, "bitmap skipped");
    }

    let mut drivers: HashMap<String, RecordingDriver> = HashMap::new();
    let clock = Arc::new(ManualClock::new(0));
    let mut service = LedService::from_configuration(
        config,
        registry.build(),
        bitmaps,
        clock,
        PowerBudget::default(),
        |channel| -> Box<dyn LedDriver> {
            let driver = RecordingDriver::new();
            drivers.insert(channel.id.clone(), driver.clone());
            Box::new(driver)
        },
    );

    let zone_id = resolve_id(&args.zone)?;
    let animation_id = resolve_id(&args.animation)?;
    let animation = service
        .registry()
        .animation(animation_id)
        .cloned()
        .ok_or_else(|| CliError::usage(format!("unknown animation {:?}", args.animation)))?;
    let color = match &args.color {
        Some(color) => parse_color(color).map_err(CliError::usage)?,
        None => animation.default_color,
    };
    service
        .set_animation(
            Target::Zone(zone_id),
            animation_id,
            args.delay.unwrap_or(animation.default_delay_ms),
            color,
            args.reversed,
            args.one_shot,
        )
        .map_err(|err| led_error("set animation failed", err))?;

    let channel = service
        .channel_for_zone(zone_id)
        .ok_or_else(|| CliError::usage(format!("unknown zone {:?}", args.zone)))?;
    let range = channel
        .zone_range(zone_id)
        .ok_or_else(|| CliError::usage(format!("unknown zone {:?}", args.zone)))?;
    let driver = drivers
        .get(channel.name())
        .cloned()
        .ok_or_else(|| CliError::new(crate::exit::INTERNAL, "channel has no driver"))?;

    let mut flushes = Vec::new();
    let mut seen = 0;
    let mut t = 0;
    while t <= args.duration {
        service
            .tick_at(t)
            .map_err(|err| led_error("tick failed", err))?;
        if driver.push_count() > seen {
            seen = driver.push_count();
            if let Some(frame) = driver.last_frame() {
                let pixels = frame.get(range.clone()).unwrap_or(&[]);
                flushes.push(Flush {
                    t_ms: t,
                    pixels: pixels.iter().copied().map(color_hex).collect(),
                });
            }
        }
        t += args.step;
    }
    debug!(flushes = flushes.len(), "simulation finished");
    Ok(flushes)
}
