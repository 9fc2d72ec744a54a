//! Channel compositor: one physical output, its pixel buffer, and its zones.

use std::ops::Range;
use std::sync::{Arc, Mutex};

use smart_leds::RGB8;

use crate::config::ChannelConfig;
use crate::error::{LedDriverError, LedError, Result};
use crate::ids::create_id;
use crate::zone::Zone;

/// Pushes a full channel buffer to hardware.
pub trait LedDriver: Send {
    fn push(&mut self, pixels: &[RGB8]) -> std::result::Result<(), LedDriverError>;
}

/// Discards every frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDriver;

impl LedDriver for NullDriver {
    fn push(&mut self, _pixels: &[RGB8]) -> std::result::Result<(), LedDriverError> {
        Ok(())
    }
}

/// Keeps every pushed frame; clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingDriver {
    frames: Arc<Mutex<Vec<Vec<RGB8>>>>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<Vec<RGB8>> {
        self.frames
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn last_frame(&self) -> Option<Vec<RGB8>> {
        self.frames
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .last()
            .cloned()
    }

    pub fn push_count(&self) -> usize {
        self.frames
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl LedDriver for RecordingDriver {
    fn push(&mut self, pixels: &[RGB8]) -> std::result::Result<(), LedDriverError> {
        self.frames
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(pixels.to_vec());
        Ok(())
    }
}

/// Board power figures used for auto-dimming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerBudget {
    pub regulator_ma: u32,
    pub per_led_ma: u32,
}

impl Default for PowerBudget {
    fn default() -> Self {
        Self {
            regulator_ma: 3000,
            per_led_ma: 60,
        }
    }
}

impl PowerBudget {
    /// Brightness that keeps `led_count` pixels at full white within budget.
    pub fn auto_dim(&self, led_count: usize) -> u8 {
        let draw = led_count as u64 * u64::from(self.per_led_ma);
        if draw == 0 {
            return u8::MAX;
        }
        (u64::from(self.regulator_ma) * 255 / draw).min(255) as u8
    }
}

pub struct Channel {
    id: u16,
    name: String,
    key: String,
    brightness: u8,
    pixels: Vec<RGB8>,
    zones: Vec<Zone>,
    ranges: Vec<Range<usize>>,
    driver: Box<dyn LedDriver>,
    force_flush: bool,
    pushes: u64,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("key", &self.key)
            .field("brightness", &self.brightness)
            .field("len", &self.pixels.len())
            .field("zones", &self.zones.len())
            .field("pushes", &self.pushes)
            .finish()
    }
}

impl Channel {
    /// Lay zones out back to back in configuration order.
    pub fn new(config: &ChannelConfig, power: PowerBudget, driver: Box<dyn LedDriver>) -> Self {
        let zones: Vec<Zone> = config.zones.iter().map(Zone::from_config).collect();
        let mut ranges = Vec::with_capacity(zones.len());
        let mut offset = 0;
        for zone in &zones {
            ranges.push(offset..offset + zone.len());
            offset += zone.len();
        }
        let len = offset.max(usize::from(config.length));
        let brightness = config.brightness.unwrap_or_else(|| power.auto_dim(len));
        tracing::debug!(
            channel = %config.id,
            len,
            zones = zones.len(),
            brightness,
            "channel created"
        );

        Self {
            id: create_id(&config.id),
            name: config.id.clone(),
            key: config.key.clone(),
            brightness,
            pixels: vec![RGB8::default(); len],
            zones,
            ranges,
            driver,
            force_flush: false,
            pushes: 0,
        }
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Board output this channel drives.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn pixels(&self) -> &[RGB8] {
        &self.pixels
    }

    /// Hardware pushes so far.
    pub fn push_count(&self) -> u64 {
        self.pushes
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn zone_range(&self, zone_id: u16) -> Option<Range<usize>> {
        self.position(zone_id).map(|i| self.ranges[i].clone())
    }

    pub fn zone(&self, zone_id: u16) -> Option<&Zone> {
        self.position(zone_id).map(|i| &self.zones[i])
    }

    pub fn zone_mut(&mut self, zone_id: u16) -> Option<&mut Zone> {
        self.position(zone_id).map(move |i| &mut self.zones[i])
    }

    pub fn zone_pixels(&self, zone_id: u16) -> Option<&[RGB8]> {
        self.zone_range(zone_id).map(|range| &self.pixels[range])
    }

    fn position(&self, zone_id: u16) -> Option<usize> {
        self.zones.iter().position(|zone| zone.id() == zone_id)
    }

    /// Overwrite a zone with raw `r, g, b` triples and stop its job.
    pub fn set_zone_buffer(&mut self, zone_id: u16, rgb: &[u8]) -> Result<()> {
        let index = self
            .position(zone_id)
            .ok_or(LedError::InvalidOrMissingZone(zone_id))?;
        let range = self.ranges[index].clone();
        if rgb.len() != range.len() * 3 {
            return Err(LedError::BufferLength {
                zone: zone_id,
                expected: range.len() * 3,
                actual: rgb.len(),
            });
        }

        for (px, chunk) in self.pixels[range].iter_mut().zip(rgb.chunks_exact(3)) {
            *px = RGB8::new(chunk[0], chunk[1], chunk[2]);
        }
        self.zones[index].stop();
        self.force_flush = true;
        Ok(())
    }

    /// Advance every zone and push once if anything changed.
    ///
    /// Returns whether the buffer was pushed.
    pub fn update(&mut self, now_ms: u64, force: bool) -> Result<bool> {
        let mut dirty = false;
        let mut rest: &mut [RGB8] = &mut self.pixels;
        for zone in &mut self.zones {
            let take = zone.len().min(rest.len());
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(take);
            dirty |= zone.update(head, now_ms);
            rest = tail;
        }

        if !(dirty || force || self.force_flush) {
            return Ok(false);
        }
        self.force_flush = false;
        self.flush()?;
        Ok(true)
    }

    fn flush(&mut self) -> Result<()> {
        let mut frame = self.pixels.clone();
        for (zone, range) in self.zones.iter().zip(&self.ranges) {
            let level = zone.core().brightness();
            if level == u8::MAX {
                continue;
            }
            let scaled: Vec<RGB8> =
                smart_leds::brightness(frame[range.clone()].iter().copied(), level).collect();
            frame[range.clone()].copy_from_slice(&scaled);
        }
        let frame: Vec<RGB8> = smart_leds::brightness(frame.into_iter(), self.brightness).collect();

        self.pushes += 1;
        self.driver.push(&frame).map_err(|source| LedError::Driver {
            channel: self.id,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ZoneConfig, ZoneKindConfig};
    use crate::registry::RegistryBuilder;
    use crate::zone::AnimationJob;

    const GREEN: RGB8 = RGB8 { r: 0, g: 255, b: 0 };

    fn strip(id: &str, length: u16) -> ZoneConfig {
        ZoneConfig {
            id: id.into(),
            brightness: None,
            kind: ZoneKindConfig::Strip {
                length,
                reversed: false,
            },
        }
    }

    fn channel(driver: RecordingDriver) -> Channel {
        let config = ChannelConfig {
            key: "CH1".into(),
            id: "main".into(),
            length: 10,
            brightness: Some(255),
            zones: vec![strip("a", 3), strip("b", 4), strip("c", 2)],
        };
        Channel::new(&config, PowerBudget::default(), Box::new(driver))
    }

    fn fill(zone: &mut Zone, now: u64) {
        let registry = RegistryBuilder::with_builtins().build();
        let Zone::Strip(strip) = zone else {
            panic!("expected strip");
        };
        strip.set_animation(
            AnimationJob {
                animation: registry.animation_by_name("Fill").unwrap().clone(),
                delay_ms: 0,
                color: GREEN,
                reversed: false,
                one_shot: true,
            },
            now,
        );
    }

    #[test]
    fn zone_ranges_are_disjoint_and_cumulative() {
        let ch = channel(RecordingDriver::new());
        assert_eq!(ch.len(), 10);
        let ranges: Vec<_> = ch
            .zones()
            .iter()
            .map(|z| ch.zone_range(z.id()).unwrap())
            .collect();
        assert_eq!(ranges, vec![0..3, 3..7, 7..9]);
        for (i, a) in ranges.iter().enumerate() {
            for b in &ranges[i + 1..] {
                assert!(a.end <= b.start);
            }
        }
    }

    #[test]
    fn multiple_dirty_zones_push_once() {
        let driver = RecordingDriver::new();
        let mut ch = channel(driver.clone());
        fill(ch.zone_mut(create_id("a")).unwrap(), 0);
        fill(ch.zone_mut(create_id("c")).unwrap(), 0);

        assert!(ch.update(0, false).unwrap());
        assert_eq!(driver.push_count(), 1);
        let frame = driver.last_frame().unwrap();
        assert_eq!(&frame[0..3], &[GREEN; 3]);
        assert_eq!(&frame[3..7], &[RGB8::default(); 4]);
        assert_eq!(&frame[7..9], &[GREEN; 2]);

        assert!(!ch.update(10, false).unwrap());
        assert_eq!(driver.push_count(), 1);
        assert!(ch.update(20, true).unwrap());
        assert_eq!(driver.push_count(), 2);
    }

    #[test]
    fn zone_buffer_forces_flush() {
        let driver = RecordingDriver::new();
        let mut ch = channel(driver.clone());
        let id = create_id("c");
        ch.set_zone_buffer(id, &[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(ch.zone_pixels(id).unwrap(), &[RGB8::new(1, 2, 3), RGB8::new(4, 5, 6)]);
        assert!(ch.update(0, false).unwrap());
        assert!(!ch.update(1, false).unwrap());

        let err = ch.set_zone_buffer(id, &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, LedError::BufferLength { expected: 6, actual: 3, .. }));
        assert!(matches!(
            ch.set_zone_buffer(0x1234, &[]),
            Err(LedError::InvalidOrMissingZone(0x1234))
        ));
    }

    #[test]
    fn zone_brightness_scales_on_push() {
        let driver = RecordingDriver::new();
        let config = ChannelConfig {
            key: "CH1".into(),
            id: "dim".into(),
            length: 1,
            brightness: Some(255),
            zones: vec![ZoneConfig {
                brightness: Some(0),
                ..strip("z", 1)
            }],
        };
        let mut ch = Channel::new(&config, PowerBudget::default(), Box::new(driver.clone()));
        ch.set_zone_buffer(create_id("z"), &[255, 255, 255]).unwrap();
        ch.update(0, false).unwrap();
        assert_eq!(driver.last_frame().unwrap(), vec![RGB8::default()]);
        assert_eq!(ch.pixels()[0], RGB8::new(255, 255, 255));
    }

    #[test]
    fn auto_dim_follows_power_budget() {
        let power = PowerBudget::default();
        assert_eq!(power.auto_dim(0), 255);
        assert_eq!(power.auto_dim(50), 255);
        assert_eq!(power.auto_dim(100), 127);
        assert_eq!(power.auto_dim(1000), 12);

        let config = ChannelConfig {
            key: "CH2".into(),
            id: "auto".into(),
            length: 100,
            brightness: None,
            zones: vec![],
        };
        let ch = Channel::new(&config, power, Box::new(NullDriver));
        assert_eq!(ch.brightness(), 127);
    }
}
