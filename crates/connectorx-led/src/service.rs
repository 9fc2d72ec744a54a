//! The LED engine: every channel, driven by a single owner.

use std::collections::HashMap;
use std::sync::Arc;

use connectorx_proto::{LedCommand, ScrollDirection, Target};
use smart_leds::RGB8;

use crate::bitmap::{BitmapReader, Frame};
use crate::channel::{Channel, LedDriver, PowerBudget};
use crate::config::{ChannelConfig, Configuration};
use crate::error::{LedError, Result};
use crate::registry::AnimationRegistry;
use crate::time::Clock;
use crate::zone::{AnimationJob, MatrixZone, StripZone, Zone, ZoneKind};

/// Owns every channel and applies jobs to their zones.
///
/// Not shared: one task holds it and ticks it.
pub struct LedService {
    registry: Arc<AnimationRegistry>,
    bitmaps: Box<dyn BitmapReader>,
    clock: Arc<dyn Clock>,
    channels: Vec<Channel>,
    zone_channels: HashMap<u16, usize>,
    frames: HashMap<u16, Arc<[Frame]>>,
}

impl std::fmt::Debug for LedService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedService")
            .field("channels", &self.channels)
            .field("cached_bitmaps", &self.frames.len())
            .finish_non_exhaustive()
    }
}

impl LedService {
    pub fn new(
        registry: Arc<AnimationRegistry>,
        bitmaps: Box<dyn BitmapReader>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            bitmaps,
            clock,
            channels: Vec::new(),
            zone_channels: HashMap::new(),
            frames: HashMap::new(),
        }
    }

    /// Build one channel per configured output, asking `driver_for` for each driver.
    pub fn from_configuration<F>(
        config: &Configuration,
        registry: Arc<AnimationRegistry>,
        bitmaps: Box<dyn BitmapReader>,
        clock: Arc<dyn Clock>,
        power: PowerBudget,
        mut driver_for: F,
    ) -> Self
    where
        F: FnMut(&ChannelConfig) -> Box<dyn LedDriver>,
    {
        let mut service = Self::new(registry, bitmaps, clock);
        for channel in &config.channels {
            let driver = driver_for(channel);
            service.add_channel(channel, power, driver);
        }
        service
    }

    pub fn add_channel(
        &mut self,
        config: &ChannelConfig,
        power: PowerBudget,
        driver: Box<dyn LedDriver>,
    ) -> u16 {
        let channel = Channel::new(config, power, driver);
        let index = self.channels.len();
        for zone in channel.zones() {
            if self.zone_channels.insert(zone.id(), index).is_some() {
                tracing::warn!(zone = zone.core().name(), "zone id reused; latest channel wins");
            }
        }
        let id = channel.id();
        self.channels.push(channel);
        id
    }

    pub fn registry(&self) -> &Arc<AnimationRegistry> {
        &self.registry
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel(&self, channel_id: u16) -> Option<&Channel> {
        self.channels.iter().find(|channel| channel.id() == channel_id)
    }

    pub fn channel_for_zone(&self, zone_id: u16) -> Option<&Channel> {
        self.zone_channels
            .get(&zone_id)
            .map(|index| &self.channels[*index])
    }

    pub fn zone(&self, zone_id: u16) -> Option<&Zone> {
        self.channel_for_zone(zone_id)?.zone(zone_id)
    }

    /// Current (unscaled) pixels of a zone.
    pub fn pixels(&self, zone_id: u16) -> Option<&[RGB8]> {
        self.channel_for_zone(zone_id)?.zone_pixels(zone_id)
    }

    fn zone_mut(&mut self, zone_id: u16) -> Option<&mut Zone> {
        let index = *self.zone_channels.get(&zone_id)?;
        self.channels[index].zone_mut(zone_id)
    }

    fn resolve(&self, target: Target) -> Result<Vec<u16>> {
        match target {
            Target::Zone(id) => {
                if self.zone_channels.contains_key(&id) {
                    Ok(vec![id])
                } else {
                    Err(LedError::InvalidOrMissingZone(id))
                }
            }
            Target::Group(id) => self
                .registry
                .group(id)
                .map(|group| group.zones.clone())
                .ok_or(LedError::MissingGroup(id)),
        }
    }

    /// Run `apply` on every zone of `expected` kind named by `target`.
    ///
    /// A single zone of the wrong kind is an error; group members of the
    /// wrong kind are skipped. The first failure is returned after every
    /// zone has been tried.
    fn each_zone<F>(&mut self, target: Target, expected: ZoneKind, mut apply: F) -> Result<()>
    where
        F: FnMut(&mut Zone, u64),
    {
        let now = self.clock.now_ms();
        let mut first_error = None;
        for zone_id in self.resolve(target)? {
            let result = match self.zone_mut(zone_id) {
                None => Err(LedError::InvalidOrMissingZone(zone_id)),
                Some(zone) if zone.kind() != expected => {
                    if target.is_group() {
                        tracing::debug!(zone = zone_id, ?expected, "group member skipped");
                        continue;
                    }
                    Err(LedError::WrongZoneKind {
                        zone: zone_id,
                        expected,
                    })
                }
                Some(zone) => {
                    apply(zone, now);
                    Ok(())
                }
            };
            if let Err(err) = result {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn each_strip<F>(&mut self, target: Target, mut apply: F) -> Result<()>
    where
        F: FnMut(&mut StripZone, u64),
    {
        self.each_zone(target, ZoneKind::Strip, |zone, now| {
            if let Zone::Strip(strip) = zone {
                apply(strip, now);
            }
        })
    }

    fn each_matrix<F>(&mut self, target: Target, mut apply: F) -> Result<()>
    where
        F: FnMut(&mut MatrixZone, u64),
    {
        self.each_zone(target, ZoneKind::Matrix, |zone, now| {
            if let Zone::Matrix(matrix) = zone {
                apply(matrix, now);
            }
        })
    }

    pub fn set_animation(
        &mut self,
        target: Target,
        animation_id: u16,
        delay_ms: u16,
        color: RGB8,
        reversed: bool,
        one_shot: bool,
    ) -> Result<()> {
        let animation = self
            .registry
            .animation(animation_id)
            .cloned()
            .ok_or(LedError::MissingAnimation(animation_id))?;
        self.each_strip(target, |zone, now| {
            zone.set_animation(
                AnimationJob {
                    animation: animation.clone(),
                    delay_ms,
                    color,
                    reversed,
                    one_shot,
                },
                now,
            );
        })
    }

    /// Paint a solid colour on the next tick and hold it.
    pub fn set_color(&mut self, target: Target, color: RGB8) -> Result<()> {
        let fill = self
            .registry
            .animation_by_name("Fill")
            .map(|animation| animation.id)
            .ok_or(LedError::MissingAnimation(crate::ids::create_id("Fill")))?;
        self.set_animation(target, fill, 0, color, false, true)
    }

    pub fn set_sequence(&mut self, target: Target, sequence_id: u16) -> Result<()> {
        let sequence = self
            .registry
            .sequence(sequence_id)
            .cloned()
            .ok_or(LedError::MissingSequence(sequence_id))?;
        self.each_strip(target, |zone, now| zone.set_sequence(sequence.clone(), now))
    }

    pub fn set_bitmap(
        &mut self,
        target: Target,
        bitmap_id: u16,
        color: Option<RGB8>,
        one_shot: bool,
    ) -> Result<()> {
        let bitmap = self
            .registry
            .bitmap(bitmap_id)
            .cloned()
            .ok_or(LedError::MissingBitmap(bitmap_id))?;
        let frames = self.frames(bitmap_id)?;
        self.each_matrix(target, |zone, now| {
            zone.set_bitmap(bitmap.clone(), frames.clone(), color, one_shot, now);
        })
    }

    pub fn set_matrix_text(
        &mut self,
        target: Target,
        text: &str,
        color: RGB8,
        direction: ScrollDirection,
        delay_ms: u16,
        one_shot: bool,
    ) -> Result<()> {
        self.each_matrix(target, |zone, now| {
            zone.set_text(text, color, direction, delay_ms, one_shot, now);
        })
    }

    /// Apply a decoded LED command.
    pub fn apply(&mut self, command: &LedCommand) -> Result<()> {
        tracing::debug!(kind = ?command.command_type(), target = ?command.target(), "led command");
        match command {
            LedCommand::SetAnimation {
                target,
                animation_id,
                delay_ms,
                color,
                reversed,
                one_shot,
            } => self.set_animation(*target, *animation_id, *delay_ms, *color, *reversed, *one_shot),
            LedCommand::SetColor { target, color } => self.set_color(*target, *color),
            LedCommand::SetSequence {
                target,
                sequence_id,
            } => self.set_sequence(*target, *sequence_id),
            LedCommand::SetBitmap {
                target,
                bitmap_id,
                color,
                set_color,
                one_shot,
            } => self.set_bitmap(
                *target,
                *bitmap_id,
                set_color.then_some(*color),
                *one_shot,
            ),
            LedCommand::SetMatrixText {
                target,
                text,
                color,
                direction,
                delay_ms,
                one_shot,
            } => self.set_matrix_text(*target, text, *color, *direction, *delay_ms, *one_shot),
        }
    }

    /// Replace a zone's pixels with raw `r, g, b` bytes.
    pub fn set_zone_buffer(&mut self, zone_id: u16, rgb: &[u8]) -> Result<()> {
        let index = *self
            .zone_channels
            .get(&zone_id)
            .ok_or(LedError::InvalidOrMissingZone(zone_id))?;
        self.channels[index].set_zone_buffer(zone_id, rgb)
    }

    fn frames(&mut self, bitmap_id: u16) -> Result<Arc<[Frame]>> {
        if let Some(frames) = self.frames.get(&bitmap_id) {
            return Ok(frames.clone());
        }
        let bitmap = self
            .registry
            .bitmap(bitmap_id)
            .ok_or(LedError::MissingBitmap(bitmap_id))?;
        let frames = (0..bitmap.frame_count)
            .map(|index| self.bitmaps.read_frame(&bitmap.config, index))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        tracing::debug!(bitmap = bitmap.name(), frames = frames.len(), "bitmap loaded");
        let frames: Arc<[Frame]> = Arc::from(frames);
        self.frames.insert(bitmap_id, frames.clone());
        Ok(frames)
    }

    /// Advance every channel at the clock's current time.
    pub fn tick(&mut self) -> Result<usize> {
        let now = self.clock.now_ms();
        self.tick_at(now)
    }

    /// Advance every channel at `now_ms`; returns how many were pushed.
    ///
    /// A driver failure on one channel does not stop the others.
    pub fn tick_at(&mut self, now_ms: u64) -> Result<usize> {
        let mut pushed = 0;
        let mut first_error = None;
        for channel in &mut self.channels {
            match channel.update(now_ms, false) {
                Ok(true) => pushed += 1,
                Ok(false) => {}
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        first_error.map_or(Ok(pushed), Err)
    }
}
