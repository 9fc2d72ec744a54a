//! Device configuration document.
//!
//! The document is JSON with camelCase keys. Every collection is optional and
//! defaults to empty.

use std::collections::HashSet;

use connectorx_proto::SensorConnection;
use serde::{Deserialize, Serialize};
use smart_leds::RGB8;

use crate::error::ConfigError;
use crate::ids::config_hash;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColorConfig {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl From<ColorConfig> for RGB8 {
    fn from(c: ColorConfig) -> Self {
        RGB8 {
            r: c.r,
            g: c.g,
            b: c.b,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ZoneKindConfig {
    #[serde(rename_all = "camelCase")]
    Strip {
        length: u16,
        #[serde(default)]
        reversed: bool,
    },
    #[serde(rename_all = "camelCase")]
    Matrix {
        rows: u16,
        cols: u16,
        #[serde(default)]
        orientation: u8,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneConfig {
    pub id: String,
    #[serde(default)]
    pub brightness: Option<u8>,
    #[serde(flatten)]
    pub kind: ZoneKindConfig,
}

impl ZoneConfig {
    /// Pixels the zone occupies in its channel.
    pub fn led_count(&self) -> usize {
        match self.kind {
            ZoneKindConfig::Strip { length, .. } => usize::from(length),
            ZoneKindConfig::Matrix { rows, cols, .. } => usize::from(rows) * usize::from(cols),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelConfig {
    /// Board output the channel is wired to.
    pub key: String,
    pub id: String,
    pub length: u16,
    #[serde(default)]
    pub brightness: Option<u8>,
    #[serde(default)]
    pub zones: Vec<ZoneConfig>,
}

/// One step of a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationStepConfig {
    /// Animation name.
    pub id: String,
    #[serde(default)]
    pub reversed: bool,
    pub delay: u16,
    #[serde(default)]
    pub color: Option<ColorConfig>,
    #[serde(default)]
    pub repeat_count: Option<u8>,
    #[serde(default)]
    pub one_shot: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceConfig {
    pub id: String,
    pub steps: Vec<AnimationStepConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BitmapKindConfig {
    Static,
    #[serde(rename_all = "camelCase")]
    Animated { frame_delay: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitmapConfig {
    pub id: String,
    pub path: String,
    #[serde(flatten)]
    pub kind: BitmapKindConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupConfig {
    pub id: String,
    pub zone_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorConnectionConfig {
    #[serde(rename = "I2C")]
    I2c,
    #[serde(rename = "SPI")]
    Spi,
    #[serde(rename = "UART")]
    Uart,
    #[serde(rename = "DIO")]
    Dio,
    #[serde(rename = "AIO")]
    Aio,
}

impl From<SensorConnectionConfig> for SensorConnection {
    fn from(c: SensorConnectionConfig) -> Self {
        match c {
            SensorConnectionConfig::I2c => SensorConnection::I2c,
            SensorConnectionConfig::Spi => SensorConnection::Spi,
            SensorConnectionConfig::Uart => SensorConnection::Uart,
            SensorConnectionConfig::Dio => SensorConnection::Dio,
            SensorConnectionConfig::Aio => SensorConnection::Aio,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub polling_rate_ms: u16,
    pub connection_type: SensorConnectionConfig,
    #[serde(default)]
    pub custom_config: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    #[serde(default)]
    pub team_number: Option<String>,
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
    #[serde(default)]
    pub sequences: Vec<SequenceConfig>,
    #[serde(default)]
    pub bitmaps: Vec<BitmapConfig>,
    #[serde(default)]
    pub animation_groups: Vec<GroupConfig>,
    #[serde(default)]
    pub sensors: Vec<SensorConfig>,
    /// Zone that mirrors the device status.
    #[serde(default)]
    pub status_zone: Option<String>,
    /// Digest of the source document.
    #[serde(skip)]
    pub hash: [u8; 16],
}

impl Configuration {
    /// Parse a document and record its digest.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let mut config: Configuration = serde_json::from_slice(bytes)?;
        config.hash = config_hash(bytes);
        Ok(config)
    }

    /// Parse and validate.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let config = Self::from_json_slice(bytes)?;
        config.validate()?;
        Ok(config)
    }

    pub fn zones(&self) -> impl Iterator<Item = &ZoneConfig> {
        self.channels.iter().flat_map(|channel| channel.zones.iter())
    }

    /// Structural checks that do not need the animation registry.
    pub fn validate(&self) -> Result<()> {
        let mut zone_ids = HashSet::new();
        let mut channel_ids = HashSet::new();

        for channel in &self.channels {
            if channel.id.is_empty() {
                return Err(invalid("channel with empty id"));
            }
            if !channel_ids.insert(channel.id.as_str()) {
                return Err(invalid(format!("duplicate channel id {:?}", channel.id)));
            }

            let used: usize = channel.zones.iter().map(ZoneConfig::led_count).sum();
            if used > usize::from(channel.length) {
                return Err(invalid(format!(
                    "zones on channel {:?} need {used} LEDs but it has {}",
                    channel.id, channel.length
                )));
            }

            for zone in &channel.zones {
                if zone.id.is_empty() {
                    return Err(invalid(format!("zone with empty id on {:?}", channel.id)));
                }
                if !zone_ids.insert(zone.id.as_str()) {
                    return Err(invalid(format!("duplicate zone id {:?}", zone.id)));
                }
            }
        }

        for sequence in &self.sequences {
            if sequence.id.is_empty() {
                return Err(invalid("sequence with empty id"));
            }
            if sequence.steps.is_empty() {
                return Err(invalid(format!("sequence {:?} has no steps", sequence.id)));
            }
        }

        for bitmap in &self.bitmaps {
            if bitmap.id.is_empty() || bitmap.path.is_empty() {
                return Err(invalid("bitmap with empty id or path"));
            }
        }

        for group in &self.animation_groups {
            if group.id.is_empty() {
                return Err(invalid("animation group with empty id"));
            }
            if let Some(missing) = group
                .zone_ids
                .iter()
                .find(|id| !zone_ids.contains(id.as_str()))
            {
                return Err(invalid(format!(
                    "group {:?} names unknown zone {missing:?}",
                    group.id
                )));
            }
        }

        if let Some(status) = &self.status_zone {
            if !zone_ids.contains(status.as_str()) {
                return Err(invalid(format!("status zone {status:?} does not exist")));
            }
        }

        let mut sensor_ids = HashSet::new();
        for sensor in &self.sensors {
            if sensor.id.is_empty() || !sensor_ids.insert(sensor.id.as_str()) {
                return Err(invalid(format!("bad or duplicate sensor id {:?}", sensor.id)));
            }
        }

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "teamNumber": "9999",
        "channels": [{
            "key": "1",
            "id": "main",
            "length": 80,
            "zones": [
                {"type": "strip", "id": "front", "length": 16, "reversed": true},
                {"type": "matrix", "id": "panel", "rows": 8, "cols": 8, "orientation": 8, "brightness": 64}
            ]
        }],
        "sequences": [{
            "id": "alert",
            "steps": [
                {"id": "Blink", "delay": 100, "color": {"r": 255, "g": 0, "b": 0}, "repeatCount": 3},
                {"id": "Fill", "delay": 0, "oneShot": true}
            ]
        }],
        "bitmaps": [
            {"type": "static", "id": "logo", "path": "logo.bmp"},
            {"type": "animated", "id": "spin", "path": "spin", "frameDelay": 80}
        ],
        "animationGroups": [{"id": "all", "zoneIds": ["front", "panel"]}],
        "sensors": [{"id": "range", "type": "Analog", "pollingRateMs": 50, "connectionType": "AIO"}],
        "statusZone": "front"
    }"#;

    #[test]
    fn parses_full_document() {
        let config = Configuration::parse(SAMPLE.as_bytes()).unwrap();
        assert_eq!(config.team_number.as_deref(), Some("9999"));
        assert_eq!(config.channels[0].zones.len(), 2);
        assert_eq!(
            config.channels[0].zones[0].kind,
            ZoneKindConfig::Strip {
                length: 16,
                reversed: true
            }
        );
        assert_eq!(config.channels[0].zones[1].led_count(), 64);
        assert_eq!(config.channels[0].zones[1].brightness, Some(64));
        assert_eq!(config.sequences[0].steps[0].repeat_count, Some(3));
        assert!(config.sequences[0].steps[1].one_shot);
        assert_eq!(
            config.bitmaps[1].kind,
            BitmapKindConfig::Animated { frame_delay: 80 }
        );
        assert_eq!(
            config.sensors[0].connection_type,
            SensorConnectionConfig::Aio
        );
        assert_eq!(config.hash, config_hash(SAMPLE.as_bytes()));
    }

    #[test]
    fn empty_document_is_valid() {
        let config = Configuration::parse(b"{}").unwrap();
        assert!(config.channels.is_empty());
        assert!(config.status_zone.is_none());
    }

    #[test]
    fn rejects_overfull_channel() {
        let doc = r#"{"channels": [{"key": "1", "id": "c", "length": 4,
            "zones": [{"type": "strip", "id": "z", "length": 5}]}]}"#;
        assert!(matches!(
            Configuration::parse(doc.as_bytes()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_duplicate_zones_and_unknown_group_members() {
        let dup = r#"{"channels": [{"key": "1", "id": "c", "length": 10, "zones": [
            {"type": "strip", "id": "z", "length": 2},
            {"type": "strip", "id": "z", "length": 2}]}]}"#;
        assert!(Configuration::parse(dup.as_bytes()).is_err());

        let group = r#"{"animationGroups": [{"id": "g", "zoneIds": ["nope"]}]}"#;
        assert!(Configuration::parse(group.as_bytes()).is_err());
    }

    #[test]
    fn rejects_empty_sequence_and_bad_json() {
        assert!(Configuration::parse(br#"{"sequences": [{"id": "s", "steps": []}]}"#).is_err());
        assert!(matches!(
            Configuration::parse(b"{not json"),
            Err(ConfigError::Json(_))
        ));
    }
}
