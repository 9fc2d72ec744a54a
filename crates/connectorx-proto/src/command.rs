use bytes::{BufMut, BytesMut};
use connectorx_frame::TransmissionType;
use smart_leds::RGB8;

use crate::wire::{
    pad_to, put_color, put_fixed_str, truncate_utf8, wire_enum, Result, WireError, WireMessage,
    WireReader,
};

/// Encoded size of a [`Command`]: group byte plus the largest variant.
pub const COMMAND_SIZE: usize = 1 + COMMAND_UNION_SIZE;
const COMMAND_UNION_SIZE: usize = 1 + LED_UNION_SIZE;
const LED_UNION_SIZE: usize = 34;
const SYSTEM_UNION_SIZE: usize = 24;

/// Longest text a matrix-text command carries.
pub const MAX_MATRIX_TEXT_LEN: usize = 24;

/// Width of the assigned-id field.
pub const ASSIGNED_ID_LEN: usize = 24;

wire_enum! {
    /// API group selector, the first byte of every command.
    pub enum ApiGroup: u8 {
        System = 0,
        Led = 1,
        Device = 2,
    }
}

wire_enum! {
    pub enum LedCommandType: u8 {
        SetAnimation = 0,
        SetAnimationGroup = 1,
        SetColor = 2,
        SetColorGroup = 3,
        SetAnimationSequence = 4,
        SetAnimationSequenceGroup = 5,
        SetBitmap = 6,
        SetBitmapGroup = 7,
        SetMatrixText = 8,
        SetMatrixTextGroup = 9,
    }
}

wire_enum! {
    pub enum SystemCommandType: u8 {
        ClearStatusFlag = 0,
        SetAssignedId = 1,
        RestartDevice = 2,
    }
}

wire_enum! {
    pub enum ScrollDirection: u8 {
        Left = 0,
        Right = 1,
    }
}

/// What an LED command applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Zone(u16),
    Group(u16),
}

impl Target {
    pub fn id(self) -> u16 {
        match self {
            Target::Zone(id) | Target::Group(id) => id,
        }
    }

    pub fn is_group(self) -> bool {
        matches!(self, Target::Group(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedCommand {
    SetAnimation {
        target: Target,
        animation_id: u16,
        delay_ms: u16,
        color: RGB8,
        reversed: bool,
        one_shot: bool,
    },
    SetColor {
        target: Target,
        color: RGB8,
    },
    SetSequence {
        target: Target,
        sequence_id: u16,
    },
    SetBitmap {
        target: Target,
        bitmap_id: u16,
        color: RGB8,
        set_color: bool,
        one_shot: bool,
    },
    SetMatrixText {
        target: Target,
        text: String,
        color: RGB8,
        direction: ScrollDirection,
        delay_ms: u16,
        one_shot: bool,
    },
}

impl LedCommand {
    pub fn target(&self) -> Target {
        match self {
            LedCommand::SetAnimation { target, .. }
            | LedCommand::SetColor { target, .. }
            | LedCommand::SetSequence { target, .. }
            | LedCommand::SetBitmap { target, .. }
            | LedCommand::SetMatrixText { target, .. } => *target,
        }
    }

    pub fn command_type(&self) -> LedCommandType {
        let group = self.target().is_group();
        match (self, group) {
            (LedCommand::SetAnimation { .. }, false) => LedCommandType::SetAnimation,
            (LedCommand::SetAnimation { .. }, true) => LedCommandType::SetAnimationGroup,
            (LedCommand::SetColor { .. }, false) => LedCommandType::SetColor,
            (LedCommand::SetColor { .. }, true) => LedCommandType::SetColorGroup,
            (LedCommand::SetSequence { .. }, false) => LedCommandType::SetAnimationSequence,
            (LedCommand::SetSequence { .. }, true) => LedCommandType::SetAnimationSequenceGroup,
            (LedCommand::SetBitmap { .. }, false) => LedCommandType::SetBitmap,
            (LedCommand::SetBitmap { .. }, true) => LedCommandType::SetBitmapGroup,
            (LedCommand::SetMatrixText { .. }, false) => LedCommandType::SetMatrixText,
            (LedCommand::SetMatrixText { .. }, true) => LedCommandType::SetMatrixTextGroup,
        }
    }

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(self.command_type() as u8);
        let start = dst.len();
        dst.put_u16_le(self.target().id());

        match self {
            LedCommand::SetAnimation {
                animation_id,
                delay_ms,
                color,
                reversed,
                one_shot,
                ..
            } => {
                dst.put_u16_le(*animation_id);
                dst.put_u16_le(*delay_ms);
                put_color(dst, *color);
                dst.put_u8(flags(*reversed, *one_shot));
            }
            LedCommand::SetColor { color, .. } => put_color(dst, *color),
            LedCommand::SetSequence { sequence_id, .. } => dst.put_u16_le(*sequence_id),
            LedCommand::SetBitmap {
                bitmap_id,
                color,
                set_color,
                one_shot,
                ..
            } => {
                dst.put_u16_le(*bitmap_id);
                put_color(dst, *color);
                dst.put_u8(flags(*set_color, *one_shot));
            }
            LedCommand::SetMatrixText {
                text,
                color,
                direction,
                delay_ms,
                one_shot,
                ..
            } => {
                let text = truncate_utf8(text, MAX_MATRIX_TEXT_LEN);
                dst.put_u8(u8::from(*one_shot));
                put_color(dst, *color);
                dst.put_u8(*direction as u8);
                put_fixed_str(dst, text, MAX_MATRIX_TEXT_LEN);
                dst.put_u8(text.len() as u8);
                dst.put_u16_le(*delay_ms);
            }
        }

        pad_to(dst, start, LED_UNION_SIZE);
    }

    fn decode(reader: &mut WireReader<'_>) -> Result<Self> {
        let kind = LedCommandType::try_from(reader.u8()?)?;
        let id = reader.u16()?;
        let target = match kind {
            LedCommandType::SetAnimationGroup
            | LedCommandType::SetColorGroup
            | LedCommandType::SetAnimationSequenceGroup
            | LedCommandType::SetBitmapGroup
            | LedCommandType::SetMatrixTextGroup => Target::Group(id),
            _ => Target::Zone(id),
        };

        Ok(match kind {
            LedCommandType::SetAnimation | LedCommandType::SetAnimationGroup => {
                let animation_id = reader.u16()?;
                let delay_ms = reader.u16()?;
                let color = reader.color()?;
                let bits = reader.u8()?;
                LedCommand::SetAnimation {
                    target,
                    animation_id,
                    delay_ms,
                    color,
                    reversed: bits & 0b01 != 0,
                    one_shot: bits & 0b10 != 0,
                }
            }
            LedCommandType::SetColor | LedCommandType::SetColorGroup => LedCommand::SetColor {
                target,
                color: reader.color()?,
            },
            LedCommandType::SetAnimationSequence | LedCommandType::SetAnimationSequenceGroup => {
                LedCommand::SetSequence {
                    target,
                    sequence_id: reader.u16()?,
                }
            }
            LedCommandType::SetBitmap | LedCommandType::SetBitmapGroup => {
                let bitmap_id = reader.u16()?;
                let color = reader.color()?;
                let bits = reader.u8()?;
                LedCommand::SetBitmap {
                    target,
                    bitmap_id,
                    color,
                    set_color: bits & 0b01 != 0,
                    one_shot: bits & 0b10 != 0,
                }
            }
            LedCommandType::SetMatrixText | LedCommandType::SetMatrixTextGroup => {
                let one_shot = reader.bool()?;
                let color = reader.color()?;
                let direction = ScrollDirection::try_from(reader.u8()?)?;
                let raw = reader.bytes(MAX_MATRIX_TEXT_LEN)?;
                let len = (reader.u8()? as usize).min(MAX_MATRIX_TEXT_LEN);
                let delay_ms = reader.u16()?;
                let end = raw[..len].iter().position(|b| *b == 0).unwrap_or(len);
                LedCommand::SetMatrixText {
                    target,
                    text: String::from_utf8_lossy(&raw[..end]).into_owned(),
                    color,
                    direction,
                    delay_ms,
                    one_shot,
                }
            }
        })
    }
}

fn flags(bit0: bool, bit1: bool) -> u8 {
    u8::from(bit0) | (u8::from(bit1) << 1)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemCommand {
    /// Clear the given bits of the error flags.
    ClearStatusFlag { mask: u32 },
    /// Store a host-chosen identifier for this device.
    SetAssignedId { id: String },
    /// Ask the device to restart after a delay.
    RestartDevice { delay_ms: u16 },
}

impl SystemCommand {
    pub fn command_type(&self) -> SystemCommandType {
        match self {
            SystemCommand::ClearStatusFlag { .. } => SystemCommandType::ClearStatusFlag,
            SystemCommand::SetAssignedId { .. } => SystemCommandType::SetAssignedId,
            SystemCommand::RestartDevice { .. } => SystemCommandType::RestartDevice,
        }
    }

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(self.command_type() as u8);
        let start = dst.len();
        match self {
            SystemCommand::ClearStatusFlag { mask } => dst.put_u32_le(*mask),
            SystemCommand::SetAssignedId { id } => put_fixed_str(dst, id, ASSIGNED_ID_LEN),
            SystemCommand::RestartDevice { delay_ms } => dst.put_u16_le(*delay_ms),
        }
        pad_to(dst, start, SYSTEM_UNION_SIZE);
    }

    fn decode(reader: &mut WireReader<'_>) -> Result<Self> {
        Ok(match SystemCommandType::try_from(reader.u8()?)? {
            SystemCommandType::ClearStatusFlag => SystemCommand::ClearStatusFlag {
                mask: reader.u32()?,
            },
            SystemCommandType::SetAssignedId => SystemCommand::SetAssignedId {
                id: reader.fixed_str(ASSIGNED_ID_LEN)?,
            },
            SystemCommandType::RestartDevice => SystemCommand::RestartDevice {
                delay_ms: reader.u16()?,
            },
        })
    }
}

/// Host-to-device instruction, carried by `TransmissionType::Command`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    System(SystemCommand),
    Led(LedCommand),
}

impl Command {
    pub fn group(&self) -> ApiGroup {
        match self {
            Command::System(_) => ApiGroup::System,
            Command::Led(_) => ApiGroup::Led,
        }
    }
}

impl WireMessage for Command {
    const TRANSMISSION: TransmissionType = TransmissionType::Command;

    fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(COMMAND_SIZE);
        dst.put_u8(self.group() as u8);
        let start = dst.len();
        match self {
            Command::System(cmd) => cmd.encode(dst),
            Command::Led(cmd) => cmd.encode(dst),
        }
        pad_to(dst, start, COMMAND_UNION_SIZE);
    }

    fn decode(src: &[u8]) -> Result<Self> {
        let mut reader = WireReader::new("command", src);
        match ApiGroup::try_from(reader.u8()?)? {
            ApiGroup::System => Ok(Command::System(SystemCommand::decode(&mut reader)?)),
            ApiGroup::Led => Ok(Command::Led(LedCommand::decode(&mut reader)?)),
            ApiGroup::Device => Err(WireError::Unsupported("device command")),
        }
    }
}

impl From<LedCommand> for Command {
    fn from(cmd: LedCommand) -> Self {
        Command::Led(cmd)
    }
}

impl From<SystemCommand> for Command {
    fn from(cmd: SystemCommand) -> Self {
        Command::System(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(cmd: &Command) -> BytesMut {
        let mut buf = BytesMut::new();
        cmd.encode(&mut buf);
        buf
    }

    #[test]
    fn set_animation_layout() {
        let cmd = Command::Led(LedCommand::SetAnimation {
            target: Target::Zone(0x1234),
            animation_id: 0xBEEF,
            delay_ms: 1000,
            color: RGB8 { r: 1, g: 2, b: 3 },
            reversed: false,
            one_shot: true,
        });
        let buf = encoded(&cmd);

        assert_eq!(buf.len(), COMMAND_SIZE);
        assert_eq!(
            &buf[..12],
            &[1, 0, 0x34, 0x12, 0xEF, 0xBE, 0xE8, 0x03, 1, 2, 3, 0b10]
        );
        assert!(buf[12..].iter().all(|b| *b == 0));
        assert_eq!(Command::decode(&buf).unwrap(), cmd);
    }

    #[test]
    fn group_variants_use_odd_type_codes() {
        let cmd = Command::Led(LedCommand::SetColor {
            target: Target::Group(7),
            color: RGB8 { r: 9, g: 8, b: 7 },
        });
        let buf = encoded(&cmd);
        assert_eq!(buf[1], LedCommandType::SetColorGroup as u8);
        assert_eq!(Command::decode(&buf).unwrap(), cmd);
    }

    #[test]
    fn matrix_text_layout_and_truncation() {
        let cmd = Command::Led(LedCommand::SetMatrixText {
            target: Target::Zone(2),
            text: "HELLO WORLD THIS IS TOO LONG".to_string(),
            color: RGB8 { r: 255, g: 0, b: 0 },
            direction: ScrollDirection::Right,
            delay_ms: 50,
            one_shot: true,
        });
        let buf = encoded(&cmd);

        assert_eq!(buf.len(), COMMAND_SIZE);
        // group, type, zone (2), one-shot, color (3), direction
        assert_eq!(&buf[..9], &[1, 8, 2, 0, 1, 255, 0, 0, 1]);
        assert_eq!(buf[9 + MAX_MATRIX_TEXT_LEN], MAX_MATRIX_TEXT_LEN as u8);
        assert_eq!(&buf[34..36], &50u16.to_le_bytes());

        match Command::decode(&buf).unwrap() {
            Command::Led(LedCommand::SetMatrixText { text, .. }) => {
                assert_eq!(text, "HELLO WORLD THIS IS TOO ");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn decode_accepts_unpadded_payload() {
        let raw = [1u8, 4, 0x10, 0x00, 0x20, 0x00];
        let cmd = Command::decode(&raw).unwrap();
        assert_eq!(
            cmd,
            Command::Led(LedCommand::SetSequence {
                target: Target::Zone(0x10),
                sequence_id: 0x20,
            })
        );
    }

    #[test]
    fn system_commands() {
        let clear = Command::System(SystemCommand::ClearStatusFlag { mask: 0xFFFF_0001 });
        let buf = encoded(&clear);
        assert_eq!(&buf[..6], &[0, 0, 0x01, 0x00, 0xFF, 0xFF]);
        assert_eq!(Command::decode(&buf).unwrap(), clear);

        let assign = Command::System(SystemCommand::SetAssignedId {
            id: "front-left".to_string(),
        });
        assert_eq!(Command::decode(&encoded(&assign)).unwrap(), assign);
    }

    #[test]
    fn rejects_unknown_and_truncated() {
        assert!(matches!(
            Command::decode(&[2, 0]),
            Err(WireError::Unsupported(_))
        ));
        assert!(matches!(
            Command::decode(&[1, 42]),
            Err(WireError::UnknownDiscriminant { what: "LedCommandType", value: 42 })
        ));
        assert!(matches!(
            Command::decode(&[1, 0, 1, 0]),
            Err(WireError::Truncated { .. })
        ));
    }

    #[test]
    fn transmission_roundtrip() {
        let cmd: Command = LedCommand::SetColor {
            target: Target::Zone(1),
            color: RGB8 { r: 0, g: 255, b: 0 },
        }
        .into();
        let tx = cmd.to_transmission().unwrap();
        assert_eq!(tx.kind(), TransmissionType::Command);
        assert_eq!(tx.len(), COMMAND_SIZE);
        assert_eq!(Command::from_transmission(&tx).unwrap(), cmd);
    }
}
