//! The CMD53 command frame as it appears on MOSI, and the payload word
//! as it appears on MISO.

use bitmatch::bitmatch;

use crate::MalformedFrame;

/// Byte that precedes the command token of every frame.
pub const START_MARKER: u8 = 0xFF;

/// IO_RW_EXTENDED. The only command index this crate decodes.
pub const CMD53: u8 = 53;

/// Start marker, command token, 4 argument bytes and the CRC7 trailer.
pub const FRAME_LEN: usize = 7;

/// Offset of the payload word on MISO, counted from the start of the
/// frame: the 7 command bytes plus 4 bytes of response and padding.
///
/// Derived from captures rather than a documented protocol field.
pub const PAYLOAD_OFFSET: usize = 11;

/// Length of the payload word on MISO.
pub const PAYLOAD_LEN: usize = 4;

/// Size of a single transfer block when [`CommandArgument::block_mode`]
/// is set.
pub const BLOCK_SIZE: u32 = 512;

/// Whether a transaction reads from or writes to the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AccessType {
    /// Card to host.
    Read,

    /// Host to card.
    Write,
}

/// The 32-bit CMD53 argument, split into its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CommandArgument {
    /// R/W flag; bit\[31\].
    pub access: AccessType,

    /// Function number; bits\[30:28\].
    pub function: u8,

    /// Block mode; bit\[27\].
    pub block_mode: bool,

    /// OP code; bit\[26\]. Set if the address is incremented after each
    /// byte, clear if every byte goes to the same address.
    pub increment_addressing: bool,

    /// Register address; bits\[25:9\].
    pub address: u32,

    /// Byte or block count; bits\[8:0\].
    pub count: u16,
}

impl CommandArgument {
    /// Decodes the argument from its on-wire representation. MSB first.
    #[bitmatch]
    pub fn decode(bytes: [u8; 4]) -> Self {
        let raw = u32::from_be_bytes(bytes);

        #[bitmatch]
        let "wfff_biaa_aaaa_aaaa_aaaa_aaac_cccc_cccc" = raw;

        Self {
            access: if w == 0 {
                AccessType::Read
            } else {
                AccessType::Write
            },
            function: (f & 0b111) as u8,
            block_mode: b != 0,
            increment_addressing: i != 0,
            address: a & 0x1_FFFF,
            count: (c & 0x1FF) as u16,
        }
    }

    /// Packs the fields back into the raw argument word. Fields wider
    /// than their slot are masked.
    pub fn to_raw(&self) -> u32 {
        (u32::from(self.access == AccessType::Write) << 31)
            | (u32::from(self.function & 0b111) << 28)
            | (u32::from(self.block_mode) << 27)
            | (u32::from(self.increment_addressing) << 26)
            | ((self.address & 0x1_FFFF) << 9)
            | u32::from(self.count & 0x1FF)
    }
}

/// A complete command frame read from MOSI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CommandFrame {
    /// Always [`START_MARKER`].
    pub start_marker: u8,

    /// Start bit, transmission bit and the 6-bit command index.
    pub command: u8,

    /// Decoded argument.
    pub argument: CommandArgument,

    /// CRC7 and end bit. Kept as-is; never verified.
    pub crc: u8,
}

impl CommandFrame {
    /// Parses a frame from the first [`FRAME_LEN`] bytes of `bytes`.
    /// Trailing bytes are ignored.
    pub fn parse(bytes: &[u8]) -> Result<Self, MalformedFrame> {
        let (start_marker, command, argument, crc) = match *bytes {
            [marker, command, a0, a1, a2, a3, crc, ..] => (marker, command, [a0, a1, a2, a3], crc),
            _ => return Err(MalformedFrame::Truncated { len: bytes.len() }),
        };

        if start_marker != START_MARKER {
            return Err(MalformedFrame::InvalidStartMarker(start_marker));
        }
        if command_index(command) != Some(CMD53) {
            return Err(MalformedFrame::UnsupportedCommand(command));
        }

        Ok(Self {
            start_marker,
            command,
            argument: CommandArgument::decode(argument),
            crc,
        })
    }
}

/// Extracts the command index from a command token. `None` if the start
/// and transmission bits are not `0b01`.
#[bitmatch]
pub fn command_index(token: u8) -> Option<u8> {
    #[bitmatch]
    match token {
        "01ii_iiii" => Some(i),
        "????_????" => None,
    }
}

/// Interprets a MISO payload word. LSB first, unlike the command
/// argument.
pub fn decode_payload(bytes: [u8; 4]) -> u32 {
    u32::from_le_bytes(bytes)
}
