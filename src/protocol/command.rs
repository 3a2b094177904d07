//! Command packets for the CMS50FW protocol.
//!
//! Every command is a fixed-width packet:
//! ```text
//! ┌──────┬──────┬────────┬───────────┬──────────────────────────┐
//! │ 0x7D │ 0x81 │ opcode │ data/0x80 │ 0x80 0x80 0x80 0x80 0x80 │
//! └──────┴──────┴────────┴───────────┴──────────────────────────┘
//! ```

use bytes::{BufMut, Bytes, BytesMut};

/// Marks the beginning of command bytes.
pub const COMMAND_FOLLOWS: u8 = 0x7D;

/// Second byte of every command. Required by the device, meaning unknown.
pub const COMMAND_CONSTANT: u8 = 0x81;

/// Filler byte, also used when a command carries no data byte.
pub const PADDING: u8 = 0x80;

/// Total length of an encoded command.
pub const COMMAND_LEN: usize = 9;

/// Number of trailing padding bytes after the data byte.
const TRAILING_PADDING: usize = 5;

/// Command opcodes sent to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandOpcode {
    /// Begin streaming live data.
    StartData = 0xA1,
    /// Stop streaming live data.
    StopData = 0xA2,
    /// Send user information.
    SendUserInformation = 0xAB,
    /// Keep the link from timing out.
    StayConnected = 0xAF,
}

impl CommandOpcode {
    /// Returns the opcode name used in log messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::StartData => "START_DATA",
            Self::StopData => "STOP_DATA",
            Self::SendUserInformation => "SEND_USER_INFORMATION",
            Self::StayConnected => "STAY_CONNECTED",
        }
    }
}

impl From<CommandOpcode> for u8 {
    fn from(cmd: CommandOpcode) -> Self {
        cmd as Self
    }
}

/// Encodes a command into its wire bytes.
///
/// `data` is the optional auxiliary byte; [`PADDING`] is sent in its place
/// when the command has none.
#[must_use]
pub fn encode(opcode: CommandOpcode, data: Option<u8>) -> Bytes {
    let mut buf = BytesMut::with_capacity(COMMAND_LEN);
    buf.put_u8(COMMAND_FOLLOWS);
    buf.put_u8(COMMAND_CONSTANT);
    buf.put_u8(opcode.into());
    buf.put_u8(data.unwrap_or(PADDING));
    buf.put_bytes(PADDING, TRAILING_PADDING);
    buf.freeze()
}
