//! Protocol definitions for CMS50FW communication.
//!
//! This module contains the low-level protocol types:
//! - Command packet encoding
//! - Telemetry frame decoding

pub mod command;
pub mod frame;

pub use command::{
    COMMAND_CONSTANT, COMMAND_FOLLOWS, COMMAND_LEN, CommandOpcode, PADDING, encode as encode_command,
};
pub use frame::{BOUNDARY_BIT, FRAME_LEN, FrameDecoder, decode_frame, is_boundary};
