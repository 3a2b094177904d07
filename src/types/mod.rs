//! Data types for CMS50FW sessions.
//!
//! This module contains the core data structures used throughout the library:
//! - Decoded telemetry frames
//! - Discovered devices and session phases

pub mod data_frame;
pub mod device;

pub use data_frame::{DataFrame, finger_out_of_sleeve};
pub use device::{DiscoveredDevice, SessionPhase};
