//! # cms50fw
//!
//! A Rust client library for CMS50FW wrist pulse oximeters.
//!
//! The device talks over a Bluetooth serial (RFCOMM) link: the host sends
//! fixed 9-byte commands and the device streams 8-byte telemetry frames
//! carrying pulse rate, SpO2 and the pulse waveform.
//!
//! ## Features
//!
//! - Async/await based API using Tokio
//! - Discovery and connect state machine with idempotent reset
//! - Keep-alive supervisor and broken-link detection
//! - Event-driven reporting of every state change and reading
//!
//! ## Quick Start
//!
//! ```no_run
//! use cms50fw::{Event, Oximeter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), cms50fw::Error> {
//!     // Link bound with `rfcomm bind 0 <address>`
//!     let oximeter = Oximeter::serial("/dev/rfcomm0");
//!     let mut events = oximeter.subscribe();
//!
//!     oximeter.connect()?.wait().await?;
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             Event::ConnectionEstablished => {
//!                 oximeter.start_data()?;
//!             }
//!             Event::DataFrameArrived(Some(frame)) => {
//!                 println!("pulse {} bpm, SpO2 {}%", frame.pulse_rate, frame.spo2_percentage);
//!             }
//!             Event::BrokenConnection => break,
//!             _ => {}
//!         }
//!     }
//!
//!     oximeter.reset()?.wait().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`protocol`] - Wire codec (command packets, telemetry frames)
//! - [`types`] - Data structures (frames, devices, lifecycle phases)
//! - [`transport`] - Transport provider abstraction and serial provider
//! - [`event`] - Async event system and listener callbacks
//! - [`session`] - Session configuration and link liveness
//! - [`client`] - High-level [`Oximeter`] client

pub mod client;
mod commands;
pub mod error;
pub mod event;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::{Oximeter, Pending};
pub use error::{Error, Result, is_broken_pipe};
pub use event::{
    ConnectionListener, Event, EventDispatcher, EventFilter, EventKind, LoggingListener,
    Subscription,
};
pub use protocol::{CommandOpcode, FrameDecoder, decode_frame, encode_command};
pub use session::{Liveness, SessionConfig};
pub use transport::{
    Channel, ChannelSocket, SERIAL_PORT_PROFILE, SerialConfig, SerialProvider, TransportProvider,
    serial::list_ports,
};
pub use types::{DataFrame, DiscoveredDevice, SessionPhase};
