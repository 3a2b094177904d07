//! Transport layer for CMS50FW communication.
//!
//! The session never talks to a Bluetooth stack directly. It consumes a
//! [`TransportProvider`], which reports radio state, runs discovery and
//! opens the bidirectional channel to a matched device.

#[cfg(test)]
pub(crate) mod mock;
pub mod serial;

use std::future::Future;
use std::io;
use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::types::DiscoveredDevice;

/// Well-known Serial Port Profile service identifier.
pub const SERIAL_PORT_PROFILE: Uuid = Uuid::from_u128(0x0000_1101_0000_1000_8000_0080_5f9b_34fb);

/// Readable half of an open channel.
pub type BoxReader = Box<dyn AsyncRead + Send + Unpin>;

/// Writable half of an open channel.
pub type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Sender the provider pushes discovery results into.
pub type DiscoverySender = mpsc::UnboundedSender<DiscoveredDevice>;

/// The socket underneath an open channel.
pub trait ChannelSocket: Send + Sync {
    /// Returns true while the socket reports itself connected.
    fn is_connected(&self) -> bool;

    /// Closes the socket.
    fn close(&self) -> io::Result<()>;
}

/// An open channel: socket plus its two stream halves.
pub struct Channel {
    /// The underlying socket.
    pub socket: Box<dyn ChannelSocket>,
    /// Incoming byte stream.
    pub reader: BoxReader,
    /// Outgoing byte stream.
    pub writer: BoxWriter,
}

impl Channel {
    /// Bundles a socket with its stream halves.
    #[must_use]
    pub fn new(socket: Box<dyn ChannelSocket>, reader: BoxReader, writer: BoxWriter) -> Self {
        Self {
            socket,
            reader,
            writer,
        }
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("connected", &self.socket.is_connected())
            .finish_non_exhaustive()
    }
}

/// Trait for platform transport implementations.
pub trait TransportProvider: Send + Sync {
    /// Returns true if the host has a radio at all.
    fn radio_present(&self) -> bool;

    /// Returns true if the radio is switched on.
    fn radio_enabled(&self) -> bool;

    /// Returns true while a discovery scan is running.
    fn is_discovering(&self) -> bool;

    /// Stops any running discovery scan.
    fn cancel_discovery(&self);

    /// Starts a discovery scan, pushing every found device into `results`.
    ///
    /// Returns false if the scan could not be started.
    fn start_discovery(&self, results: DiscoverySender) -> bool;

    /// Opens a channel to `address` on the given service.
    fn open_channel(
        &self,
        address: String,
        service: Uuid,
    ) -> Pin<Box<dyn Future<Output = io::Result<Channel>> + Send + '_>>;
}

pub use serial::{SerialConfig, SerialProvider};
