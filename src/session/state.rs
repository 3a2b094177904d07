//! The session record and link liveness.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::transport::{BoxReader, BoxWriter, Channel, ChannelSocket};
use crate::types::{DiscoveredDevice, SessionPhase};

/// Snapshot of everything the link needs to be usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct Liveness {
    /// The host radio is on.
    pub radio_enabled: bool,
    /// A target device has been matched.
    pub device_matched: bool,
    /// The input stream is present.
    pub input_open: bool,
    /// The output stream is present.
    pub output_open: bool,
    /// The socket reports itself connected.
    pub socket_connected: bool,
}

impl Liveness {
    /// True only when every component holds.
    #[must_use]
    pub const fn is_alive(self) -> bool {
        self.radio_enabled
            && self.device_matched
            && self.input_open
            && self.output_open
            && self.socket_connected
    }
}

/// Input stream shared with the reader. Closing takes the stream out, so a
/// reader still holding the `Arc` finds it gone.
pub(crate) type SharedReader = Arc<Mutex<Option<BoxReader>>>;

/// Output stream shared with every command writer.
pub(crate) type SharedWriter = Arc<Mutex<BoxWriter>>;

/// Handles taken out of the session by a reset, ready to be closed.
pub(crate) struct DetachedLink {
    pub socket: Option<Box<dyn ChannelSocket>>,
    pub input: Option<SharedReader>,
    pub output: Option<SharedWriter>,
}

/// Mutable session record. Only the session owns the handles; reader and
/// keep-alive clone the stream `Arc`s and never close them.
pub(crate) struct SessionState {
    pub phase: SessionPhase,
    pub device: Option<DiscoveredDevice>,
    pub socket: Option<Box<dyn ChannelSocket>>,
    pub input: Option<SharedReader>,
    pub output: Option<SharedWriter>,
    /// Bumped by every reset so stale discovery work can tell it lost.
    pub generation: u64,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            device: None,
            socket: None,
            input: None,
            output: None,
            generation: 0,
        }
    }

    pub fn liveness(&self, radio_enabled: bool) -> Liveness {
        Liveness {
            radio_enabled,
            device_matched: self.device.is_some(),
            input_open: self.input.is_some(),
            output_open: self.output.is_some(),
            socket_connected: self.socket.as_ref().is_some_and(|s| s.is_connected()),
        }
    }

    /// Records an opened channel and moves to `Connected`.
    pub fn install(&mut self, channel: Channel) {
        self.socket = Some(channel.socket);
        self.input = Some(Arc::new(Mutex::new(Some(channel.reader))));
        self.output = Some(Arc::new(Mutex::new(channel.writer)));
        self.phase = SessionPhase::Connected;
    }

    /// Takes every handle out and forgets the device.
    pub fn detach(&mut self) -> DetachedLink {
        self.device = None;
        DetachedLink {
            socket: self.socket.take(),
            input: self.input.take(),
            output: self.output.take(),
        }
    }
}
