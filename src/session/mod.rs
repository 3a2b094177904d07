//! Device session: state machine, stream reader and keep-alive.
//!
//! A [`Session`] is the single owner of the transport handles. Work runs on
//! separate tasks that all share it through an `Arc`:
//! - the control worker in [`crate::client`] drives every transition,
//! - the discovery listener matches devices and opens the channel,
//! - the stream reader decodes telemetry,
//! - the keep-alive pings the device while reading is enabled.

pub mod config;
mod keepalive;
mod reader;
pub mod state;

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::AsyncWriteExt;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::event::{Event, EventDispatcher};
use crate::protocol::CommandOpcode;
use crate::transport::{Channel, TransportProvider};
use crate::types::{DiscoveredDevice, SessionPhase};

pub use config::SessionConfig;
pub use state::Liveness;

pub(crate) use keepalive::spawn as spawn_keep_alive;
pub(crate) use reader::spawn as spawn_reader;

use state::{DetachedLink, SessionState};

/// Shared core of a device session.
pub(crate) struct Session<P> {
    pub(crate) provider: P,
    pub(crate) config: SessionConfig,
    pub(crate) events: EventDispatcher,
    pub(crate) state: RwLock<SessionState>,
    reading_enabled: AtomicBool,
}

impl<P: TransportProvider + 'static> Session<P> {
    pub(crate) fn new(provider: P, config: SessionConfig) -> Self {
        let events = EventDispatcher::new(config.event_capacity);
        Self {
            provider,
            config,
            events,
            state: RwLock::new(SessionState::new()),
            reading_enabled: AtomicBool::new(false),
        }
    }

    pub(crate) fn reading_enabled(&self) -> bool {
        self.reading_enabled.load(Ordering::Acquire)
    }

    pub(crate) fn set_reading_enabled(&self, enabled: bool) {
        self.reading_enabled.store(enabled, Ordering::Release);
    }

    pub(crate) async fn phase(&self) -> SessionPhase {
        self.state.read().await.phase
    }

    pub(crate) async fn device(&self) -> Option<DiscoveredDevice> {
        self.state.read().await.device.clone()
    }

    pub(crate) async fn liveness(&self) -> Liveness {
        let radio_enabled = self.provider.radio_enabled();
        self.state.read().await.liveness(radio_enabled)
    }

    /// True iff radio, device, both streams and the socket are all usable.
    pub(crate) async fn connection_alive(&self) -> bool {
        self.liveness().await.is_alive()
    }

    // ==================== Discovery and Connect ====================

    /// Starts discovery and returns the listener task that will connect to
    /// the first device matching the configured name.
    ///
    /// Returns `None` if the session is already connected or connecting.
    pub(crate) async fn begin_discovery(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.connection_alive().await {
            self.events.log("Already connected to CMS50FW. Reset first to reconnect.");
            return None;
        }
        if self.phase().await == SessionPhase::Connecting {
            self.events.log("A connect attempt is already underway.");
            return None;
        }

        if self.provider.is_discovering() {
            self.events.log("Canceling previous Bluetooth discovery.");
            self.provider.cancel_discovery();
        }

        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let generation = {
            let mut state = self.state.write().await;
            state.phase = SessionPhase::Discovering;
            // Any listener from an earlier scan can no longer commit.
            state.generation = state.generation.wrapping_add(1);
            state.generation
        };

        self.events
            .log("Initiating bluetooth discovery of CMS50FW device.");
        if self.provider.start_discovery(results_tx) {
            tracing::debug!("discovery started");
        } else {
            self.events
                .log("Could not start bluetooth discovery. Bluetooth is not turned on.");
        }

        let session = Arc::clone(self);
        Some(tokio::spawn(async move {
            session.listen_for_device(results_rx, generation).await;
        }))
    }

    /// Consumes discovery results until the target device is matched.
    async fn listen_for_device(
        &self,
        mut results: mpsc::UnboundedReceiver<DiscoveredDevice>,
        generation: u64,
    ) {
        while let Some(device) = results.recv().await {
            self.events.log("A Bluetooth device has been found.");
            tracing::debug!("bluetooth device found: {}", device);

            if !device.is_named(&self.config.device_name) {
                continue;
            }

            self.events.log("The Bluetooth device found is the CMS50FW");
            // First match wins; stop listening whatever the outcome.
            self.connect_device(device, generation).await;
            return;
        }
        tracing::debug!("discovery results closed without a match");
    }

    /// Connecting transition: record the device, stop scanning, open the channel.
    async fn connect_device(&self, device: DiscoveredDevice, generation: u64) {
        let service = device.service_or(self.config.default_service);
        {
            let mut state = self.state.write().await;
            if state.generation != generation || state.phase != SessionPhase::Discovering {
                tracing::debug!("ignoring match from a superseded discovery");
                return;
            }
            state.device = Some(device.clone());
            state.phase = SessionPhase::Connecting;
        }

        // Found our device, no more need for discovery.
        self.provider.cancel_discovery();

        self.events.log("Attempting to connect to CMS50FW.");
        self.events.dispatch(Event::ConnectionAttemptInProgress);

        if device.service_ids.is_empty() {
            tracing::debug!("using default service {}", service);
        } else {
            tracing::debug!("using service advertised by device: {}", service);
        }

        self.events
            .log("Attempting to open a channel to the CMS50FW device.");
        let opened = self.open_channel(device.address.clone(), service).await;

        let mut state = self.state.write().await;
        match opened {
            Ok(channel) if state.generation == generation => {
                state.install(channel);
                drop(state);
                self.events.log("Channel connected successfully.");
                self.events.dispatch(Event::ConnectionEstablished);
                self.events.log("Discovery and connection complete.");
            }
            Ok(channel) => {
                drop(state);
                tracing::debug!("session reset while connecting, closing new channel");
                if let Err(e) = channel.socket.close() {
                    tracing::error!("could not close superseded socket: {}", e);
                }
            }
            Err(e) => {
                if state.generation == generation {
                    state.phase = SessionPhase::Idle;
                    state.device = None;
                }
                drop(state);
                tracing::error!("failed to open channel to {}: {}", device.address, e);
                self.events
                    .log("Error: connect attempt failed. Please try again.");
            }
        }
    }

    async fn open_channel(
        &self,
        address: String,
        service: Uuid,
    ) -> io::Result<Channel> {
        let open = self.provider.open_channel(address, service);
        match self.config.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, open).await.unwrap_or_else(|_| {
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("channel not open after {}ms", timeout.as_millis()),
                ))
            }),
            None => open.await,
        }
    }

    // ==================== Start, Stop and Reset ====================

    /// Streaming transition: enables reading and asks the device for data.
    ///
    /// Returns false, touching nothing, if the connection is not alive.
    pub(crate) async fn start_data(&self) -> bool {
        if !self.connection_alive().await {
            self.events.log("Error. Connection is not alive.");
            return false;
        }

        self.set_reading_enabled(true);
        {
            let mut state = self.state.write().await;
            if state.phase == SessionPhase::Connected {
                state.phase = SessionPhase::Streaming;
            }
        }

        self.events.log("Beginning data read operations.");
        match self.write_command(CommandOpcode::StartData, None).await {
            Ok(true) => self.events.log("Wrote start data command to output stream."),
            Ok(false) => {}
            Err(e) => tracing::error!("could not write start data command: {}", e),
        }
        true
    }

    /// Disables reading and asks the device to stop streaming.
    pub(crate) async fn stop_data(&self) {
        self.set_reading_enabled(false);
        {
            let mut state = self.state.write().await;
            if state.phase == SessionPhase::Streaming {
                state.phase = SessionPhase::Connected;
            }
        }

        if !self.connection_alive().await {
            self.events
                .log("Output stream is not available. Probably best to reset and reinitialize.");
            return;
        }

        match self.write_command(CommandOpcode::StopData, None).await {
            Ok(true) => self.events.log("Wrote stop data command to output stream."),
            Ok(false) => {}
            Err(e) => {
                tracing::error!("could not write stop data command to output stream: {}", e);
            }
        }
    }

    /// Returns the session to `Idle`, closing every handle.
    ///
    /// Safe to call in any phase, any number of times.
    pub(crate) async fn reset(&self) {
        self.events.log("Starting reset");
        self.set_reading_enabled(false);

        let link = {
            let mut state = self.state.write().await;
            state.phase = SessionPhase::Resetting;
            state.generation = state.generation.wrapping_add(1);
            state.detach()
        };

        if self.provider.is_discovering() {
            self.provider.cancel_discovery();
        }

        self.events.log("Closing Bluetooth socket and I/O streams.");
        self.close_link(link).await;

        self.state.write().await.phase = SessionPhase::Idle;
        self.events.dispatch(Event::ConnectionReset);
        self.events.log("Reset complete");
    }

    /// Closes output, input, then socket. Failures are logged only.
    async fn close_link(&self, link: DetachedLink) {
        let DetachedLink {
            socket,
            input,
            output,
        } = link;

        if let Some(output) = output {
            match output.lock().await.shutdown().await {
                Ok(()) => self.events.log("Closed OutputStream"),
                Err(e) => tracing::error!("could not close OutputStream: {}", e),
            }
        }

        if let Some(input) = input {
            // Waits for a running reader to notice the detached link.
            let stream = input.lock().await.take();
            drop(stream);
            self.events.log("Closed InputStream");
        }

        if let Some(socket) = socket {
            match socket.close() {
                Ok(()) => self.events.log("Closed Bluetooth Socket"),
                Err(e) => tracing::error!("could not close Bluetooth Socket: {}", e),
            }
        }
    }
}
