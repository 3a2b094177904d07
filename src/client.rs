//! Main [`Oximeter`] client implementation.
//!
//! [`Oximeter`] is the handle applications hold. Control calls never block
//! on the transport: they queue a request for a single control worker task,
//! which runs requests strictly in order and owns the reader, keep-alive
//! and discovery tasks. Everything the session does is reported as
//! [`Event`](crate::event::Event)s.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::event::{ConnectionListener, Subscription};
use crate::session::{self, Liveness, Session, SessionConfig};
use crate::transport::{SerialConfig, SerialProvider, TransportProvider};
use crate::types::{DiscoveredDevice, SessionPhase};

/// How long a reset waits for the reader to wind down before aborting it.
const READER_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    Connect,
    StartData,
    StopData,
    Reset,
    Dispose,
}

struct Control {
    request: Request,
    done: oneshot::Sender<()>,
}

/// Completion handle for a queued control request.
#[derive(Debug)]
#[must_use = "a pending request runs regardless; await it to know when it finished"]
pub struct Pending {
    done: oneshot::Receiver<()>,
}

impl Pending {
    /// Waits until the control worker has finished the request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the worker shut down before running it.
    pub async fn wait(self) -> Result<()> {
        self.done.await.map_err(|_| Error::Disposed)
    }

    /// Like [`wait`](Self::wait), but gives up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if the request is still queued or running.
    pub async fn wait_timeout(self, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| Error::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })?
    }
}

/// Client for a CMS50FW pulse oximeter.
pub struct Oximeter<P> {
    session: Arc<Session<P>>,
    control: mpsc::UnboundedSender<Control>,
    disposed: AtomicBool,
}

impl Oximeter<SerialProvider> {
    /// Creates a client for a device bound to a serial port.
    ///
    /// # Arguments
    ///
    /// * `port` - Serial port path (e.g., "/dev/rfcomm0")
    ///
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn serial(port: impl Into<String>) -> Self {
        Self::with_serial_config(SerialConfig::new(port))
    }

    /// Creates a client with custom serial configuration.
    #[must_use]
    pub fn with_serial_config(config: SerialConfig) -> Self {
        let session_config = SessionConfig::new(config.device_name.clone());
        Self::new(SerialProvider::new(config), session_config)
    }
}

impl<P: TransportProvider + 'static> Oximeter<P> {
    /// Creates a client over the given provider and spawns its control worker.
    ///
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn new(provider: P, config: SessionConfig) -> Self {
        let session = Arc::new(Session::new(provider, config));
        let (control, requests) = mpsc::unbounded_channel();

        let worker = Worker {
            session: Arc::clone(&session),
            discovery: None,
            reader: None,
            keep_alive: None,
        };
        tokio::spawn(worker.run(requests));

        Self {
            session,
            control,
            disposed: AtomicBool::new(false),
        }
    }

    /// Starts discovery and connects to the first device with the
    /// configured name.
    ///
    /// Progress is reported through events; [`Event::ConnectionEstablished`]
    /// marks success.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RadioUnavailable`] or [`Error::RadioDisabled`] if the
    /// host radio cannot be used, and [`Error::Disposed`] after
    /// [`dispose`](Self::dispose).
    ///
    /// [`Event::ConnectionEstablished`]: crate::event::Event::ConnectionEstablished
    pub fn connect(&self) -> Result<Pending> {
        self.ensure_open()?;
        if !self.session.provider.radio_present() {
            self.session
                .events
                .log("Bluetooth is not supported on this device.");
            return Err(Error::RadioUnavailable);
        }
        if !self.session.provider.radio_enabled() {
            self.session
                .events
                .log("Bluetooth is not enabled. Please enable it and try again.");
            return Err(Error::RadioDisabled);
        }
        self.submit(Request::Connect)
    }

    /// Asks the device to stream telemetry and starts the keep-alive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] after [`dispose`](Self::dispose).
    pub fn start_data(&self) -> Result<Pending> {
        self.ensure_open()?;
        self.submit(Request::StartData)
    }

    /// Stops the keep-alive and asks the device to stop streaming.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] after [`dispose`](Self::dispose).
    pub fn stop_data(&self) -> Result<Pending> {
        self.ensure_open()?;
        self.submit(Request::StopData)
    }

    /// Stops data, then closes the link and returns to idle.
    ///
    /// Safe in any phase and idempotent. [`connect`](Self::connect) must be
    /// called again before more data can be read.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] after [`dispose`](Self::dispose).
    pub fn reset(&self) -> Result<Pending> {
        self.ensure_open()?;
        self.submit(Request::Reset)
    }

    /// Tears the session down and stops the control worker.
    ///
    /// Every later control call fails with [`Error::Disposed`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if already disposed.
    pub fn dispose(&self) -> Result<Pending> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Err(Error::Disposed);
        }
        self.submit(Request::Dispose)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            Err(Error::Disposed)
        } else {
            Ok(())
        }
    }

    fn submit(&self, request: Request) -> Result<Pending> {
        let (done, pending) = oneshot::channel();
        self.control
            .send(Control { request, done })
            .map_err(|_| Error::Disposed)?;
        Ok(Pending { done: pending })
    }

    // ==================== State ====================

    /// Returns the current lifecycle phase.
    pub async fn phase(&self) -> SessionPhase {
        self.session.phase().await
    }

    /// Returns true if the link is usable right now.
    pub async fn connection_alive(&self) -> bool {
        self.session.connection_alive().await
    }

    /// Returns the per-component liveness snapshot.
    pub async fn liveness(&self) -> Liveness {
        self.session.liveness().await
    }

    /// Returns true while streaming is requested.
    #[must_use]
    pub fn reading_enabled(&self) -> bool {
        self.session.reading_enabled()
    }

    /// Returns the matched device, if any.
    pub async fn device(&self) -> Option<DiscoveredDevice> {
        self.session.device().await
    }

    /// Returns the session configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.session.config
    }

    // ==================== Events ====================

    /// Subscribes to session events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.session.events.subscribe()
    }

    /// Delivers every future event to `listener` on a background task.
    ///
    /// Abort the returned handle to detach the listener.
    pub fn set_connection_listener<L>(&self, listener: L) -> JoinHandle<()>
    where
        L: ConnectionListener + 'static,
    {
        self.session.events.forward_to(listener)
    }
}

/// Control worker. Owns the background task handles so only one request
/// at a time can start or stop them.
struct Worker<P> {
    session: Arc<Session<P>>,
    discovery: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
    keep_alive: Option<JoinHandle<()>>,
}

impl<P: TransportProvider + 'static> Worker<P> {
    async fn run(mut self, mut requests: mpsc::UnboundedReceiver<Control>) {
        while let Some(Control { request, done }) = requests.recv().await {
            tracing::debug!("control request: {:?}", request);
            match request {
                Request::Connect => self.connect().await,
                Request::StartData => self.start_data().await,
                Request::StopData => self.stop_data().await,
                Request::Reset => self.reset().await,
                Request::Dispose => self.dispose().await,
            }
            // The caller may have dropped its handle.
            let _ = done.send(());

            if request == Request::Dispose {
                break;
            }
        }
        self.abort_all();
        tracing::debug!("control worker stopped");
    }

    async fn connect(&mut self) {
        if let Some(listener) = self.session.begin_discovery().await {
            if let Some(previous) = self.discovery.replace(listener) {
                previous.abort();
            }
        }
    }

    /// Only the worker enables reading, so a later stop always wins.
    async fn start_data(&mut self) {
        if self.session.reading_enabled() && is_running(self.reader.as_ref()) {
            self.session.events.log("Data read already in progress.");
            return;
        }

        // A reader left over from an earlier stop must exit before the
        // flag goes back up, or it would keep running.
        self.finish_reader().await;
        if !self.session.start_data().await {
            return;
        }

        if is_running(self.keep_alive.as_ref()) {
            tracing::debug!("keep-alive already running");
        } else {
            self.keep_alive = Some(session::spawn_keep_alive(Arc::clone(&self.session)));
        }
        self.reader = Some(session::spawn_reader(Arc::clone(&self.session)));
    }

    async fn stop_data(&mut self) {
        if let Some(keep_alive) = self.keep_alive.take() {
            keep_alive.abort();
        }
        self.session.stop_data().await;
    }

    async fn reset(&mut self) {
        self.stop_data().await;
        self.teardown().await;
    }

    async fn dispose(&mut self) {
        self.session.set_reading_enabled(false);
        if let Some(keep_alive) = self.keep_alive.take() {
            keep_alive.abort();
        }
        self.teardown().await;
        self.session.events.log("Disposed CMS50FW connection manager.");
    }

    /// Lets the reader finish, drops discovery, then resets the session.
    async fn teardown(&mut self) {
        self.finish_reader().await;
        if let Some(discovery) = self.discovery.take() {
            discovery.abort();
        }
        self.session.reset().await;
    }

    /// Waits for the reader to exit, aborting it after a grace period.
    async fn finish_reader(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            if tokio::time::timeout(READER_SHUTDOWN_GRACE, &mut reader)
                .await
                .is_err()
            {
                tracing::warn!("reader did not stop in time, aborting it");
                reader.abort();
            }
        }
    }

    fn abort_all(&mut self) {
        for task in [
            self.discovery.take(),
            self.reader.take(),
            self.keep_alive.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
    }
}

fn is_running(task: Option<&JoinHandle<()>>) -> bool {
    task.is_some_and(|task| !task.is_finished())
}
