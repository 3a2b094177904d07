//! In-memory transport provider for tests.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt, DuplexStream};
use uuid::Uuid;

use crate::session::Session;
use crate::transport::{Channel, ChannelSocket, DiscoverySender, TransportProvider};
use crate::types::{DiscoveredDevice, SessionPhase};

type WriteFailure = Arc<Mutex<Option<(io::ErrorKind, String)>>>;

#[derive(Default)]
struct Inner {
    radio_absent: AtomicBool,
    radio_disabled: AtomicBool,
    discovering: AtomicBool,
    start_count: AtomicUsize,
    cancel_count: AtomicUsize,
    discovery_tx: Mutex<Option<DiscoverySender>>,
    opens: Mutex<Vec<(String, Uuid)>>,
    open_failure: Mutex<Option<(io::ErrorKind, String)>>,
    open_delay: Mutex<Option<Duration>>,
    device: Mutex<Option<MockDevice>>,
}

/// Scriptable provider. Clones share state, so a test keeps one clone and
/// hands another to the session.
#[derive(Clone, Default)]
pub(crate) struct MockProvider {
    inner: Arc<Inner>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_radio_present(&self, present: bool) {
        self.inner.radio_absent.store(!present, Ordering::SeqCst);
    }

    pub fn set_radio_enabled(&self, enabled: bool) {
        self.inner.radio_disabled.store(!enabled, Ordering::SeqCst);
    }

    pub fn start_count(&self) -> usize {
        self.inner.start_count.load(Ordering::SeqCst)
    }

    pub fn cancel_count(&self) -> usize {
        self.inner.cancel_count.load(Ordering::SeqCst)
    }

    pub fn open_count(&self) -> usize {
        self.inner.opens.lock().unwrap().len()
    }

    pub fn opens(&self) -> Vec<(String, Uuid)> {
        self.inner.opens.lock().unwrap().clone()
    }

    pub fn fail_opens(&self, kind: io::ErrorKind, message: &str) {
        *self.inner.open_failure.lock().unwrap() = Some((kind, message.to_owned()));
    }

    pub fn delay_opens(&self, delay: Duration) {
        *self.inner.open_delay.lock().unwrap() = Some(delay);
    }

    /// Reports a device to the running discovery scan.
    pub fn announce(&self, device: DiscoveredDevice) -> bool {
        self.inner
            .discovery_tx
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|tx| tx.send(device).is_ok())
    }

    /// Far end of the most recently opened channel.
    pub fn device(&self) -> Option<MockDevice> {
        self.inner.device.lock().unwrap().clone()
    }

    /// Drives a session through discovery to `Connected`.
    pub async fn connect_session(&self, session: &Arc<Session<Self>>) {
        let listener = session.begin_discovery().await;
        assert!(listener.is_some(), "discovery did not start");
        let name = session.config.device_name.clone();
        assert!(self.announce(DiscoveredDevice::new(
            Some(name),
            "00:0E:EA:CF:00:01",
            Vec::new()
        )));
        wait_for_phase(session, SessionPhase::Connected).await;
    }
}

/// Polls until the session reaches `phase`, panicking after a second.
pub(crate) async fn wait_for_phase(session: &Session<MockProvider>, phase: SessionPhase) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while session.phase().await != phase {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("session never reached {phase:?}"));
}

impl TransportProvider for MockProvider {
    fn radio_present(&self) -> bool {
        !self.inner.radio_absent.load(Ordering::SeqCst)
    }

    fn radio_enabled(&self) -> bool {
        self.radio_present() && !self.inner.radio_disabled.load(Ordering::SeqCst)
    }

    fn is_discovering(&self) -> bool {
        self.inner.discovering.load(Ordering::SeqCst)
    }

    fn cancel_discovery(&self) {
        self.inner.cancel_count.fetch_add(1, Ordering::SeqCst);
        self.inner.discovering.store(false, Ordering::SeqCst);
    }

    fn start_discovery(&self, results: DiscoverySender) -> bool {
        self.inner.start_count.fetch_add(1, Ordering::SeqCst);
        self.inner.discovering.store(true, Ordering::SeqCst);
        *self.inner.discovery_tx.lock().unwrap() = Some(results);
        true
    }

    fn open_channel(
        &self,
        address: String,
        service: Uuid,
    ) -> Pin<Box<dyn Future<Output = io::Result<Channel>> + Send + '_>> {
        Box::pin(async move {
            self.inner
                .opens
                .lock()
                .unwrap()
                .push((address, service));

            let delay = *self.inner.open_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let failure = self.inner.open_failure.lock().unwrap().clone();
            if let Some((kind, message)) = failure {
                return Err(io::Error::new(kind, message));
            }

            let (host_end, device_end) = tokio::io::duplex(4096);
            let device = MockDevice {
                to_host: Arc::new(tokio::sync::Mutex::new(Some(device_end))),
                written: Arc::default(),
                write_failure: Arc::default(),
                connected: Arc::new(AtomicBool::new(true)),
                socket_closes: Arc::default(),
                shutdowns: Arc::default(),
            };
            let socket = MockSocket {
                connected: Arc::clone(&device.connected),
                closes: Arc::clone(&device.socket_closes),
            };
            let writer = MockWriter {
                written: Arc::clone(&device.written),
                failure: Arc::clone(&device.write_failure),
                shutdowns: Arc::clone(&device.shutdowns),
            };
            *self.inner.device.lock().unwrap() = Some(device);

            Ok(Channel::new(
                Box::new(socket),
                Box::new(host_end),
                Box::new(writer),
            ))
        })
    }
}

/// Device side of an opened mock channel.
#[derive(Clone)]
pub(crate) struct MockDevice {
    to_host: Arc<tokio::sync::Mutex<Option<DuplexStream>>>,
    written: Arc<Mutex<Vec<u8>>>,
    write_failure: WriteFailure,
    connected: Arc<AtomicBool>,
    socket_closes: Arc<AtomicUsize>,
    shutdowns: Arc<AtomicUsize>,
}

impl MockDevice {
    /// Sends telemetry bytes to the host.
    pub async fn send(&self, bytes: &[u8]) {
        let mut guard = self.to_host.lock().await;
        if let Some(stream) = guard.as_mut() {
            // The host may already have dropped its end.
            let _ = stream.write_all(bytes).await;
        }
    }

    /// Closes the device side of the stream.
    pub async fn hang_up(&self) {
        self.to_host.lock().await.take();
    }

    /// True once the host has dropped its end of the input stream.
    pub async fn host_closed(&self) -> bool {
        let mut guard = self.to_host.lock().await;
        match guard.as_mut() {
            Some(stream) => stream.write_all(&[0]).await.is_err(),
            None => false,
        }
    }

    /// Bytes the host has written so far.
    pub fn written(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }

    pub async fn wait_for_written(&self, len: usize, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            while self.written.lock().unwrap().len() < len {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .is_ok()
    }

    /// Makes every subsequent host write fail.
    pub fn fail_writes(&self, kind: io::ErrorKind, message: &str) {
        *self.write_failure.lock().unwrap() = Some((kind, message.to_owned()));
    }

    /// Marks the socket as no longer connected.
    pub fn drop_link(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn socket_closes(&self) -> usize {
        self.socket_closes.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

struct MockSocket {
    connected: Arc<AtomicBool>,
    closes: Arc<AtomicUsize>,
}

impl ChannelSocket for MockSocket {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn close(&self) -> io::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

struct MockWriter {
    written: Arc<Mutex<Vec<u8>>>,
    failure: WriteFailure,
    shutdowns: Arc<AtomicUsize>,
}

impl AsyncWrite for MockWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if let Some((kind, message)) = self.failure.lock().unwrap().clone() {
            return Poll::Ready(Err(io::Error::new(kind, message)));
        }
        self.written.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Poll::Ready(Ok(()))
    }
}
