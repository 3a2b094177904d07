//! Serial transport provider.
//!
//! On Linux an RFCOMM link can be bound to a tty (`rfcomm bind 0 <addr>`
//! creates `/dev/rfcomm0`); opening that tty connects the link. This
//! provider drives such a port. Discovery is a formality: the configured
//! port is reported under the configured device name.

use std::future::Future;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio_serial::SerialPortBuilderExt;
use uuid::Uuid;

use crate::error::Result;
use crate::transport::{Channel, ChannelSocket, DiscoverySender, TransportProvider};
use crate::types::DiscoveredDevice;

/// Default baud rate for RFCOMM ttys.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default connection delay.
pub const DEFAULT_CONNECTION_DELAY: Duration = Duration::from_millis(300);

/// Bluetooth name the CMS50FW advertises.
pub const DEFAULT_DEVICE_NAME: &str = "SpO202";

/// Configuration for the serial provider.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Serial port path (e.g., "/dev/rfcomm0" or "COM3").
    pub port: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Delay after opening before the channel is handed out.
    pub connection_delay: Duration,
    /// Name the port is reported under during discovery.
    pub device_name: String,
}

impl SerialConfig {
    /// Creates a new serial configuration with default settings.
    #[must_use]
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            connection_delay: DEFAULT_CONNECTION_DELAY,
            device_name: DEFAULT_DEVICE_NAME.to_owned(),
        }
    }

    /// Sets the baud rate.
    #[must_use]
    pub const fn baud_rate(mut self, rate: u32) -> Self {
        self.baud_rate = rate;
        self
    }

    /// Sets the connection delay.
    #[must_use]
    pub const fn connection_delay(mut self, delay: Duration) -> Self {
        self.connection_delay = delay;
        self
    }

    /// Sets the name reported during discovery.
    #[must_use]
    pub fn device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = name.into();
        self
    }
}

/// Socket state for an open serial port.
struct SerialSocket {
    connected: AtomicBool,
}

impl ChannelSocket for SerialSocket {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn close(&self) -> io::Result<()> {
        // The port itself closes once both stream halves are dropped.
        self.connected.store(false, Ordering::Release);
        Ok(())
    }
}

/// Transport provider over a tty-bound RFCOMM link.
#[derive(Debug)]
pub struct SerialProvider {
    config: SerialConfig,
    discovering: Arc<AtomicBool>,
}

impl SerialProvider {
    /// Creates a new provider with the given configuration.
    #[must_use]
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config,
            discovering: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Creates a new provider for the given port with default settings.
    #[must_use]
    pub fn with_port(port: impl Into<String>) -> Self {
        Self::new(SerialConfig::new(port))
    }

    /// Returns the provider configuration.
    #[must_use]
    pub const fn config(&self) -> &SerialConfig {
        &self.config
    }
}

impl TransportProvider for SerialProvider {
    fn radio_present(&self) -> bool {
        true
    }

    fn radio_enabled(&self) -> bool {
        Path::new(&self.config.port).exists()
            || list_ports().is_ok_and(|ports| ports.contains(&self.config.port))
    }

    fn is_discovering(&self) -> bool {
        self.discovering.load(Ordering::Acquire)
    }

    fn cancel_discovery(&self) {
        self.discovering.store(false, Ordering::Release);
    }

    fn start_discovery(&self, results: DiscoverySender) -> bool {
        self.discovering.store(true, Ordering::Release);
        let device = DiscoveredDevice::new(
            Some(self.config.device_name.clone()),
            self.config.port.clone(),
            Vec::new(),
        );
        tracing::debug!("reporting serial port as discovered device: {}", device);
        results.send(device).is_ok()
    }

    fn open_channel(
        &self,
        address: String,
        _service: Uuid,
    ) -> Pin<Box<dyn Future<Output = io::Result<Channel>> + Send + '_>> {
        Box::pin(async move {
            tracing::info!("opening serial port: {}", address);

            let mut stream = tokio_serial::new(&address, self.config.baud_rate)
                .open_native_async()
                .map_err(io::Error::from)?;

            if let Err(e) = tokio_serial::SerialPort::write_request_to_send(&mut stream, false) {
                tracing::warn!("failed to set RTS: {}", e);
            }

            // Wait for device to be ready
            tokio::time::sleep(self.config.connection_delay).await;

            let (reader, writer) = tokio::io::split(stream);
            let socket = SerialSocket {
                connected: AtomicBool::new(true),
            };

            tracing::info!("serial port open");
            Ok(Channel::new(
                Box::new(socket),
                Box::new(reader),
                Box::new(writer),
            ))
        })
    }
}

/// Lists available serial ports.
///
/// # Errors
///
/// Returns an error if the port list cannot be retrieved.
pub fn list_ports() -> Result<Vec<String>> {
    let ports = tokio_serial::available_ports()?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}
