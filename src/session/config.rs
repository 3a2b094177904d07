//! Session configuration.

use std::time::Duration;

use uuid::Uuid;

use crate::transport::SERIAL_PORT_PROFILE;
use crate::transport::serial::DEFAULT_DEVICE_NAME;

/// Default interval between keep-alive pings.
pub const DEFAULT_KEEP_ALIVE_PERIOD: Duration = Duration::from_secs(5);

/// Default interval at which a waiting reader re-checks the link.
pub const DEFAULT_LIVENESS_POLL: Duration = Duration::from_millis(20);

/// Default event channel capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Configuration for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Bluetooth name of the target device.
    pub device_name: String,
    /// Interval between keep-alive pings while reading.
    pub keep_alive_period: Duration,
    /// How often a reader waiting for bytes re-checks the link.
    pub liveness_poll: Duration,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
    /// Service used when the device advertises none.
    pub default_service: Uuid,
    /// Deadline for opening the channel; `None` waits indefinitely.
    pub connect_timeout: Option<Duration>,
}

impl SessionConfig {
    /// Creates a configuration targeting the given device name.
    #[must_use]
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            ..Self::default()
        }
    }

    /// Sets the keep-alive period.
    #[must_use]
    pub const fn keep_alive_period(mut self, period: Duration) -> Self {
        self.keep_alive_period = period;
        self
    }

    /// Sets the reader's liveness poll interval.
    #[must_use]
    pub const fn liveness_poll(mut self, interval: Duration) -> Self {
        self.liveness_poll = interval;
        self
    }

    /// Sets the event channel capacity.
    #[must_use]
    pub const fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Sets the fallback service identifier.
    #[must_use]
    pub const fn default_service(mut self, service: Uuid) -> Self {
        self.default_service = service;
        self
    }

    /// Sets a deadline for opening the channel.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device_name: DEFAULT_DEVICE_NAME.to_owned(),
            keep_alive_period: DEFAULT_KEEP_ALIVE_PERIOD,
            liveness_poll: DEFAULT_LIVENESS_POLL,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            default_service: SERIAL_PORT_PROFILE,
            connect_timeout: None,
        }
    }
}
