//! Device and session lifecycle types.

use std::fmt;

use uuid::Uuid;

/// A device reported by discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Advertised Bluetooth name, if the device reported one.
    pub name: Option<String>,
    /// Hardware address (or port path for tty-bound links).
    pub address: String,
    /// Service identifiers advertised by the device, possibly empty.
    pub service_ids: Vec<Uuid>,
}

impl DiscoveredDevice {
    /// Creates a device record.
    #[must_use]
    pub fn new(name: Option<String>, address: impl Into<String>, service_ids: Vec<Uuid>) -> Self {
        Self {
            name,
            address: address.into(),
            service_ids,
        }
    }

    /// Returns true if the advertised name equals `target`.
    #[must_use]
    pub fn is_named(&self, target: &str) -> bool {
        self.name.as_deref() == Some(target)
    }

    /// Picks the service to connect to.
    ///
    /// The first advertised identifier wins over `default`.
    #[must_use]
    pub fn service_or(&self, default: Uuid) -> Uuid {
        self.service_ids.first().copied().unwrap_or(default)
    }
}

impl fmt::Display for DiscoveredDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Name:{}, Address:{}",
            self.name.as_deref().unwrap_or("<unnamed>"),
            self.address
        )
    }
}

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// No device, no transport.
    #[default]
    Idle,
    /// Scanning for the target device.
    Discovering,
    /// Target matched, opening the channel.
    Connecting,
    /// Channel open, not streaming.
    Connected,
    /// Telemetry is being read.
    Streaming,
    /// Tearing down; collapses to `Idle`.
    Resetting,
}

impl SessionPhase {
    /// Returns true for the phases in which a transport handle exists.
    #[must_use]
    pub const fn has_transport(self) -> bool {
        matches!(self, Self::Connected | Self::Streaming)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VENDOR: Uuid = Uuid::from_u128(0x0000_1234_0000_1000_8000_0080_5f9b_34fb);
    const SPP: Uuid = Uuid::from_u128(0x0000_1101_0000_1000_8000_0080_5f9b_34fb);

    #[test]
    fn test_name_match() {
        let device = DiscoveredDevice::new(Some("SpO202".into()), "00:0E:EA:CF:00:01", vec![]);
        assert!(device.is_named("SpO202"));
        assert!(!device.is_named("spo202"));

        let unnamed = DiscoveredDevice::new(None, "00:0E:EA:CF:00:02", vec![]);
        assert!(!unnamed.is_named("SpO202"));
    }

    #[test]
    fn test_first_advertised_service_wins() {
        let device = DiscoveredDevice::new(None, "addr", vec![VENDOR, SPP]);
        assert_eq!(device.service_or(SPP), VENDOR);

        let device = DiscoveredDevice::new(None, "addr", vec![]);
        assert_eq!(device.service_or(SPP), SPP);
    }

    #[test]
    fn test_transport_phases() {
        assert!(SessionPhase::Connected.has_transport());
        assert!(SessionPhase::Streaming.has_transport());
        assert!(!SessionPhase::Idle.has_transport());
        assert!(!SessionPhase::Connecting.has_transport());
        assert_eq!(SessionPhase::default(), SessionPhase::Idle);
    }
}
