//! Decoded telemetry samples.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Waveform value the device reports when no finger is in the sleeve.
pub const NO_FINGER_WAVEFORM: u8 = 64;

/// Pulse rate and `SpO2` value the device reports when no finger is in the sleeve.
pub const NO_FINGER_SENTINEL: u8 = 127;

/// Highest `SpO2` value that is a physiological reading.
pub const MAX_VALID_SPO2: u8 = 100;

/// One decoded sample from the device's ~60 Hz telemetry stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataFrame {
    /// Plethysmograph amplitude (0-127).
    pub pulse_waveform: u8,
    /// Signal strength indicator (0-15).
    pub pulse_intensity: u8,
    /// Pulse rate in beats per minute (0-127).
    ///
    /// The protocol masks this to 7 bits, so rates above 127 BPM are not
    /// reported correctly.
    pub pulse_rate: u8,
    /// Blood oxygen saturation as transmitted (0-127).
    pub spo2_percentage: u8,
    /// True when the device reports its "no finger detected" signature.
    pub is_finger_out_of_sleeve: bool,
    /// When the frame was decoded.
    pub captured_at: SystemTime,
}

impl DataFrame {
    /// Builds a frame from already-masked measurement values.
    #[must_use]
    pub fn new(
        pulse_waveform: u8,
        pulse_intensity: u8,
        pulse_rate: u8,
        spo2_percentage: u8,
        captured_at: SystemTime,
    ) -> Self {
        Self {
            pulse_waveform,
            pulse_intensity,
            pulse_rate,
            spo2_percentage,
            is_finger_out_of_sleeve: finger_out_of_sleeve(
                pulse_waveform,
                pulse_rate,
                spo2_percentage,
            ),
            captured_at,
        }
    }

    /// Returns the `SpO2` reading if it is physiological.
    ///
    /// Values above 100 are sentinels, not measurements.
    #[must_use]
    pub const fn spo2(&self) -> Option<u8> {
        if self.spo2_percentage <= MAX_VALID_SPO2 {
            Some(self.spo2_percentage)
        } else {
            None
        }
    }

    /// Capture time in milliseconds since the Unix epoch.
    #[must_use]
    pub fn captured_at_ms(&self) -> u64 {
        self.captured_at
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}

impl fmt::Display for DataFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "waveform={} intensity={} rate={} spo2={} finger_out={}",
            self.pulse_waveform,
            self.pulse_intensity,
            self.pulse_rate,
            self.spo2_percentage,
            self.is_finger_out_of_sleeve
        )
    }
}

/// The device's "no finger" signature: all three values at their sentinels.
#[must_use]
pub const fn finger_out_of_sleeve(pulse_waveform: u8, pulse_rate: u8, spo2: u8) -> bool {
    pulse_waveform == NO_FINGER_WAVEFORM
        && pulse_rate == NO_FINGER_SENTINEL
        && spo2 == NO_FINGER_SENTINEL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finger_out_requires_all_three() {
        assert!(finger_out_of_sleeve(64, 127, 127));
        assert!(!finger_out_of_sleeve(63, 127, 127));
        assert!(!finger_out_of_sleeve(64, 126, 127));
        assert!(!finger_out_of_sleeve(64, 127, 98));
        assert!(!finger_out_of_sleeve(64, 72, 98));
        assert!(!finger_out_of_sleeve(0, 0, 0));
    }

    #[test]
    fn test_new_derives_finger_flag() {
        let frame = DataFrame::new(64, 0, 127, 127, SystemTime::now());
        assert!(frame.is_finger_out_of_sleeve);

        let frame = DataFrame::new(40, 9, 72, 97, SystemTime::now());
        assert!(!frame.is_finger_out_of_sleeve);
    }

    #[test]
    fn test_spo2_sentinel() {
        let frame = DataFrame::new(40, 9, 72, 97, SystemTime::now());
        assert_eq!(frame.spo2(), Some(97));

        let frame = DataFrame::new(40, 9, 72, 127, SystemTime::now());
        assert_eq!(frame.spo2(), None);
    }

    #[test]
    fn test_display() {
        let frame = DataFrame::new(40, 9, 72, 97, UNIX_EPOCH);
        assert_eq!(
            frame.to_string(),
            "waveform=40 intensity=9 rate=72 spo2=97 finger_out=false"
        );
        assert_eq!(frame.captured_at_ms(), 0);
    }
}
