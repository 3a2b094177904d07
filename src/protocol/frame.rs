//! Telemetry frame decoding for the CMS50FW protocol.
//!
//! The device streams fixed 8-byte frames:
//! ```text
//! ┌──────────┬────┬──────────┬───────────┬──────┬──────┬────┬────┐
//! │ boundary │ p1 │    p2    │    p3     │  p4  │  p5  │ p6 │ p7 │
//! │ bit7 = 1 │    │ waveform │ intensity │ rate │ SpO2 │    │    │
//! └──────────┴────┴──────────┴───────────┴──────┴──────┴────┴────┘
//! ```
//! Only the boundary byte is guaranteed to have its top bit set. p1, p6
//! and p7 are defined by the device but unused here.

use std::time::SystemTime;

use bytes::{Buf, BytesMut};

use crate::types::DataFrame;

/// Length of one frame including the boundary byte.
pub const FRAME_LEN: usize = 8;

/// Top bit marking a frame boundary.
pub const BOUNDARY_BIT: u8 = 0x80;

const SEVEN_BITS: u8 = 0x7F;
const FOUR_BITS: u8 = 0x0F;

/// Returns true if `byte` starts a frame.
#[must_use]
pub const fn is_boundary(byte: u8) -> bool {
    byte & BOUNDARY_BIT == BOUNDARY_BIT
}

/// Decodes one aligned frame.
///
/// `raw[0]` is the boundary byte; only its top bit matters and it is not
/// checked here.
#[must_use]
pub fn decode_frame(raw: &[u8; FRAME_LEN], captured_at: SystemTime) -> DataFrame {
    DataFrame::new(
        raw[2] & SEVEN_BITS,
        raw[3] & FOUR_BITS,
        raw[4] & SEVEN_BITS,
        raw[5] & SEVEN_BITS,
        captured_at,
    )
}

/// Frame decoder that handles partial data.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    /// Creates a new frame decoder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(FRAME_LEN * 8),
        }
    }

    /// Feeds data into the decoder.
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next complete frame.
    ///
    /// Bytes before the next boundary byte are discarded. Once a boundary is
    /// found, the following seven bytes are taken as payload whatever their
    /// top bits are. Returns `None` until a whole frame is buffered.
    pub fn decode(&mut self) -> Option<DataFrame> {
        self.sync_to_boundary();

        if self.buffer.len() < FRAME_LEN {
            return None;
        }

        let mut raw = [0u8; FRAME_LEN];
        self.buffer.copy_to_slice(&mut raw);
        Some(decode_frame(&raw, SystemTime::now()))
    }

    /// Drops leading bytes up to the next boundary byte.
    fn sync_to_boundary(&mut self) {
        match self.buffer.iter().position(|&b| is_boundary(b)) {
            Some(0) => {}
            Some(skip) => {
                tracing::trace!("skipped {} bytes before frame boundary", skip);
                self.buffer.advance(skip);
            }
            None => self.buffer.clear(),
        }
    }

    /// Returns true if a frame has started but is not yet complete.
    #[must_use]
    pub fn in_frame(&self) -> bool {
        self.buffer.first().is_some_and(|&b| is_boundary(b))
    }

    /// Returns the number of bytes currently buffered.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: [u8; FRAME_LEN] = [0x81, 0x00, 0x28, 0x09, 0x48, 0x61, 0x00, 0x00];

    #[test]
    fn test_decode_frame_fields() {
        let frame = decode_frame(&SAMPLE, SystemTime::now());
        assert_eq!(frame.pulse_waveform, 40);
        assert_eq!(frame.pulse_intensity, 9);
        assert_eq!(frame.pulse_rate, 72);
        assert_eq!(frame.spo2_percentage, 97);
        assert!(!frame.is_finger_out_of_sleeve);
    }

    #[test]
    fn test_decode_frame_masks_high_bits() {
        let raw = [0xFF, 0xFF, 0xA8, 0xF9, 0xC8, 0xE1, 0xFF, 0xFF];
        let frame = decode_frame(&raw, SystemTime::now());
        assert_eq!(frame.pulse_waveform, 0x28);
        assert_eq!(frame.pulse_intensity, 0x09);
        assert_eq!(frame.pulse_rate, 0x48);
        assert_eq!(frame.spo2_percentage, 0x61);
    }

    #[test]
    fn test_decode_ignores_boundary_and_unused_bytes() {
        let a = decode_frame(&SAMPLE, SystemTime::UNIX_EPOCH);
        let mut other = SAMPLE;
        other[0] = 0xF3;
        other[1] = 0x55;
        other[6] = 0x12;
        other[7] = 0x7E;
        let b = decode_frame(&other, SystemTime::UNIX_EPOCH);
        assert_eq!(a, b);
    }

    #[test]
    fn test_decode_finger_out_signature() {
        let raw = [0x80, 0x00, 0x40, 0x00, 0x7F, 0x7F, 0x00, 0x00];
        let frame = decode_frame(&raw, SystemTime::now());
        assert!(frame.is_finger_out_of_sleeve);

        let partial = [0x80, 0x00, 0x40, 0x00, 0x7F, 0x62, 0x00, 0x00];
        assert!(!decode_frame(&partial, SystemTime::now()).is_finger_out_of_sleeve);
    }

    #[test]
    fn test_decoder_skips_to_boundary() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(&[0x01, 0x02, 0x7F]);
        decoder.feed(&SAMPLE);

        let frame = decoder.decode().unwrap();
        assert_eq!(frame.pulse_rate, 72);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_decoder_partial_frame() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(&SAMPLE[..5]);
        assert!(decoder.decode().is_none());
        assert!(decoder.in_frame());

        decoder.feed(&SAMPLE[5..]);
        let frame = decoder.decode().unwrap();
        assert_eq!(frame.spo2_percentage, 97);
        assert!(!decoder.in_frame());
    }

    #[test]
    fn test_decoder_payload_may_have_top_bit() {
        // A payload byte with bit 7 set must not be taken as a new boundary.
        let raw = [0x80, 0x80, 0x28, 0x09, 0x48, 0x61, 0x80, 0x80];
        let mut decoder = FrameDecoder::new();
        decoder.feed(&raw);
        decoder.feed(&SAMPLE);

        let first = decoder.decode().unwrap();
        assert_eq!(first.pulse_waveform, 40);
        let second = decoder.decode().unwrap();
        assert_eq!(second.pulse_rate, 72);
        assert!(decoder.decode().is_none());
    }

    #[test]
    fn test_decoder_discards_garbage_without_boundary() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(&[0x01, 0x02, 0x03]);
        assert!(decoder.decode().is_none());
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_decoder_multiple_frames() {
        let mut decoder = FrameDecoder::new();
        let mut stream = Vec::new();
        stream.extend_from_slice(&SAMPLE);
        stream.extend_from_slice(&[0x80, 0x00, 0x40, 0x00, 0x7F, 0x7F, 0x00, 0x00]);
        decoder.feed(&stream);

        assert!(!decoder.decode().unwrap().is_finger_out_of_sleeve);
        assert!(decoder.decode().unwrap().is_finger_out_of_sleeve);
        assert!(decoder.decode().is_none());
    }

    #[test]
    fn test_clear() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(&SAMPLE[..3]);
        decoder.clear();
        assert_eq!(decoder.buffered(), 0);
    }
}
