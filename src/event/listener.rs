//! Callback-style consumption of session events.

use crate::event::Event;
use crate::types::DataFrame;

/// Callbacks for session events.
///
/// Every method has a no-op default, so implementors only override what they
/// care about. Callbacks run on the forwarding task spawned by
/// [`EventDispatcher::forward_to`](crate::event::EventDispatcher::forward_to),
/// never on a session worker.
pub trait ConnectionListener: Send {
    /// A matched device is being connected to.
    fn on_connection_attempt_in_progress(&self) {}

    /// Channel to the device is open.
    fn on_connection_established(&self) {}

    /// The stream reader has started.
    fn on_data_read_attempt_in_progress(&self) {}

    /// A frame arrived; `None` means the read was aborted mid-frame.
    fn on_data_frame_arrived(&self, _frame: Option<&DataFrame>) {}

    /// The stream reader has exited.
    fn on_data_read_stopped(&self) {}

    /// The link is gone.
    fn on_broken_connection(&self) {}

    /// Reset finished.
    fn on_connection_reset(&self) {}

    /// Diagnostic message.
    fn on_log_event(&self, _timestamp_ms: u64, _message: &str) {}

    /// Routes an event to the matching callback.
    fn on_event(&self, event: Event) {
        match event {
            Event::ConnectionAttemptInProgress => self.on_connection_attempt_in_progress(),
            Event::ConnectionEstablished => self.on_connection_established(),
            Event::DataReadAttemptInProgress => self.on_data_read_attempt_in_progress(),
            Event::DataFrameArrived(frame) => self.on_data_frame_arrived(frame.as_ref()),
            Event::DataReadStopped => self.on_data_read_stopped(),
            Event::BrokenConnection => self.on_broken_connection(),
            Event::ConnectionReset => self.on_connection_reset(),
            Event::Log {
                timestamp_ms,
                message,
            } => self.on_log_event(timestamp_ms, &message),
        }
    }
}

/// Listener that only traces events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingListener;

impl ConnectionListener for LoggingListener {
    fn on_connection_attempt_in_progress(&self) {
        tracing::debug!("connection attempt in progress");
    }

    fn on_connection_established(&self) {
        tracing::debug!("connection established");
    }

    fn on_data_read_attempt_in_progress(&self) {
        tracing::debug!("data read attempt in progress");
    }

    fn on_data_frame_arrived(&self, frame: Option<&DataFrame>) {
        match frame {
            Some(frame) => tracing::trace!("data frame arrived: {}", frame),
            None => tracing::trace!("data frame arrived: <none>"),
        }
    }

    fn on_data_read_stopped(&self) {
        tracing::debug!("data read stopped");
    }

    fn on_broken_connection(&self) {
        tracing::debug!("broken connection");
    }

    fn on_connection_reset(&self) {
        tracing::debug!("connection reset");
    }

    fn on_log_event(&self, timestamp_ms: u64, message: &str) {
        tracing::debug!("[{}] {}", timestamp_ms, message);
    }
}
